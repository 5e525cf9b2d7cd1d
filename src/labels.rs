use std::collections::HashMap;

/// Class index to name table, read from the `names` metadata entry that
/// ultralytics exports embed in the model artifact. The entry is a Python
/// dict literal, e.g. `{0: 'apple', 1: 'banana'}`.
#[derive(Debug, Clone, Default)]
pub struct ClassLabels {
    names: HashMap<usize, String>,
}

impl ClassLabels {
    pub fn parse(raw: &str) -> Self {
        let chars: Vec<char> = raw.chars().collect();
        let mut names = HashMap::new();
        let mut i = 0;

        while i < chars.len() {
            if !chars[i].is_ascii_digit() {
                i += 1;
                continue;
            }

            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let key: usize = match chars[start..i].iter().collect::<String>().parse() {
                Ok(key) => key,
                Err(_) => continue,
            };

            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            if i >= chars.len() || chars[i] != ':' {
                continue;
            }
            i += 1;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            if i >= chars.len() {
                break;
            }

            let quote = chars[i];
            if quote != '\'' && quote != '"' {
                continue;
            }
            i += 1;
            let value_start = i;
            while i < chars.len() && chars[i] != quote {
                i += 1;
            }
            if i >= chars.len() {
                break;
            }
            names.insert(key, chars[value_start..i].iter().collect());
            i += 1;
        }

        Self { names }
    }

    pub fn name(&self, class_id: usize) -> String {
        self.names
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
