use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_input_size() -> u32 {
    640
}

fn default_confidence_threshold() -> f32 {
    0.25
}

fn default_iou_threshold() -> f32 {
    0.7
}

fn default_jpeg_quality() -> u8 {
    90
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_size: default_input_size(),
            confidence_threshold: default_confidence_threshold(),
            iou_threshold: default_iou_threshold(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.input_size == 0 {
            return Err("input_size must be greater than zero".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(format!(
                "iou_threshold must be within [0, 1], got {}",
                self.iou_threshold
            ));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(format!(
                "jpeg_quality must be within [1, 100], got {}",
                self.jpeg_quality
            ));
        }
        Ok(())
    }
}
