use serde::Serialize;

/// One recognized object instance.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Detection {
    pub class_name: String,
    pub confidence: f32,
    pub bbox: [f32; 4],
}

/// The output envelope printed on stdout, one JSON line per run.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DetectionReport {
    Success {
        success: bool,
        detections: Vec<Detection>,
        annotated_image: String,
        total_detections: usize,
    },
    Failure {
        success: bool,
        error: String,
    },
}

impl DetectionReport {
    pub fn success(detections: Vec<Detection>, annotated_image: String) -> Self {
        let total_detections = detections.len();
        Self::Success {
            success: true,
            detections,
            annotated_image,
            total_detections,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            success: false,
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({
                "success": false,
                "error": format!("Failed to serialize detection report: {}", e),
            })
            .to_string()
        })
    }
}
