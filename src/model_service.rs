use image::DynamicImage;
use thiserror::Error;

use crate::labels::ClassLabels;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid detector configuration: {0}")]
    InvalidConfig(String),
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("Unexpected model output: {0}")]
    UnexpectedOutput(String),
    #[error("Session mutex poisoned")]
    SessionPoisoned,
}

/// Axis-aligned box in pixel coordinates of the input image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub class_id: usize,
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

pub trait ModelService {
    fn predict(&self, image: &DynamicImage) -> Result<Vec<BoundingBox>, ModelError>;
    fn labels(&self) -> &ClassLabels;
}
