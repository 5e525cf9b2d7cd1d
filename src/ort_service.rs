use std::path::Path;
use std::sync::Mutex;

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::{s, Array, ArrayD, Axis, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};

use crate::{
    config::DetectorConfig,
    labels::ClassLabels,
    model_service::{BoundingBox, ModelError, ModelService},
};

fn intersection(box1: &BoundingBox, box2: &BoundingBox) -> f32 {
    let overlap_w = (box1.x2.min(box2.x2) - box1.x1.max(box2.x1)).max(0.);
    let overlap_h = (box1.y2.min(box2.y2) - box1.y1.max(box2.y1)).max(0.);
    overlap_w * overlap_h
}

fn union(box1: &BoundingBox, box2: &BoundingBox) -> f32 {
    ((box1.x2 - box1.x1) * (box1.y2 - box1.y1)) + ((box2.x2 - box2.x1) * (box2.y2 - box2.y1))
        - intersection(box1, box2)
}

fn non_max_suppression(mut boxes: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    boxes.sort_by(|box1, box2| box2.confidence.total_cmp(&box1.confidence));
    let mut result = Vec::new();

    while !boxes.is_empty() {
        result.push(boxes[0]);
        boxes = boxes
            .iter()
            .filter(|box1| intersection(&boxes[0], box1) / union(&boxes[0], box1) < iou_threshold)
            .cloned()
            .collect();
    }

    result
}

fn preprocess(image: &DynamicImage, input_size: u32) -> (Array<f32, Ix4>, u32, u32) {
    let (img_width, img_height) = image.dimensions();
    let img = image.resize_exact(input_size, input_size, FilterType::CatmullRom);

    let size = input_size as usize;
    let mut input = Array::zeros((1, 3, size, size));
    for pixel in img.pixels() {
        let x = pixel.0 as usize;
        let y = pixel.1 as usize;
        let [r, g, b, _] = pixel.2 .0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    (input, img_width, img_height)
}

/// Decode a YOLOv8-style `[1, 4 + classes, candidates]` output tensor into
/// boxes in pixel coordinates of the original image, confidence-filtered and
/// deduplicated with NMS.
fn decode_output(
    outputs: &ArrayD<f32>,
    config: &DetectorConfig,
    img_width: u32,
    img_height: u32,
) -> Result<Vec<BoundingBox>, ModelError> {
    let dims = outputs.shape();
    if dims.len() != 3 || dims[0] != 1 || dims[1] < 5 {
        return Err(ModelError::UnexpectedOutput(format!(
            "unsupported output shape {:?}",
            dims
        )));
    }

    let input_size = config.input_size as f32;
    let output = outputs.slice(s![0, .., ..]);
    let mut boxes = Vec::new();

    for row in output.axis_iter(Axis(1)) {
        let row: Vec<_> = row.iter().copied().collect();
        let (class_id, prob) = row
            .iter()
            .skip(4)
            .enumerate()
            .map(|(index, value)| (index, *value))
            .reduce(|accum, row| if row.1 > accum.1 { row } else { accum })
            .unwrap();

        if prob < config.confidence_threshold {
            continue;
        }

        let xc = row[0] / input_size * (img_width as f32);
        let yc = row[1] / input_size * (img_height as f32);
        let w = row[2] / input_size * (img_width as f32);
        let h = row[3] / input_size * (img_height as f32);

        boxes.push(BoundingBox {
            class_id,
            confidence: prob,
            x1: (xc - w / 2.).clamp(0., img_width as f32),
            y1: (yc - h / 2.).clamp(0., img_height as f32),
            x2: (xc + w / 2.).clamp(0., img_width as f32),
            y2: (yc + h / 2.).clamp(0., img_height as f32),
        });
    }

    Ok(non_max_suppression(boxes, config.iou_threshold))
}

pub struct OrtModelService {
    session: Mutex<Session>,
    output_name: String,
    labels: ClassLabels,
    config: DetectorConfig,
}

impl OrtModelService {
    pub fn load(model_path: &Path, config: &DetectorConfig) -> Result<Self, ModelError> {
        config.validate().map_err(ModelError::InvalidConfig)?;

        ort::init().commit();
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(ort::Error::from)?
            .commit_from_file(model_path)?;

        let output_name = session
            .outputs()
            .first()
            .map(|output| output.name().to_string())
            .ok_or_else(|| ModelError::UnexpectedOutput("model has no outputs".to_string()))?;

        let labels = match session.metadata() {
            Ok(meta) => match meta.custom("names") {
                Some(names) => ClassLabels::parse(&names),
                None => ClassLabels::default(),
            },
            Err(e) => {
                tracing::warn!("Failed to read model metadata: {}", e);
                ClassLabels::default()
            }
        };
        if labels.is_empty() {
            tracing::warn!("Model carries no class name table, falling back to numeric labels");
        }

        tracing::info!(
            "Loaded ONNX model from {:?} with {} named classes",
            model_path,
            labels.len()
        );

        Ok(Self {
            session: Mutex::new(session),
            output_name,
            labels,
            config: config.clone(),
        })
    }

    fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<ArrayD<f32>, ModelError> {
        let mut session = self.session.lock().map_err(|_| ModelError::SessionPoisoned)?;

        let owned_buffer;
        let input_view = if input.view().is_standard_layout() {
            input.view()
        } else {
            owned_buffer = input.to_owned();
            owned_buffer.view()
        };

        let tensor_ref = TensorRef::from_array_view(input_view)?;
        let input_tensor = ort::inputs![tensor_ref];

        let outputs = session.run(input_tensor)?;

        let (shape, data) = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| {
                ModelError::UnexpectedOutput(format!("missing output tensor {}", self.output_name))
            })?
            .try_extract_tensor::<f32>()?;

        let ix = shape.to_ixdyn();
        let array = ArrayD::from_shape_vec(ix, data.to_vec())
            .map_err(|e| ModelError::UnexpectedOutput(format!("invalid tensor shape: {}", e)))?;

        Ok(array)
    }
}

impl ModelService for OrtModelService {
    fn predict(&self, image: &DynamicImage) -> Result<Vec<BoundingBox>, ModelError> {
        let (input, img_width, img_height) = preprocess(image, self.config.input_size);
        let outputs = self.run_inference(&input)?;
        let boxes = decode_output(&outputs, &self.config, img_width, img_height)?;

        tracing::debug!("Model reported {} detections", boxes.len());
        Ok(boxes)
    }

    fn labels(&self) -> &ClassLabels {
        &self.labels
    }
}
