use std::path::Path;

use thiserror::Error;

use crate::{
    annotate::{AnnotateError, Annotator},
    config::DetectorConfig,
    model_service::{ModelError, ModelService},
    ort_service::OrtModelService,
    report::{Detection, DetectionReport},
};

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Failed to open image: {0}")]
    ImageOpenFailed(#[from] image::ImageError),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Annotation error: {0}")]
    Annotate(#[from] AnnotateError),
}

/// Run the whole pipeline for one image. Every internal failure is folded
/// into the failure envelope; this function never panics on bad input and
/// never returns an error.
pub fn run_detection(
    image_path: &Path,
    model_path: &Path,
    config: &DetectorConfig,
) -> DetectionReport {
    match detect(image_path, model_path, config) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Detection failed: {}", e);
            DetectionReport::failure(e.to_string())
        }
    }
}

fn detect(
    image_path: &Path,
    model_path: &Path,
    config: &DetectorConfig,
) -> Result<DetectionReport, DetectionError> {
    let model = OrtModelService::load(model_path, config)?;
    run_with_model(&model, image_path, config)
}

fn run_with_model<M: ModelService>(
    model: &M,
    image_path: &Path,
    config: &DetectorConfig,
) -> Result<DetectionReport, DetectionError> {
    let image = image::open(image_path)?;
    let boxes = model.predict(&image)?;

    let annotator = Annotator::new(config.jpeg_quality)?;
    let annotated = annotator.annotate(&image, &boxes, model.labels());
    let annotated_image = annotator.to_base64_jpeg(&annotated)?;

    let detections = boxes
        .iter()
        .map(|bbox| Detection {
            class_name: model.labels().name(bbox.class_id),
            confidence: bbox.confidence,
            bbox: [bbox.x1, bbox.y1, bbox.x2, bbox.y2],
        })
        .collect();

    Ok(DetectionReport::success(detections, annotated_image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::ClassLabels;
    use crate::model_service::BoundingBox;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb};
    use serde_json::Value;
    use std::path::PathBuf;

    struct MockModelService {
        boxes: Vec<BoundingBox>,
        labels: ClassLabels,
    }

    impl MockModelService {
        fn new(boxes: Vec<BoundingBox>) -> Self {
            Self {
                boxes,
                labels: ClassLabels::parse("{0: 'apple', 1: 'banana'}"),
            }
        }
    }

    impl ModelService for MockModelService {
        fn predict(&self, _image: &DynamicImage) -> Result<Vec<BoundingBox>, ModelError> {
            Ok(self.boxes.clone())
        }

        fn labels(&self) -> &ClassLabels {
            &self.labels
        }
    }

    fn write_test_image(dir: &tempfile::TempDir, width: u32, height: u32) -> PathBuf {
        let path = dir.path().join("input.png");
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(width, height, Rgb([0, 128, 0]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_run_with_model_reports_detections() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = write_test_image(&dir, 320, 240);
        let mock = MockModelService::new(vec![
            BoundingBox {
                class_id: 0,
                confidence: 0.95,
                x1: 10.,
                y1: 20.,
                x2: 100.,
                y2: 150.,
            },
            BoundingBox {
                class_id: 1,
                confidence: 0.88,
                x1: 200.,
                y1: 50.,
                x2: 300.,
                y2: 200.,
            },
        ]);

        let report = run_with_model(&mock, &image_path, &DetectorConfig::default()).unwrap();

        let value: Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(value["success"], Value::Bool(true));
        assert_eq!(value["total_detections"], 2);
        assert_eq!(value["detections"][0]["class_name"], "apple");
        assert_eq!(value["detections"][1]["class_name"], "banana");

        for detection in value["detections"].as_array().unwrap() {
            let confidence = detection["confidence"].as_f64().unwrap();
            assert!((0.0..=1.0).contains(&confidence));

            let bbox = detection["bbox"].as_array().unwrap();
            assert_eq!(bbox.len(), 4);
            assert!(bbox[0].as_f64().unwrap() <= bbox[2].as_f64().unwrap());
            assert!(bbox[1].as_f64().unwrap() <= bbox[3].as_f64().unwrap());
        }

        // the annotated image decodes back to the input dimensions
        let encoded = value["annotated_image"].as_str().unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (320, 240));
    }

    #[test]
    fn test_run_with_model_zero_detections() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = write_test_image(&dir, 64, 64);
        let mock = MockModelService::new(Vec::new());

        let report = run_with_model(&mock, &image_path, &DetectorConfig::default()).unwrap();

        let value: Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(value["total_detections"], 0);
        assert_eq!(value["detections"].as_array().unwrap().len(), 0);

        let encoded = value["annotated_image"].as_str().unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (64, 64));
    }

    #[test]
    fn test_missing_image_is_an_error() {
        let mock = MockModelService::new(Vec::new());

        let result = run_with_model(
            &mock,
            Path::new("/nonexistent/input.png"),
            &DetectorConfig::default(),
        );

        let err = result.err().unwrap();
        assert!(matches!(err, DetectionError::ImageOpenFailed(_)));

        let report = DetectionReport::failure(err.to_string());
        let value: Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(value["success"], Value::Bool(false));
        assert!(!value["error"].as_str().unwrap().is_empty());
    }

    #[test]
    fn test_run_detection_with_missing_model_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = write_test_image(&dir, 32, 32);
        let model_path = dir.path().join("missing.onnx");

        let report = run_detection(&image_path, &model_path, &DetectorConfig::default());

        assert!(!report.is_success());
        let value: Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(value["success"], Value::Bool(false));
        assert!(!value["error"].as_str().unwrap().is_empty());
    }
}
