//! Detector + recognizer behind one trait, so the daemon's engine thread
//! can run either the ONNX models or a substitute.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, Embedding};
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

/// File name of the SCRFD detection model inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// File name of the SFace recognition model inside the model directory.
pub const RECOGNIZER_MODEL_FILE: &str = "face_recognition_sface_2021dec.onnx";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Face detection and embedding extraction over decoded RGB images.
///
/// Implementations may hold non-`Sync` inference sessions; they are owned by
/// a single thread and only need to be `Send`.
pub trait FacePipeline: Send + 'static {
    /// Detect faces, sorted by descending confidence.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, PipelineError>;

    /// Compute the embedding of one detected face.
    fn embed(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Embedding, PipelineError>;
}

/// SCRFD detection followed by SFace recognition.
pub struct OnnxPipeline {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxPipeline {
    /// Load both models from `model_dir`. Fails fast if either is missing.
    pub fn load(model_dir: &Path) -> Result<Self, PipelineError> {
        let detector_path = model_dir.join(DETECTOR_MODEL_FILE);
        let recognizer_path = model_dir.join(RECOGNIZER_MODEL_FILE);

        let detector = FaceDetector::load(&detector_path.to_string_lossy())?;
        let recognizer = FaceRecognizer::load(&recognizer_path.to_string_lossy())?;

        Ok(Self { detector, recognizer })
    }
}

impl FacePipeline for OnnxPipeline {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, PipelineError> {
        Ok(self.detector.detect(image)?)
    }

    fn embed(&mut self, image: &RgbImage, face: &BoundingBox) -> Result<Embedding, PipelineError> {
        Ok(self.recognizer.extract(image, face)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_reports_missing_detector_first() {
        let dir = tempfile::tempdir().unwrap();
        let err = OnnxPipeline::load(dir.path()).err().expect("models are absent");
        assert!(matches!(err, PipelineError::Detector(DetectorError::ModelNotFound(_))));
        assert!(err.to_string().contains(DETECTOR_MODEL_FILE));
    }
}
