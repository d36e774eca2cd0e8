//! facegate-core: face detection, recognition, matching and storage.
//!
//! Uses SCRFD for face detection and SFace for 128-dimensional face
//! embeddings, both running via ONNX Runtime for CPU inference. Embeddings
//! are persisted as a flat JSON mapping from user id to vector.

pub mod alignment;
pub mod detector;
pub mod pipeline;
pub mod recognizer;
pub mod store;
pub mod types;

pub use detector::FaceDetector;
pub use pipeline::{FacePipeline, OnnxPipeline, PipelineError};
pub use recognizer::FaceRecognizer;
pub use store::{EmbeddingStore, JsonFileStore, StoreError};
pub use types::{
    BestMatcher, BoundingBox, Embedding, FirstMatcher, Gallery, MatchResult, Matcher, EMBEDDING_DIM,
};

use std::path::PathBuf;

/// Default directory for ONNX model files: `$XDG_DATA_HOME/facegate/models`,
/// falling back to `~/.local/share/facegate/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facegate")
        .join("models")
}
