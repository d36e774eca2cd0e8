use crate::engine::EngineError;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use facegate_core::StoreError;
use serde::Serialize;
use thiserror::Error;

pub const MSG_BAD_FACE_COUNT: &str = "No face or multiple faces detected.";
pub const MSG_NO_USER_ID: &str = "No userId provided.";
pub const MSG_NO_IMAGE: &str = "No image uploaded.";

/// Structured `{"success": false, "msg": ...}` body.
#[derive(Debug, Serialize)]
pub struct Failure {
    pub success: bool,
    pub msg: &'static str,
}

impl Failure {
    pub fn new(msg: &'static str) -> Self {
        Self { success: false, msg }
    }
}

/// Errors surfaced by the HTTP handlers.
///
/// Client input problems become 400 with a structured body. Everything else
/// is an unstructured 500.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("expected exactly one face, found {0}")]
    FaceCount(usize),
    #[error("missing user_id field")]
    MissingUserId,
    #[error("missing file field")]
    MissingImage,
    #[error("multipart: {0}")]
    Multipart(#[from] MultipartError),
    #[error("engine: {0}")]
    Engine(EngineError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::FaceCount(n) => Self::FaceCount(n),
            other => Self::Engine(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let client = |msg| (StatusCode::BAD_REQUEST, Json(Failure::new(msg))).into_response();

        match self {
            Self::FaceCount(n) => {
                tracing::info!(faces = n, "rejecting image: face count");
                client(MSG_BAD_FACE_COUNT)
            }
            Self::MissingUserId => client(MSG_NO_USER_ID),
            Self::MissingImage => client(MSG_NO_IMAGE),
            Self::Multipart(err) => {
                tracing::info!(error = %err, "rejecting malformed multipart body");
                (err.status(), err.body_text()).into_response()
            }
            other => {
                tracing::error!(error = %other, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
