//! facegated: HTTP face registration and verification service.
//!
//! `POST /register-face` and `POST /verify-face` accept multipart image
//! uploads, run them through the inference engine thread, and read/write the
//! flat JSON embedding store.

pub mod config;
pub mod engine;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{Config, MatchStrategy};
pub use engine::{spawn_engine, EngineError, EngineHandle};
pub use error::ApiError;
pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the service router.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/register-face", post(routes::register_face))
        .route("/verify-face", post(routes::verify_face))
        .route("/health", get(routes::health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}
