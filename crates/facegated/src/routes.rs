//! HTTP handlers for face registration and verification.

use crate::error::{ApiError, Failure};
use crate::state::AppState;
use axum::extract::{Multipart, State};
use axum::Json;
use facegate_core::{Embedding, EmbeddingStore, Gallery, StoreError};
use serde::Serialize;
use std::sync::Arc;

pub const MSG_REGISTERED: &str = "Face registered.";
pub const MSG_NO_MATCH: &str = "No match found.";

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub msg: &'static str,
    pub encoding: Embedding,
}

/// Verification outcome. A miss is still a 200: callers must read `success`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum VerifyResponse {
    Matched { success: bool, user_id: String },
    NoMatch(Failure),
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub enrolled: usize,
}

/// Recognized multipart fields; anything else is ignored.
#[derive(Default)]
struct UploadForm {
    user_id: Option<String>,
    file: Option<Vec<u8>>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some("user_id") => form.user_id = Some(field.text().await?),
                Some("file") => form.file = Some(field.bytes().await?.to_vec()),
                _ => {}
            }
        }
        Ok(form)
    }
}

/// Run a store operation on the blocking pool.
async fn with_store<T, F>(store: &Arc<dyn EmbeddingStore>, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn EmbeddingStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    Ok(tokio::task::spawn_blocking(move || op(store.as_ref())).await??)
}

/// `POST /register-face`: multipart `user_id` + `file`.
pub async fn register_face(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<RegisterResponse>, ApiError> {
    let form = UploadForm::read(multipart).await?;
    let user_id = form
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::MissingUserId)?;
    let image = form.file.ok_or(ApiError::MissingImage)?;

    tracing::info!(user_id = %user_id, bytes = image.len(), "register requested");
    let embedding = state.engine.extract(image).await?;

    // Load, upsert, save. Not atomic with respect to other requests.
    let stored = embedding.clone();
    let id = user_id.clone();
    let previous = with_store(&state.store, move |store| {
        let mut gallery: Gallery = store.load()?;
        let previous = gallery.insert(id, stored);
        store.save(&gallery)?;
        Ok(previous)
    })
    .await?;

    tracing::info!(user_id = %user_id, replaced = previous.is_some(), "face registered");
    Ok(Json(RegisterResponse {
        success: true,
        msg: MSG_REGISTERED,
        encoding: embedding,
    }))
}

/// `POST /verify-face`: multipart `file`.
pub async fn verify_face(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<VerifyResponse>, ApiError> {
    let form = UploadForm::read(multipart).await?;
    let image = form.file.ok_or(ApiError::MissingImage)?;

    tracing::info!(bytes = image.len(), "verify requested");
    let probe = state.engine.extract(image).await?;

    let gallery = with_store(&state.store, |store| store.load()).await?;
    let result = state.matcher.compare(&probe, &gallery, state.threshold);

    tracing::info!(
        matched = result.matched,
        similarity = result.similarity,
        user_id = ?result.user_id,
        gallery = gallery.len(),
        "verify complete"
    );

    Ok(Json(match result.user_id {
        Some(user_id) if result.matched => VerifyResponse::Matched { success: true, user_id },
        _ => VerifyResponse::NoMatch(Failure::new(MSG_NO_MATCH)),
    }))
}

/// `GET /health`: liveness plus the number of stored entries.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let enrolled = with_store(&state.store, |store| store.load().map(|g| g.len())).await?;
    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        enrolled,
    }))
}
