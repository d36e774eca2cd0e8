//! End-to-end tests of the HTTP contract with a deterministic pipeline.
//!
//! Test images are tiny PNGs whose first pixel drives the stub pipeline:
//! red = number of faces detected, green = identity (one-hot embedding slot).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use facegate_core::{
    BoundingBox, Embedding, EmbeddingStore, FacePipeline, Gallery, JsonFileStore, PipelineError,
    EMBEDDING_DIM,
};
use facegated::{build_router, spawn_engine, AppState, Config, MatchStrategy};
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "facegate-test-boundary";

struct PixelPipeline;

impl FacePipeline for PixelPipeline {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, PipelineError> {
        let faces = image.get_pixel(0, 0)[0] as usize;
        Ok((0..faces)
            .map(|i| BoundingBox {
                x: i as f32 * 20.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
                confidence: 0.99,
                landmarks: None,
            })
            .collect())
    }

    fn embed(&mut self, image: &RgbImage, _face: &BoundingBox) -> Result<Embedding, PipelineError> {
        let slot = image.get_pixel(0, 0)[1] as usize % EMBEDDING_DIM;
        let mut values = vec![0.0f32; EMBEDDING_DIM];
        values[slot] = 1.0;
        Ok(Embedding::new(values))
    }
}

struct Harness {
    app: Router,
    store_path: PathBuf,
    _dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        Self::with_strategy(MatchStrategy::First)
    }

    fn with_strategy(match_strategy: MatchStrategy) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("encodings.json");
        let config = Config {
            store_path: store_path.clone(),
            match_strategy,
            ..Config::default()
        };

        let engine = spawn_engine(PixelPipeline).unwrap();
        let store = Arc::new(JsonFileStore::new(&store_path));
        let app = build_router(AppState::new(engine, store, &config), config.max_upload_bytes);

        Self { app, store_path, _dir: dir }
    }

    fn stored(&self) -> Gallery {
        JsonFileStore::new(&self.store_path).load().unwrap()
    }

    async fn post(&self, uri: &str, fields: &[(&str, Part)]) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(multipart_body(fields)))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn register(&self, user_id: &str, image: Vec<u8>) -> (StatusCode, Value) {
        self.post(
            "/register-face",
            &[("user_id", Part::Text(user_id.into())), ("file", Part::File(image))],
        )
        .await
    }

    async fn verify(&self, image: Vec<u8>) -> (StatusCode, Value) {
        self.post("/verify-face", &[("file", Part::File(image))]).await
    }
}

enum Part {
    Text(String),
    File(Vec<u8>),
}

fn multipart_body(fields: &[(&str, Part)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, part) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(text) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(text.as_bytes());
            }
            Part::File(bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"face.png\"\r\n\
                         Content-Type: image/png\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// PNG whose first pixel encodes `faces` and `identity`.
fn face_png(faces: u8, identity: u8) -> Vec<u8> {
    let image = RgbImage::from_pixel(8, 8, Rgb([faces, identity, 0]));
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn bad_face_count() -> Value {
    json!({"success": false, "msg": "No face or multiple faces detected."})
}

fn no_match() -> Value {
    json!({"success": false, "msg": "No match found."})
}

#[tokio::test]
async fn test_register_then_verify_same_image() {
    let h = Harness::new();

    let (status, body) = h.register("alice", face_png(1, 7)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["msg"], json!("Face registered."));
    assert_eq!(body["encoding"].as_array().map(Vec::len), Some(EMBEDDING_DIM));

    let (status, body) = h.verify(face_png(1, 7)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "user_id": "alice"}));
}

#[tokio::test]
async fn test_reregistration_overwrites() {
    let h = Harness::new();

    h.register("alice", face_png(1, 1)).await;
    let (status, _) = h.register("alice", face_png(1, 2)).await;
    assert_eq!(status, StatusCode::OK);

    let stored = h.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored["alice"].values[2], 1.0);

    assert_eq!(h.verify(face_png(1, 1)).await, (StatusCode::OK, no_match()));
    assert_eq!(
        h.verify(face_png(1, 2)).await,
        (StatusCode::OK, json!({"success": true, "user_id": "alice"}))
    );
}

#[tokio::test]
async fn test_zero_faces_rejected_on_both_endpoints() {
    let h = Harness::new();

    assert_eq!(h.register("alice", face_png(0, 1)).await, (StatusCode::BAD_REQUEST, bad_face_count()));
    assert_eq!(h.verify(face_png(0, 1)).await, (StatusCode::BAD_REQUEST, bad_face_count()));
    assert!(!h.store_path.exists(), "rejected registration must not touch the store");
}

#[tokio::test]
async fn test_multiple_faces_rejected_on_both_endpoints() {
    let h = Harness::new();

    for faces in [2, 5] {
        assert_eq!(
            h.register("alice", face_png(faces, 1)).await,
            (StatusCode::BAD_REQUEST, bad_face_count())
        );
        assert_eq!(h.verify(face_png(faces, 1)).await, (StatusCode::BAD_REQUEST, bad_face_count()));
    }
}

#[tokio::test]
async fn test_unregistered_face_is_ok_with_no_match() {
    let h = Harness::new();
    h.register("alice", face_png(1, 1)).await;
    h.register("bob", face_png(1, 2)).await;

    assert_eq!(h.verify(face_png(1, 3)).await, (StatusCode::OK, no_match()));
}

#[tokio::test]
async fn test_registered_encoding_matches_stored_file() {
    let h = Harness::new();

    let (_, body) = h.register("carol", face_png(1, 42)).await;
    let returned: Embedding = serde_json::from_value(body["encoding"].clone()).unwrap();

    let stored = h.stored();
    assert_eq!(stored["carol"], returned);

    // The file itself is a plain user id → array mapping.
    let raw: Value = serde_json::from_slice(&std::fs::read(&h.store_path).unwrap()).unwrap();
    assert_eq!(raw["carol"].as_array().map(Vec::len), Some(EMBEDDING_DIM));
}

#[tokio::test]
async fn test_absent_store_verifies_as_no_match() {
    let h = Harness::new();
    assert!(!h.store_path.exists());

    assert_eq!(h.verify(face_png(1, 1)).await, (StatusCode::OK, no_match()));
    assert!(!h.store_path.exists(), "verification must not create the store");
}

#[tokio::test]
async fn test_corrupt_store_is_server_error() {
    let h = Harness::new();
    std::fs::write(&h.store_path, "{ this is not json").unwrap();

    let (status, body) = h.verify(face_png(1, 1)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_undecodable_image_is_server_error() {
    let h = Harness::new();

    let (status, body) = h.register("alice", b"GIF89a but not really".to_vec()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, Value::Null);

    let (status, _) = h.verify(vec![0u8; 16]).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_missing_fields_are_client_errors() {
    let h = Harness::new();

    let (status, body) = h.post("/register-face", &[("file", Part::File(face_png(1, 1)))]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"success": false, "msg": "No userId provided."}));

    let (status, body) = h
        .post(
            "/register-face",
            &[("user_id", Part::Text(String::new())), ("file", Part::File(face_png(1, 1)))],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], json!("No userId provided."));

    let (status, body) = h.post("/register-face", &[("user_id", Part::Text("alice".into()))]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"success": false, "msg": "No image uploaded."}));

    let (status, body) = h.post("/verify-face", &[("user_id", Part::Text("alice".into()))]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], json!("No image uploaded."));
}

#[tokio::test]
async fn test_unknown_fields_are_ignored() {
    let h = Harness::new();
    let (status, _) = h
        .post(
            "/register-face",
            &[
                ("note", Part::Text("hello".into())),
                ("user_id", Part::Text("dave".into())),
                ("file", Part::File(face_png(1, 9))),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(h.stored().contains_key("dave"));
}

#[tokio::test]
async fn test_first_match_follows_user_id_order() {
    // Two users enrolled with the same face: the lexicographically first wins.
    let h = Harness::new();
    h.register("zoe", face_png(1, 5)).await;
    h.register("adam", face_png(1, 5)).await;

    assert_eq!(
        h.verify(face_png(1, 5)).await,
        (StatusCode::OK, json!({"success": true, "user_id": "adam"}))
    );
}

#[tokio::test]
async fn test_best_strategy_resolves_ties_the_same_way() {
    let h = Harness::with_strategy(MatchStrategy::Best);
    h.register("zoe", face_png(1, 5)).await;
    h.register("adam", face_png(1, 5)).await;
    h.register("bob", face_png(1, 6)).await;

    assert_eq!(
        h.verify(face_png(1, 5)).await,
        (StatusCode::OK, json!({"success": true, "user_id": "adam"}))
    );
    assert_eq!(
        h.verify(face_png(1, 6)).await,
        (StatusCode::OK, json!({"success": true, "user_id": "bob"}))
    );
}

#[tokio::test]
async fn test_health_reports_enrolled_count() {
    let h = Harness::new();
    let get = || Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = h.send(get()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["enrolled"], json!(0));

    h.register("alice", face_png(1, 1)).await;
    h.register("bob", face_png(1, 2)).await;
    let (_, body) = h.send(get()).await;
    assert_eq!(body["enrolled"], json!(2));
}

#[tokio::test]
async fn test_non_multipart_body_is_rejected() {
    let h = Harness::new();
    let request = Request::builder()
        .method("POST")
        .uri("/verify-face")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, _) = h.send(request).await;
    assert!(status.is_client_error(), "got {status}");
}
