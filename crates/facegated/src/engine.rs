use facegate_core::{Embedding, FacePipeline, PipelineError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("expected exactly one face, found {0}")]
    FaceCount(usize),
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("pipeline panicked: {0}")]
    Panicked(String),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Extract {
        image: Vec<u8>,
        reply: oneshot::Sender<Result<Embedding, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Decode `image`, require exactly one face, and return its embedding.
    pub async fn extract(&self, image: Vec<u8>) -> Result<Embedding, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Extract { image, reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread that owns `pipeline`.
///
/// Requests are served one at a time in arrival order. A panic inside the
/// pipeline fails only the request that triggered it. The thread exits once
/// every [`EngineHandle`] has been dropped.
pub fn spawn_engine<P: FacePipeline>(mut pipeline: P) -> std::io::Result<EngineHandle> {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);

    std::thread::Builder::new()
        .name("facegate-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Extract { image, reply } => {
                        let result = panic::catch_unwind(AssertUnwindSafe(|| {
                            run_extract(&mut pipeline, &image)
                        }))
                        .unwrap_or_else(|payload| {
                            let msg = panic_message(payload.as_ref());
                            tracing::error!(error = %msg, "engine: pipeline panicked, request failed");
                            Err(EngineError::Panicked(msg))
                        });
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Decode, detect, enforce a single face, embed.
fn run_extract<P: FacePipeline>(pipeline: &mut P, bytes: &[u8]) -> Result<Embedding, EngineError> {
    let image = image::load_from_memory(bytes)?.to_rgb8();

    let faces = pipeline.detect(&image)?;
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        faces = faces.len(),
        "engine: detection finished"
    );

    let [face] = faces.as_slice() else {
        return Err(EngineError::FaceCount(faces.len()));
    };

    let embedding = pipeline.embed(&image, face)?;
    tracing::debug!(confidence = face.confidence, dim = embedding.dim(), "engine: embedding extracted");
    Ok(embedding)
}
