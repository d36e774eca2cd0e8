//! Embedding store: persistence for the user id → embedding gallery.
//!
//! The gallery is read and written in full on every call. There is no
//! caching and no locking; concurrent `load`/`save` sequences from different
//! callers can interleave and the last full write wins.

use crate::types::Gallery;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store file {path} is not a user id → embedding mapping: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode gallery: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Pluggable persistence for the gallery.
pub trait EmbeddingStore: Send + Sync {
    /// Read the full gallery. An absent backing store is an empty gallery.
    fn load(&self) -> Result<Gallery, StoreError>;

    /// Overwrite the backing store with `gallery`.
    fn save(&self, gallery: &Gallery) -> Result<(), StoreError>;
}

/// Gallery backed by a single JSON file of the form `{"user": [f32; 128], ...}`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl EmbeddingStore for JsonFileStore {
    fn load(&self) -> Result<Gallery, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "store file absent, using empty gallery");
                return Ok(Gallery::new());
            }
            Err(e) => return Err(self.io_err(e)),
        };

        let gallery: Gallery = serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(path = %self.path.display(), entries = gallery.len(), "store loaded");
        Ok(gallery)
    }

    fn save(&self, gallery: &Gallery) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(gallery)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        // Plain overwrite: a crash mid-write can truncate the file.
        std::fs::write(&self.path, bytes).map_err(|e| self.io_err(e))?;

        tracing::debug!(path = %self.path.display(), entries = gallery.len(), "store saved");
        Ok(())
    }
}
