use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// How verification picks a user from the gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// First entry, in user id order, at or above the threshold.
    First,
    /// Most similar entry, if it clears the threshold.
    Best,
}

impl FromStr for MatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::First),
            "best" => Ok(Self::Best),
            other => Err(format!("unknown match strategy: {other}")),
        }
    }
}

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (default: 127.0.0.1:8000).
    pub bind: SocketAddr,
    /// Path to the JSON embedding store.
    pub store_path: PathBuf,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Cosine similarity threshold for a positive match.
    pub similarity_threshold: f32,
    pub match_strategy: MatchStrategy,
    /// Upper bound on a multipart request body, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            store_path: PathBuf::from("encodings.json"),
            model_dir: facegate_core::default_model_dir(),
            similarity_threshold: 0.363,
            match_strategy: MatchStrategy::First,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Unparseable values
    /// fall back to the default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            bind: parsed(&lookup, "FACEGATE_BIND", defaults.bind),
            store_path: lookup("FACEGATE_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            model_dir: lookup("FACEGATE_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            similarity_threshold: parsed(&lookup, "FACEGATE_SIMILARITY_THRESHOLD", defaults.similarity_threshold),
            match_strategy: parsed(&lookup, "FACEGATE_MATCH_STRATEGY", defaults.match_strategy),
            max_upload_bytes: parsed(&lookup, "FACEGATE_MAX_UPLOAD_BYTES", defaults.max_upload_bytes),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "invalid value, using default");
            default
        }),
    }
}
