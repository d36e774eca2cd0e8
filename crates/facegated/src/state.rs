use crate::config::{Config, MatchStrategy};
use crate::engine::EngineHandle;
use facegate_core::{BestMatcher, EmbeddingStore, FirstMatcher, Matcher};
use std::sync::Arc;

/// Shared handler state. Cheap to clone; holds no gallery data, the store is
/// read fresh on every request.
#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub store: Arc<dyn EmbeddingStore>,
    pub matcher: Arc<dyn Matcher>,
    pub threshold: f32,
}

impl AppState {
    pub fn new(engine: EngineHandle, store: Arc<dyn EmbeddingStore>, config: &Config) -> Self {
        let matcher: Arc<dyn Matcher> = match config.match_strategy {
            MatchStrategy::First => Arc::new(FirstMatcher),
            MatchStrategy::Best => Arc::new(BestMatcher),
        };
        Self {
            engine,
            store,
            matcher,
            threshold: config.similarity_threshold,
        }
    }
}
