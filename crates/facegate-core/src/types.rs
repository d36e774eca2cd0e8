use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dimension of embeddings produced by the SFace recognizer.
pub const EMBEDDING_DIM: usize = 128;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face embedding vector (128-dimensional for SFace).
///
/// Serializes as a bare JSON array so the store file stays a plain
/// `{ "user": [f, f, ...] }` mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Compute cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar.
    /// Zero-length or zero-norm inputs compare as 0.0.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let (dot, norm_a, norm_b) = self
            .values
            .iter()
            .zip(other.values.iter())
            .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (a, b)| {
                (dot + a * b, na + a * a, nb + b * b)
            });

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    /// Return a copy scaled to unit L2 norm. Zero vectors are returned unchanged.
    pub fn normalized(&self) -> Embedding {
        let norm = self.values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            Embedding::new(self.values.iter().map(|x| x / norm).collect())
        } else {
            self.clone()
        }
    }
}

/// In-memory form of the embedding store: user id → embedding.
///
/// Iteration is ascending by user id, which fixes the scan order used by
/// [`FirstMatcher`].
pub type Gallery = BTreeMap<String, Embedding>;

/// Result of matching a probe embedding against a gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub matched: bool,
    /// Cosine similarity of the reported entry (the best seen when unmatched).
    pub similarity: f32,
    /// User id of the matched entry (if any).
    pub user_id: Option<String>,
}

impl MatchResult {
    fn miss(best_sim: f32) -> Self {
        Self {
            matched: false,
            similarity: if best_sim == f32::NEG_INFINITY { 0.0 } else { best_sim },
            user_id: None,
        }
    }
}

/// Strategy for comparing a probe embedding against the gallery.
pub trait Matcher: Send + Sync {
    fn compare(&self, probe: &Embedding, gallery: &Gallery, threshold: f32) -> MatchResult;
}

/// Skip entries that cannot be compared with the probe.
fn comparable<'a>(
    probe: &'a Embedding,
    gallery: &'a Gallery,
) -> impl Iterator<Item = (&'a String, &'a Embedding)> + 'a {
    gallery.iter().filter(move |(user_id, stored)| {
        if stored.dim() != probe.dim() {
            tracing::warn!(
                user_id = %user_id,
                stored = stored.dim(),
                probe = probe.dim(),
                "skipping stored embedding with mismatched dimension"
            );
            false
        } else {
            true
        }
    })
}

/// Linear scan returning the first entry whose similarity clears the threshold.
pub struct FirstMatcher;

impl Matcher for FirstMatcher {
    fn compare(&self, probe: &Embedding, gallery: &Gallery, threshold: f32) -> MatchResult {
        let mut best_sim = f32::NEG_INFINITY;

        for (user_id, stored) in comparable(probe, gallery) {
            let sim = probe.similarity(stored);
            if sim >= threshold {
                return MatchResult {
                    matched: true,
                    similarity: sim,
                    user_id: Some(user_id.clone()),
                };
            }
            best_sim = best_sim.max(sim);
        }

        MatchResult::miss(best_sim)
    }
}

/// Cosine matcher with constant-time gallery traversal.
///
/// Always visits every entry and reports the most similar one. On equal
/// similarity the earlier entry wins.
pub struct BestMatcher;

impl Matcher for BestMatcher {
    fn compare(&self, probe: &Embedding, gallery: &Gallery, threshold: f32) -> MatchResult {
        let mut best_sim = f32::NEG_INFINITY;
        let mut best: Option<&String> = None;

        for (user_id, stored) in comparable(probe, gallery) {
            let sim = probe.similarity(stored);
            if sim > best_sim {
                best_sim = sim;
                best = Some(user_id);
            }
        }

        match best {
            Some(user_id) if best_sim >= threshold => MatchResult {
                matched: true,
                similarity: best_sim,
                user_id: Some(user_id.clone()),
            },
            _ => MatchResult::miss(best_sim),
        }
    }
}
