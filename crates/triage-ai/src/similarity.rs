//! Duplicate detection by maximum cosine similarity.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use triage_core::DuplicatePolicy;

use crate::embedder::{Embed, cosine_sim};

/// Outcome of one duplicate check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DuplicateVerdict {
    pub is_duplicate: bool,
    /// Highest similarity against any reference, clamped to `[0, 1]`.
    pub score: f32,
}

impl DuplicateVerdict {
    pub const NONE: Self = Self {
        is_duplicate: false,
        score: 0.0,
    };
}

/// Compares a candidate complaint against complaints already on file.
///
/// Holds a handle to the process-wide embedder; cloning is cheap.
#[derive(Clone)]
pub struct DuplicateDetector {
    embedder: Arc<dyn Embed>,
    policy: DuplicatePolicy,
}

impl DuplicateDetector {
    pub fn new(embedder: Arc<dyn Embed>, policy: DuplicatePolicy) -> Self {
        Self { embedder, policy }
    }

    pub fn policy(&self) -> &DuplicatePolicy {
        &self.policy
    }

    /// Check `candidate` against `references`.
    ///
    /// An empty reference set short-circuits to [`DuplicateVerdict::NONE`]
    /// without touching the embedder.
    pub fn check<S: AsRef<str>>(
        &self,
        candidate: &str,
        references: &[S],
    ) -> anyhow::Result<DuplicateVerdict> {
        if references.is_empty() {
            return Ok(DuplicateVerdict::NONE);
        }

        let mut texts: Vec<&str> = Vec::with_capacity(references.len() + 1);
        texts.push(candidate);
        texts.extend(references.iter().map(|r| r.as_ref()));

        let vectors = self.embedder.embed_batch(&texts)?;
        anyhow::ensure!(
            vectors.len() == texts.len(),
            "embedder returned {} vectors for {} texts",
            vectors.len(),
            texts.len()
        );

        let (query, refs) = vectors.split_at(1);
        let max_sim = refs
            .iter()
            .map(|r| cosine_sim(&query[0], r))
            .fold(f32::NEG_INFINITY, f32::max);
        let score = if max_sim.is_finite() {
            max_sim.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let verdict = DuplicateVerdict {
            is_duplicate: self.policy.is_duplicate(score),
            score,
        };
        debug!(
            references = references.len(),
            score = verdict.score,
            duplicate = verdict.is_duplicate,
            "duplicate check"
        );
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HashEmbedder;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns fixed vectors per text and counts calls.
    struct TableEmbedder {
        vectors: HashMap<String, Vec<f32>>,
        calls: AtomicUsize,
    }

    impl TableEmbedder {
        fn new(rows: &[(&str, [f32; 2])]) -> Self {
            Self {
                vectors: rows.iter().map(|(k, v)| (k.to_string(), v.to_vec())).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Embed for TableEmbedder {
        fn dim(&self) -> usize {
            2
        }

        fn embed_batch(&self, texts: &[&str]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            texts
                .iter()
                .map(|t| {
                    self.vectors
                        .get(*t)
                        .cloned()
                        .ok_or_else(|| anyhow::anyhow!("no vector for {t}"))
                })
                .collect()
        }
    }

    #[test]
    fn empty_references_skip_embedding() {
        let embedder = Arc::new(TableEmbedder::new(&[]));
        let detector = DuplicateDetector::new(embedder.clone(), DuplicatePolicy::default());
        let verdict = detector.check::<&str>("anything", &[]).unwrap();
        assert_eq!(verdict, DuplicateVerdict::NONE);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn similarity_at_threshold_is_not_duplicate() {
        let embedder = Arc::new(TableEmbedder::new(&[("a", [1.0, 0.0]), ("b", [1.0, 0.0])]));
        let detector = DuplicateDetector::new(embedder, DuplicatePolicy::with_threshold(1.0));
        let verdict = detector.check("a", &["b"]).unwrap();
        assert_eq!(verdict.score, 1.0);
        assert!(!verdict.is_duplicate);
    }

    #[test]
    fn takes_maximum_over_references() {
        let embedder = Arc::new(TableEmbedder::new(&[
            ("q", [1.0, 0.0]),
            ("orthogonal", [0.0, 1.0]),
            ("same", [3.0, 0.0]),
        ]));
        let detector = DuplicateDetector::new(embedder, DuplicatePolicy::default());
        let verdict = detector.check("q", &["orthogonal", "same"]).unwrap();
        assert_eq!(verdict.score, 1.0);
        assert!(verdict.is_duplicate);
    }

    #[test]
    fn negative_similarity_clamps_to_zero() {
        let embedder = Arc::new(TableEmbedder::new(&[("q", [1.0, 0.0]), ("opp", [-1.0, 0.0])]));
        let detector = DuplicateDetector::new(embedder, DuplicatePolicy::default());
        let verdict = detector.check("q", &["opp"]).unwrap();
        assert_eq!(verdict.score, 0.0);
        assert!(!verdict.is_duplicate);
    }

    #[test]
    fn embedder_failure_propagates() {
        let embedder = Arc::new(TableEmbedder::new(&[("q", [1.0, 0.0])]));
        let detector = DuplicateDetector::new(embedder, DuplicatePolicy::default());
        assert!(detector.check("q", &["missing"]).is_err());
    }

    #[test]
    fn hash_embedder_flags_reworded_complaint() {
        let detector =
            DuplicateDetector::new(Arc::new(HashEmbedder::default()), DuplicatePolicy::default());
        let existing = [
            "Garbage truck did not come today".to_string(),
            "Street light not working at night".to_string(),
        ];
        let dup = detector
            .check("street light not working at night", &existing)
            .unwrap();
        assert!(dup.is_duplicate, "score {}", dup.score);

        let fresh = detector
            .check("snake found in the residential compound", &existing)
            .unwrap();
        assert!(!fresh.is_duplicate, "score {}", fresh.score);
    }
}
