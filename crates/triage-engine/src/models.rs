//! The active model generation and its hot-swap slot.
//!
//! A [`Generation`] bundles one model per [`ModelKind`]; both are replaced
//! together. Readers take a cheap `Arc` snapshot and keep using it for the
//! whole request, so a publish never disturbs work already in flight.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use triage_ai::TextClassifier;
use triage_store::ModelKind;

/// Where a generation's models came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "source")]
pub enum GenerationOrigin {
    /// Read back from persisted artifacts.
    Loaded,
    /// Fitted at startup from the base corpus, at least in part.
    BaseData,
    /// Fitted by a retrain over base data plus feedback.
    Retrained { feedback_rows: usize },
}

/// An immutable set of trained models.
#[derive(Debug)]
pub struct Generation {
    pub id: u64,
    pub category: TextClassifier,
    pub priority: TextClassifier,
    pub trained_at: DateTime<Utc>,
    pub origin: GenerationOrigin,
}

impl Generation {
    pub fn model(&self, kind: ModelKind) -> &TextClassifier {
        match kind {
            ModelKind::Category => &self.category,
            ModelKind::Priority => &self.priority,
        }
    }
}

/// Slot holding the generation that serves predictions.
///
/// The lock only guards an `Arc` clone or replacement and is never held
/// across training or inference.
#[derive(Debug)]
pub struct ActiveModels {
    current: RwLock<Arc<Generation>>,
}

impl ActiveModels {
    pub fn new(initial: Generation) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// The generation to use for one request.
    pub fn snapshot(&self) -> Arc<Generation> {
        // A poisoned lock still holds a valid Arc; nothing is mid-update.
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the active generation. Returns the newly published one.
    pub fn publish(&self, next: Generation) -> Arc<Generation> {
        let next = Arc::new(next);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::clone(&next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_ai::LabeledText;

    fn generation(id: u64, label: &str) -> Generation {
        let model = TextClassifier::fit(&[LabeledText::new("pothole on the road", label)]).unwrap();
        Generation {
            id,
            category: model.clone(),
            priority: model,
            trained_at: Utc::now(),
            origin: GenerationOrigin::BaseData,
        }
    }

    #[test]
    fn held_snapshot_survives_publish() {
        let active = ActiveModels::new(generation(1, "Road"));
        let held = active.snapshot();

        active.publish(generation(2, "Sanitation"));

        assert_eq!(held.id, 1);
        assert_eq!(held.category.predict("pothole"), "Road");
        let fresh = active.snapshot();
        assert_eq!(fresh.id, 2);
        assert_eq!(fresh.model(ModelKind::Category).predict("pothole"), "Sanitation");
    }

    #[test]
    fn snapshots_share_one_allocation() {
        let active = ActiveModels::new(generation(1, "Road"));
        assert!(Arc::ptr_eq(&active.snapshot(), &active.snapshot()));
    }

    #[test]
    fn concurrent_readers_see_whole_generations() {
        let active = Arc::new(ActiveModels::new(generation(0, "g0")));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let active = Arc::clone(&active);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let g = active.snapshot();
                        let expected = format!("g{}", g.id);
                        assert_eq!(g.category.predict("pothole"), expected);
                        assert_eq!(g.priority.predict("pothole"), expected);
                    }
                })
            })
            .collect();
        for id in 1..=20 {
            active.publish(generation(id, &format!("g{id}")));
        }
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(active.snapshot().id, 20);
    }
}
