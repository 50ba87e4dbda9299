//! Merging feedback into the base corpus and fitting both model kinds.

use triage_ai::{LabeledText, TextClassifier, TrainError, Trainer};
use triage_core::{FeedbackEntry, Tier};
use triage_store::ModelKind;
use tracing::{debug, info};

use crate::dataset::TrainingRow;

/// Merged rows ready for fitting.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub rows: Vec<TrainingRow>,
    /// Ledger entries that contributed a row.
    pub feedback_rows: usize,
    /// Ledger entries that corrected nothing and were left out.
    pub skipped: usize,
}

impl TrainingSet {
    pub fn base_only(base: Vec<TrainingRow>) -> Self {
        Self {
            rows: base,
            feedback_rows: 0,
            skipped: 0,
        }
    }

    /// Base rows followed by one row per non-empty feedback entry, with the
    /// placeholders filling whichever correction is missing.
    pub fn merge(
        base: Vec<TrainingRow>,
        feedback: &[FeedbackEntry],
        placeholder_category: &str,
        placeholder_priority: Tier,
    ) -> Self {
        let mut rows = base;
        let mut feedback_rows = 0;
        let mut skipped = 0;

        for entry in feedback {
            if entry.is_empty() {
                skipped += 1;
                continue;
            }
            rows.push(TrainingRow {
                text: entry.text.clone(),
                category: entry
                    .corrected_category
                    .clone()
                    .unwrap_or_else(|| placeholder_category.to_string()),
                priority: entry.corrected_priority.unwrap_or(placeholder_priority),
            });
            feedback_rows += 1;
        }

        if skipped > 0 {
            debug!(skipped, "feedback entries without corrections left out of training");
        }
        Self {
            rows,
            feedback_rows,
            skipped,
        }
    }

    /// Examples labelled for one model kind.
    pub fn examples(&self, kind: ModelKind) -> Vec<LabeledText> {
        self.rows
            .iter()
            .map(|row| match kind {
                ModelKind::Category => LabeledText::new(row.text.as_str(), row.category.as_str()),
                ModelKind::Priority => LabeledText::new(row.text.as_str(), row.priority.as_str()),
            })
            .collect()
    }
}

/// Fit one kind.
pub fn fit_kind(
    trainer: &dyn Trainer,
    set: &TrainingSet,
    kind: ModelKind,
) -> Result<TextClassifier, TrainError> {
    let examples = set.examples(kind);
    let model = trainer.fit(&examples)?;
    info!(
        kind = %kind,
        examples = examples.len(),
        labels = model.labels().count(),
        vocabulary = model.vocabulary_len(),
        "fitted model"
    );
    Ok(model)
}

/// Category and priority models fitted from the same rows.
pub struct FittedPair {
    pub category: TextClassifier,
    pub priority: TextClassifier,
}

pub fn fit_both(trainer: &dyn Trainer, set: &TrainingSet) -> Result<FittedPair, TrainError> {
    Ok(FittedPair {
        category: fit_kind(trainer, set, ModelKind::Category)?,
        priority: fit_kind(trainer, set, ModelKind::Priority)?,
    })
}
