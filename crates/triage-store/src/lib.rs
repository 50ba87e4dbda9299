//! Storage layer: append-only feedback ledger (CSV) and model artifacts (JSON).

mod artifacts;
mod error;
mod ledger;

pub use artifacts::{ARTIFACT_FORMAT_VERSION, Artifact, ArtifactStore, ModelKind};
pub use error::StoreError;
pub use ledger::{FEEDBACK_FILE, FeedbackLedger};
