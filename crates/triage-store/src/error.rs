use thiserror::Error;

use crate::ModelKind;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{kind} artifact has format version {found}, expected {expected}")]
    ArtifactVersion {
        kind: ModelKind,
        found: u32,
        expected: u32,
    },

    #[error("artifact file for {expected} holds a {found} model")]
    ArtifactKind { expected: ModelKind, found: ModelKind },

    #[error("{0}")]
    Other(String),
}

impl From<tempfile::PersistError> for StoreError {
    fn from(e: tempfile::PersistError) -> Self {
        Self::Io(e.error)
    }
}
