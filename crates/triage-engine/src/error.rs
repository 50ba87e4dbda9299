use thiserror::Error;
use triage_ai::TrainError;
use triage_core::TableError;
use triage_store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("training failed: {0}")]
    Train(#[from] TrainError),

    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),

    #[error("scoring table: {0}")]
    Table(#[from] TableError),

    #[error("config error: {0}")]
    Config(String),

    #[error("model manager is not ready: {0}")]
    NotReady(String),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
