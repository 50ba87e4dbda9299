//! Civic complaint triage: model lifecycle and the request facade.
//!
//! [`ModelManager`] owns the active model generation and replaces it on
//! retrain; [`TriageService`] validates requests and answers `predict`,
//! `check_duplicate`, `submit_feedback` and `trigger_retrain`.

pub mod config;
pub mod dataset;
mod error;
pub mod lifecycle;
pub mod models;
pub mod service;
pub mod training;

pub use config::EngineConfig;
pub use error::EngineError;
pub use lifecycle::{
    LifecycleState, ManagerStatus, ModelManager, RetrainAck, RetrainOutcome, RetrainReport,
    RetrainTrigger,
};
pub use models::{ActiveModels, Generation, GenerationOrigin};
pub use service::{
    DuplicateRequest, FeedbackAck, FeedbackRequest, PredictRequest, PredictResponse,
    RetrainResponse, TriageService, blend_priority,
};
