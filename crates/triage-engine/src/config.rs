//! Engine configuration.
//!
//! Everything tunable lives in one JSON document. Missing fields take their
//! defaults, so `{}` is a valid config. The binary layers CLI flags and
//! environment variables on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use triage_core::{DuplicatePolicy, ScoringTable, Tier, departments};

use crate::EngineError;

/// One week.
pub const DEFAULT_RETRAIN_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Holds `feedback.csv` and the model artifacts.
    pub data_dir: PathBuf,
    /// Scheduled retrain period. Zero disables the scheduler.
    pub retrain_interval_secs: u64,
    /// Category used for feedback rows that only correct the priority.
    pub placeholder_category: String,
    /// Priority used for feedback rows that only correct the category.
    pub placeholder_priority: Tier,
    pub scoring: ScoringTable,
    pub duplicate: DuplicatePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            retrain_interval_secs: DEFAULT_RETRAIN_INTERVAL_SECS,
            placeholder_category: departments::OTHER.to_string(),
            placeholder_priority: Tier::Medium,
            scoring: ScoringTable::default(),
            duplicate: DuplicatePolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Read a JSON config file and validate it.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, EngineError> {
        let config: EngineConfig =
            serde_json::from_str(raw).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validated()
    }

    /// Normalize the scoring table and reject values the engine cannot use,
    /// including tables or policies from another format version.
    pub fn validated(mut self) -> Result<Self, EngineError> {
        self.scoring = self.scoring.normalized()?;
        self.placeholder_category = self.placeholder_category.trim().to_string();
        if self.placeholder_category.is_empty() {
            return Err(EngineError::Config(
                "placeholder_category must not be blank".into(),
            ));
        }
        self.duplicate = self
            .duplicate
            .validated()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        Ok(self)
    }

    /// `None` when scheduled retraining is disabled.
    pub fn retrain_interval(&self) -> Option<Duration> {
        (self.retrain_interval_secs > 0).then(|| Duration::from_secs(self.retrain_interval_secs))
    }
}
