//! Duplicate verdict policy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current layout of [`DuplicatePolicy`].
pub const DUPLICATE_POLICY_VERSION: u32 = 1;

/// Canonical similarity threshold. A pair is a duplicate only when its
/// similarity is strictly greater than this value.
pub const DEFAULT_DUPLICATE_THRESHOLD: f32 = 0.60;

#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("unsupported duplicate policy version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("duplicate threshold {0} is outside [0, 1]")]
    Threshold(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DuplicatePolicy {
    pub version: u32,
    pub threshold: f32,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        Self {
            version: DUPLICATE_POLICY_VERSION,
            threshold: DEFAULT_DUPLICATE_THRESHOLD,
        }
    }
}

impl DuplicatePolicy {
    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    /// Reject policies written for another layout or with an unusable threshold.
    pub fn validated(self) -> Result<Self, PolicyError> {
        if self.version != DUPLICATE_POLICY_VERSION {
            return Err(PolicyError::Version {
                found: self.version,
                expected: DUPLICATE_POLICY_VERSION,
            });
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(PolicyError::Threshold(self.threshold));
        }
        Ok(self)
    }

    /// Exclusive comparison: a similarity equal to the threshold is not a duplicate.
    pub fn is_duplicate(&self, similarity: f32) -> bool {
        similarity > self.threshold
    }
}
