//! Core types for civic complaint triage: priority tiers, feedback entries,
//! rule-based scoring and the versioned tables that drive it.

pub mod duplicate;
pub mod feedback;
pub mod scoring;
pub mod tier;

pub use duplicate::{DEFAULT_DUPLICATE_THRESHOLD, DUPLICATE_POLICY_VERSION, DuplicatePolicy, PolicyError};
pub use feedback::FeedbackEntry;
pub use scoring::{PriorityScore, ScoringTable, TableError, TierThresholds, score};
pub use tier::{ParseTierError, Tier};

/// Known department labels produced by the category classifier.
pub mod departments {
    pub const ROAD: &str = "Road";
    pub const ELECTRICITY: &str = "Electricity";
    pub const WATER: &str = "Water";
    pub const SANITATION: &str = "Sanitation";
    pub const POLICE: &str = "Police";
    pub const FIRE: &str = "Fire";
    pub const URBAN_PLANNING: &str = "URBAN PLANNING & REGULATION";
    pub const ENVIRONMENTAL: &str = "Environmental Protection";
    pub const ANIMAL_CONTROL: &str = "Animal Control & Veterinary";
    pub const DISASTER: &str = "Disaster Management";
    /// Placeholder for feedback rows that only correct priority.
    pub const OTHER: &str = "Other";
}
