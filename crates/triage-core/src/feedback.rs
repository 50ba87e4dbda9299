//! Operator corrections fed back into training.

use serde::{Deserialize, Serialize};

use crate::Tier;

/// One operator correction.
///
/// Either correction may be absent. An entry with neither is still a valid
/// ledger row but carries no training signal (see [`is_empty`](Self::is_empty)).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub text: String,
    pub corrected_category: Option<String>,
    pub corrected_priority: Option<Tier>,
}

impl FeedbackEntry {
    pub fn new(
        text: impl Into<String>,
        corrected_category: Option<String>,
        corrected_priority: Option<Tier>,
    ) -> Self {
        let corrected_category = corrected_category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        Self {
            text: text.into(),
            corrected_category,
            corrected_priority,
        }
    }

    /// True when the entry corrects neither category nor priority.
    pub fn is_empty(&self) -> bool {
        self.corrected_category.is_none() && self.corrected_priority.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_category_is_dropped() {
        let entry = FeedbackEntry::new("pothole", Some("   ".into()), None);
        assert!(entry.corrected_category.is_none());
        assert!(entry.is_empty());
    }

    #[test]
    fn partial_entries_are_not_empty() {
        assert!(!FeedbackEntry::new("x", Some("Road".into()), None).is_empty());
        assert!(!FeedbackEntry::new("x", None, Some(Tier::High)).is_empty());
    }
}
