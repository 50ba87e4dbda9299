//! Rule-based urgency scoring.
//!
//! Maps `(text, category)` to a score in `[0, 100]` and a [`Tier`]. The
//! function is pure: every weight, keyword and threshold comes from a
//! [`ScoringTable`], which is versioned configuration rather than inline
//! literals.
//!
//! # Algorithm
//!
//! 1. Critical keyword present → `(100, Critical)`, nothing else is evaluated
//! 2. Base weight for the category (table default when unknown)
//! 3. Fall context (`fall`, `fell`, `jump`): add the height bucket for an
//!    extracted floor number if positive, else a flat bonus
//! 4. `urgent_step` points per urgent keyword present
//! 5. Clamp to `[0, 100]`, then map to a tier by inclusive lower bounds

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Tier;

/// Current layout of [`ScoringTable`]. Bump when fields change meaning.
pub const SCORING_TABLE_VERSION: u32 = 1;

/// `<number><ordinal?> floor|storey|story|building`; `ground` reads as 0.
static HEIGHT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+|ground)\s*(?:st|nd|rd|th)?[\s-]*(?:floor|storey|story|building)")
        .expect("height pattern is valid")
});

#[derive(Debug, Error)]
pub enum TableError {
    #[error("reading table: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing table: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported table version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("invalid table: {0}")]
    Invalid(String),
}

/// Extra points awarded for the floor a fall happened from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightBuckets {
    /// Floors strictly above this count as high-rise.
    pub high_rise_above: u32,
    pub high_rise: u8,
    pub low_rise: u8,
    pub ground: u8,
}

/// Inclusive lower bounds for each tier above `Low`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub critical: u8,
    pub high: u8,
    pub medium: u8,
}

impl TierThresholds {
    pub fn tier_for(&self, score: u8) -> Tier {
        if score >= self.critical {
            Tier::Critical
        } else if score >= self.high {
            Tier::High
        } else if score >= self.medium {
            Tier::Medium
        } else {
            Tier::Low
        }
    }

    /// Lowest score that still maps to `tier`.
    pub fn floor(&self, tier: Tier) -> u8 {
        match tier {
            Tier::Critical => self.critical,
            Tier::High => self.high,
            Tier::Medium => self.medium,
            Tier::Low => 0,
        }
    }
}

/// Versioned weights and keyword sets consumed by [`ScoringTable::score`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringTable {
    pub version: u32,
    /// Base weight per category, matched case-insensitively.
    pub category_weights: BTreeMap<String, u8>,
    pub default_weight: u8,
    pub critical_keywords: Vec<String>,
    pub urgent_keywords: Vec<String>,
    pub fall_keywords: Vec<String>,
    pub urgent_step: u8,
    /// Added when a fall is mentioned without an extractable height.
    pub fall_bonus: u8,
    pub height: HeightBuckets,
    pub thresholds: TierThresholds,
}

/// Result of scoring one complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityScore {
    pub score: u8,
    pub tier: Tier,
}

impl Default for ScoringTable {
    fn default() -> Self {
        let category_weights = [
            ("Fire", 60),
            ("Disaster Management", 60),
            ("Electricity", 50),
            ("Police", 45),
            ("Water", 40),
            ("Road", 35),
            ("Sanitation", 30),
            ("Animal Control & Veterinary", 30),
            ("Environmental Protection", 30),
            ("URBAN PLANNING & REGULATION", 20),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            version: SCORING_TABLE_VERSION,
            category_weights,
            default_weight: 30,
            critical_keywords: words(&[
                "death",
                "dead",
                "blood",
                "explosion",
                "blast",
                "gas leak",
                "collapse",
                "unconscious",
                "not breathing",
                "severe head injury",
            ]),
            urgent_keywords: words(&[
                "fire",
                "spark",
                "wire",
                "current",
                "accident",
                "injury",
                "broken",
                "fracture",
                "bleeding",
                "attack",
                "emergency",
            ]),
            fall_keywords: words(&["fall", "fell", "jump"]),
            urgent_step: 10,
            fall_bonus: 15,
            height: HeightBuckets {
                high_rise_above: 3,
                high_rise: 40,
                low_rise: 20,
                ground: 5,
            },
            thresholds: TierThresholds {
                critical: 90,
                high: 70,
                medium: 40,
            },
        }
    }
}

impl ScoringTable {
    /// Load a table from a JSON file and validate it.
    pub fn load(path: &Path) -> Result<Self, TableError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parse a table from JSON. Keywords are lower-cased so matching stays
    /// case-insensitive.
    pub fn from_json(raw: &str) -> Result<Self, TableError> {
        let table: ScoringTable = serde_json::from_str(raw)?;
        table.normalized()
    }

    /// Check the version and thresholds, and lower-case every keyword.
    pub fn normalized(mut self) -> Result<Self, TableError> {
        if self.version != SCORING_TABLE_VERSION {
            return Err(TableError::Version {
                found: self.version,
                expected: SCORING_TABLE_VERSION,
            });
        }
        for list in [
            &mut self.critical_keywords,
            &mut self.urgent_keywords,
            &mut self.fall_keywords,
        ] {
            for kw in list.iter_mut() {
                *kw = kw.trim().to_lowercase();
            }
            list.retain(|kw| !kw.is_empty());
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), TableError> {
        let t = &self.thresholds;
        if !(t.medium < t.high && t.high < t.critical && t.critical <= 100) {
            return Err(TableError::Invalid(format!(
                "thresholds must satisfy medium < high < critical <= 100, got {}/{}/{}",
                t.medium, t.high, t.critical
            )));
        }
        if t.medium == 0 {
            return Err(TableError::Invalid("medium threshold must be above 0".into()));
        }
        Ok(())
    }

    /// Base weight for a category, falling back to `default_weight`.
    pub fn base_weight(&self, category: &str) -> u8 {
        let category = category.trim();
        self.category_weights
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(category))
            .map(|(_, &w)| w)
            .unwrap_or(self.default_weight)
    }

    /// Height bucket for the first floor reference in `lower`, if any.
    pub fn height_points(&self, lower: &str) -> u8 {
        match extract_floor(lower) {
            None => 0,
            Some(0) => self.height.ground,
            Some(n) if n > self.height.high_rise_above => self.height.high_rise,
            Some(_) => self.height.low_rise,
        }
    }

    /// Score a complaint. Pure and total.
    pub fn score(&self, text: &str, category: &str) -> PriorityScore {
        let lower = text.to_lowercase();

        if contains_any(&lower, &self.critical_keywords) {
            return PriorityScore {
                score: 100,
                tier: Tier::Critical,
            };
        }

        let mut total = i32::from(self.base_weight(category));

        if contains_any(&lower, &self.fall_keywords) {
            let height = self.height_points(&lower);
            total += if height > 0 {
                i32::from(height)
            } else {
                i32::from(self.fall_bonus)
            };
        }

        let urgent = self
            .urgent_keywords
            .iter()
            .filter(|kw| lower.contains(kw.as_str()))
            .count() as i32;
        total += urgent * i32::from(self.urgent_step);

        let score = total.clamp(0, 100) as u8;
        PriorityScore {
            score,
            tier: self.thresholds.tier_for(score),
        }
    }
}

/// Score with the canonical table.
pub fn score(text: &str, category: &str) -> PriorityScore {
    static CANONICAL: LazyLock<ScoringTable> = LazyLock::new(ScoringTable::default);
    CANONICAL.score(text, category)
}

fn extract_floor(lower: &str) -> Option<u32> {
    let caps = HEIGHT_PATTERN.captures(lower)?;
    let number = caps.get(1)?.as_str();
    if number.eq_ignore_ascii_case("ground") {
        return Some(0);
    }
    // Absurdly long digit runs still mean "very high".
    Some(number.parse().unwrap_or(u32::MAX))
}

fn contains_any(lower: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|kw| lower.contains(kw.as_str()))
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ps(score: u8, tier: Tier) -> PriorityScore {
        PriorityScore { score, tier }
    }

    #[test]
    fn deterministic() {
        let text = "Electric wire hanging loose, sparks near the school";
        assert_eq!(score(text, "Electricity"), score(text, "Electricity"));
    }

    #[test]
    fn critical_keyword_overrides_everything() {
        assert_eq!(
            score("minor pothole but unconscious victim", "Road"),
            ps(100, Tier::Critical)
        );
        assert_eq!(
            score("GAS LEAK in the basement", "Urban Planning"),
            ps(100, Tier::Critical)
        );
    }

    #[test]
    fn fall_from_high_floor() {
        // Road 35 + high-rise 40.
        assert_eq!(score("person fell from 5th floor", "Road"), ps(75, Tier::High));
    }

    #[test]
    fn fall_from_ground_floor() {
        // Road 35 + ground 5.
        assert_eq!(
            score("person fell from ground floor", "Road"),
            ps(40, Tier::Medium)
        );
    }

    #[test]
    fn fall_from_low_floor() {
        // Road 35 + low-rise 20.
        assert_eq!(
            score("child jumped from the 2nd storey", "Road"),
            ps(55, Tier::Medium)
        );
    }

    #[test]
    fn fall_without_height_gets_flat_bonus() {
        // Road 35 + flat 15.
        assert_eq!(score("someone fell", "Road"), ps(50, Tier::Medium));
    }

    #[test]
    fn height_without_fall_adds_nothing() {
        assert_eq!(
            score("water leaking on the 7th floor", "Water"),
            ps(40, Tier::Medium)
        );
    }

    #[test]
    fn urgent_keywords_count_once_each() {
        // Electricity 50 + spark, broken, wire, accident.
        assert_eq!(
            score("sparks from a broken wire caused an accident", "Electricity"),
            ps(90, Tier::Critical)
        );
        // Repeating a keyword does not add more.
        assert_eq!(
            score("fire fire fire", "Sanitation"),
            ps(40, Tier::Medium)
        );
    }

    #[test]
    fn clamps_to_hundred() {
        let s = score(
            "fire emergency accident injury bleeding attack spark",
            "Fire",
        );
        assert_eq!(s, ps(100, Tier::Critical));
    }

    #[test]
    fn unknown_category_uses_default_weight() {
        assert_eq!(score("overgrown grass", "Parks"), ps(30, Tier::Low));
    }

    #[test]
    fn category_lookup_ignores_case() {
        let table = ScoringTable::default();
        assert_eq!(table.base_weight("fire"), 60);
        assert_eq!(table.base_weight("urban planning & regulation"), 20);
    }

    #[test]
    fn tier_matches_thresholds_for_every_score() {
        let t = ScoringTable::default().thresholds;
        for s in 0..=100u8 {
            let expected = match s {
                90..=100 => Tier::Critical,
                70..=89 => Tier::High,
                40..=69 => Tier::Medium,
                _ => Tier::Low,
            };
            assert_eq!(t.tier_for(s), expected, "score {s}");
            assert!(t.floor(t.tier_for(s)) <= s);
        }
    }

    #[test]
    fn extract_floor_variants() {
        assert_eq!(extract_floor("fell from 12th floor"), Some(12));
        assert_eq!(extract_floor("from the 3 storey building"), Some(3));
        assert_eq!(extract_floor("ground floor"), Some(0));
        assert_eq!(extract_floor("a 1st-floor balcony"), Some(1));
        assert_eq!(extract_floor("nothing here"), None);
        assert_eq!(extract_floor("99999999999999 floor"), Some(u32::MAX));
    }

    #[test]
    fn table_json_round_trip_lowercases_keywords() {
        let mut table = ScoringTable::default();
        table.urgent_keywords.push("  FLOOD ".into());
        let json = serde_json::to_string(&table).unwrap();
        let parsed = ScoringTable::from_json(&json).unwrap();
        assert!(parsed.urgent_keywords.contains(&"flood".to_string()));
        assert_eq!(parsed.score("Flood in the lane", "Road").score, 45);
    }

    #[test]
    fn table_rejects_wrong_version() {
        let mut table = ScoringTable::default();
        table.version = 99;
        let json = serde_json::to_string(&table).unwrap();
        assert!(matches!(
            ScoringTable::from_json(&json),
            Err(TableError::Version { found: 99, .. })
        ));
    }

    #[test]
    fn table_rejects_unordered_thresholds() {
        let mut table = ScoringTable::default();
        table.thresholds.high = 95;
        let json = serde_json::to_string(&table).unwrap();
        assert!(matches!(
            ScoringTable::from_json(&json),
            Err(TableError::Invalid(_))
        ));
    }
}
