//! Request-level facade: validation, prediction policy, and the JSON
//! contract for the four public operations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use triage_ai::{DuplicateDetector, DuplicateVerdict, Embed};
use triage_core::{FeedbackEntry, PriorityScore, Tier, TierThresholds};

use crate::lifecycle::{ModelManager, RetrainAck};
use crate::EngineError;

#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictResponse {
    pub category: String,
    pub priority_score: u8,
    pub priority_level: Tier,
    pub ai_confidence: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuplicateRequest {
    pub new_complaint: String,
    #[serde(default)]
    pub existing_complaints: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub text: String,
    #[serde(default)]
    pub correct_category: Option<String>,
    /// Tier name, any case.
    #[serde(default)]
    pub correct_priority: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrainResponse {
    pub status: RetrainAck,
    pub message: &'static str,
}

/// Final priority from the rule score and the learned tier.
///
/// The higher tier wins. When the learned tier is higher, the score is lifted
/// to that tier's lower bound so score and tier stay consistent.
pub fn blend_priority(
    rule: PriorityScore,
    learned: Option<Tier>,
    thresholds: &TierThresholds,
) -> PriorityScore {
    match learned {
        Some(tier) if tier > rule.tier => PriorityScore {
            score: thresholds.floor(tier).max(rule.score),
            tier,
        },
        _ => rule,
    }
}

/// The four public operations over one [`ModelManager`].
pub struct TriageService {
    manager: ModelManager,
    detector: DuplicateDetector,
}

impl TriageService {
    pub fn new(manager: ModelManager, embedder: Arc<dyn Embed>) -> Self {
        let detector = DuplicateDetector::new(embedder, manager.config().duplicate);
        Self { manager, detector }
    }

    pub fn manager(&self) -> &ModelManager {
        &self.manager
    }

    /// Department, urgency, and model confidence for one complaint.
    pub fn predict(&self, req: &PredictRequest) -> Result<PredictResponse, EngineError> {
        let text = require_text(&req.text, "text")?;
        let generation = self.manager.snapshot()?;
        let scoring = &self.manager.config().scoring;

        let category = generation.category.predict_with_confidence(text);
        let rule = scoring.score(text, &category.label);
        let learned = match generation.priority.predict(text).parse::<Tier>() {
            Ok(tier) => Some(tier),
            Err(e) => {
                debug!(error = %e, "priority model returned an unknown label");
                None
            }
        };
        let priority = blend_priority(rule, learned, &scoring.thresholds);

        debug!(
            generation = generation.id,
            category = %category.label,
            confidence = category.confidence,
            rule_score = rule.score,
            learned = ?learned,
            score = priority.score,
            "predicted"
        );
        Ok(PredictResponse {
            category: category.label,
            priority_score: priority.score,
            priority_level: priority.tier,
            ai_confidence: round2(category.confidence),
        })
    }

    /// Whether a new complaint repeats any of the existing ones.
    pub fn check_duplicate(&self, req: &DuplicateRequest) -> Result<DuplicateVerdict, EngineError> {
        let candidate = require_text(&req.new_complaint, "new_complaint")?;
        self.detector
            .check(candidate, req.existing_complaints.as_slice())
            .map_err(EngineError::Inference)
    }

    /// Record a correction. Entries that correct nothing are still recorded
    /// but flagged, since training will ignore them.
    pub fn submit_feedback(&self, req: &FeedbackRequest) -> Result<FeedbackAck, EngineError> {
        let text = require_text(&req.text, "text")?;
        let priority = match req.correct_priority.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<Tier>()
                    .map_err(|e| EngineError::InvalidInput(e.to_string()))?,
            ),
        };
        let entry = FeedbackEntry::new(text, req.correct_category.clone(), priority);

        self.manager.ledger().append(&entry)?;
        let warning = entry.is_empty().then(|| {
            "feedback has neither a category nor a priority correction; recorded but not used for training"
                .to_string()
        });
        Ok(FeedbackAck {
            status: "recorded",
            warning,
        })
    }

    /// Queue a background retrain.
    pub fn trigger_retrain(&self) -> Result<RetrainResponse, EngineError> {
        let status = self.manager.trigger_retrain()?;
        let message = match status {
            RetrainAck::Queued => "retraining started in the background",
            RetrainAck::Coalesced => "a retrain is already pending and will include this request",
        };
        Ok(RetrainResponse { status, message })
    }
}

fn require_text<'a>(value: &'a str, field: &str) -> Result<&'a str, EngineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(trimmed)
}

fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::lifecycle::RetrainOutcome;
    use tempfile::TempDir;
    use triage_ai::{CentroidTrainer, HashEmbedder};
    use triage_core::ScoringTable;

    async fn service(dir: &TempDir) -> TriageService {
        let config = EngineConfig {
            retrain_interval_secs: 0,
            ..EngineConfig::with_data_dir(dir.path())
        };
        let manager = ModelManager::launch(config, Arc::new(CentroidTrainer))
            .await
            .unwrap();
        TriageService::new(manager, Arc::new(HashEmbedder::default()))
    }

    fn predict(text: &str) -> PredictRequest {
        PredictRequest { text: text.into() }
    }

    #[test]
    fn blend_keeps_higher_rule_tier() {
        let t = ScoringTable::default().thresholds;
        let rule = PriorityScore { score: 75, tier: Tier::High };
        assert_eq!(blend_priority(rule, Some(Tier::Low), &t), rule);
        assert_eq!(blend_priority(rule, None, &t), rule);
    }

    #[test]
    fn blend_lifts_score_to_learned_tier() {
        let t = ScoringTable::default().thresholds;
        let rule = PriorityScore { score: 35, tier: Tier::Low };
        assert_eq!(
            blend_priority(rule, Some(Tier::High), &t),
            PriorityScore { score: 70, tier: Tier::High }
        );
    }

    #[tokio::test]
    async fn predict_routes_and_scores() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir).await;

        let resp = svc.predict(&predict("No water supply since yesterday morning")).unwrap();
        assert_eq!(resp.category, "Water");
        assert!(resp.priority_score <= 100);
        assert!((0.0..=1.0).contains(&resp.ai_confidence));

        let json = serde_json::to_value(&resp).unwrap();
        for field in ["category", "priority_score", "priority_level", "ai_confidence"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }

    #[tokio::test]
    async fn critical_keyword_wins() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir).await;
        let resp = svc
            .predict(&predict("minor pothole but unconscious victim"))
            .unwrap();
        assert_eq!(resp.priority_score, 100);
        assert_eq!(resp.priority_level, Tier::Critical);
    }

    #[tokio::test]
    async fn blank_input_is_rejected() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir).await;
        assert!(matches!(
            svc.predict(&predict("   ")),
            Err(EngineError::InvalidInput(_))
        ));
        let req = DuplicateRequest {
            new_complaint: "".into(),
            existing_complaints: vec!["x".into()],
        };
        assert!(matches!(
            svc.check_duplicate(&req),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_check() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir).await;

        let none = svc
            .check_duplicate(&DuplicateRequest {
                new_complaint: "pothole on main road".into(),
                existing_complaints: vec![],
            })
            .unwrap();
        assert_eq!(none, DuplicateVerdict::NONE);

        let same = svc
            .check_duplicate(&DuplicateRequest {
                new_complaint: "Garbage not collected on Elm street".into(),
                existing_complaints: vec![
                    "Street light broken".into(),
                    "garbage not collected on elm street".into(),
                ],
            })
            .unwrap();
        assert!(same.is_duplicate);
        assert!(same.score > 0.99);
    }

    #[tokio::test]
    async fn feedback_is_recorded_and_flagged() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir).await;

        let ack = svc
            .submit_feedback(&FeedbackRequest {
                text: "Stray cattle on the flyover".into(),
                correct_category: Some("Animal Control & Veterinary".into()),
                correct_priority: Some("high".into()),
            })
            .unwrap();
        assert!(ack.warning.is_none());

        let ack = svc
            .submit_feedback(&FeedbackRequest {
                text: "no corrections here".into(),
                correct_category: Some("  ".into()),
                correct_priority: None,
            })
            .unwrap();
        assert!(ack.warning.is_some());

        let bad = svc.submit_feedback(&FeedbackRequest {
            text: "urgent!".into(),
            correct_category: None,
            correct_priority: Some("asap".into()),
        });
        assert!(matches!(bad, Err(EngineError::InvalidInput(_))));

        let entries = svc.manager().ledger().read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].corrected_priority, Some(Tier::High));
        assert!(entries[1].is_empty());
    }

    #[tokio::test]
    async fn feedback_changes_predictions_after_retrain() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir).await;
        let text = "Hoarding sign swaying over the bus stop";

        for _ in 0..3 {
            svc.submit_feedback(&FeedbackRequest {
                text: text.into(),
                correct_category: Some("URBAN PLANNING & REGULATION".into()),
                correct_priority: Some("High".into()),
            })
            .unwrap();
        }
        assert!(matches!(
            svc.manager().retrain_now().await,
            RetrainOutcome::Retrained { .. }
        ));

        let resp = svc.predict(&predict(text)).unwrap();
        assert_eq!(resp.category, "URBAN PLANNING & REGULATION");
        assert_eq!(resp.priority_level, Tier::High);
        assert_eq!(resp.priority_score, 70);
    }

    #[tokio::test]
    async fn trigger_retrain_acknowledges() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir).await;
        let resp = svc.trigger_retrain().unwrap();
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json["status"] == "queued" || json["status"] == "coalesced");
    }
}
