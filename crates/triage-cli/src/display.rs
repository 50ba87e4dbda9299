//! Vertical card display for predictions, retrain outcomes and engine status.
//!
//! Each card is a title line followed by labelled sections; empty values are
//! skipped so the cards stay short.

use std::fmt::Write;

use triage_ai::DuplicateVerdict;
use triage_engine::{
    FeedbackAck, GenerationOrigin, ManagerStatus, PredictResponse, RetrainOutcome,
};

const LABEL_WIDTH: usize = 22;
const MAX_LIST_ITEMS: usize = 10;

// ── Public API ──

pub fn prediction_card(text: &str, resp: &PredictResponse) -> String {
    let mut out = String::new();
    title(&mut out, "Prediction");
    row(&mut out, "complaint", text);
    section(&mut out, "Routing");
    row(&mut out, "category", &resp.category);
    row(&mut out, "confidence", &format!("{:.2}", resp.ai_confidence));
    section(&mut out, "Urgency");
    row(&mut out, "priority_level", resp.priority_level.as_str());
    row(&mut out, "priority_score", &resp.priority_score.to_string());
    out
}

pub fn duplicate_card(verdict: &DuplicateVerdict, compared: usize) -> String {
    let mut out = String::new();
    title(&mut out, "Duplicate check");
    row(&mut out, "compared against", &compared.to_string());
    row(&mut out, "is_duplicate", yes_no(verdict.is_duplicate));
    row(&mut out, "score", &format!("{:.3}", verdict.score));
    out
}

pub fn feedback_card(ack: &FeedbackAck) -> String {
    let mut out = String::new();
    title(&mut out, "Feedback");
    row(&mut out, "status", ack.status);
    if let Some(warning) = &ack.warning {
        row(&mut out, "warning", warning);
    }
    out
}

pub fn outcome_card(outcome: &RetrainOutcome) -> String {
    let mut out = String::new();
    title(&mut out, "Retrain");
    match outcome {
        RetrainOutcome::NoFeedback => {
            row(&mut out, "outcome", "nothing to do: feedback ledger is empty");
        }
        RetrainOutcome::Retrained {
            generation,
            examples,
            feedback_rows,
        } => {
            row(&mut out, "outcome", "retrained");
            row(&mut out, "generation", &generation.to_string());
            row(&mut out, "examples", &examples.to_string());
            row(&mut out, "feedback rows", &feedback_rows.to_string());
        }
        RetrainOutcome::Failed { reason } => {
            row(&mut out, "outcome", "failed; previous models still active");
            row(&mut out, "reason", reason);
        }
    }
    out
}

pub fn status_card(status: &ManagerStatus) -> String {
    let mut out = String::new();
    title(&mut out, "Triage engine");

    section(&mut out, "Lifecycle");
    row(&mut out, "state", &format!("{:?}", status.state).to_lowercase());
    row(&mut out, "data_dir", &status.data_dir.display().to_string());
    if status.retrain_interval_secs > 0 {
        row(
            &mut out,
            "retrain interval",
            &format!("{}s", status.retrain_interval_secs),
        );
    } else {
        row(&mut out, "retrain interval", "disabled");
    }

    if let Some(generation) = status.generation {
        section(&mut out, "Active generation");
        row(&mut out, "generation", &generation.to_string());
        if let Some(origin) = status.origin {
            row(&mut out, "origin", &origin_label(origin));
        }
        if let Some(at) = status.trained_at {
            row(&mut out, "trained_at", &at.format("%Y-%m-%d %H:%M:%S UTC").to_string());
        }
        row(&mut out, "examples", &status.examples.to_string());
        list(&mut out, "categories", &status.categories);
    }

    if let Some(report) = &status.last_retrain {
        section(&mut out, "Last retrain");
        row(&mut out, "trigger", &report.trigger.to_string());
        row(
            &mut out,
            "finished_at",
            &report.finished_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
        let summary = match &report.outcome {
            RetrainOutcome::NoFeedback => "no feedback".to_string(),
            RetrainOutcome::Retrained { generation, .. } => format!("generation {generation}"),
            RetrainOutcome::Failed { reason } => format!("failed: {reason}"),
        };
        row(&mut out, "outcome", &summary);
    }
    out
}

// ── Rendering helpers ──

fn title(out: &mut String, text: &str) {
    let _ = writeln!(out, "=== {text} ===");
}

fn section(out: &mut String, header: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{header}");
}

fn row(out: &mut String, label: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    let _ = writeln!(out, "  {label:<LABEL_WIDTH$} {value}");
}

fn list(out: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let shown: Vec<&str> = items.iter().take(MAX_LIST_ITEMS).map(String::as_str).collect();
    let mut value = shown.join(", ");
    if items.len() > MAX_LIST_ITEMS {
        let _ = write!(value, " … (+{} more)", items.len() - MAX_LIST_ITEMS);
    }
    row(out, label, &value);
}

fn yes_no(v: bool) -> &'static str {
    if v { "yes" } else { "no" }
}

fn origin_label(origin: GenerationOrigin) -> String {
    match origin {
        GenerationOrigin::Loaded => "loaded from disk".into(),
        GenerationOrigin::BaseData => "trained from base data".into(),
        GenerationOrigin::Retrained { feedback_rows } => {
            format!("retrained with {feedback_rows} feedback rows")
        }
    }
}
