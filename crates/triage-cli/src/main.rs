mod display;
mod serve;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use triage_ai::{CentroidTrainer, Embed, HashEmbedder};
use triage_engine::{
    DuplicateRequest, EngineConfig, FeedbackRequest, ModelManager, PredictRequest, TriageService,
};
use triage_store::{ArtifactStore, ModelKind};

#[derive(Parser, Debug)]
#[command(name = "triage", version, about = "Civic complaint triage engine")]
struct Cli {
    /// JSON engine config; missing fields take defaults
    #[arg(long, global = true, env = "TRIAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding feedback.csv and the model artifacts
    #[arg(long, global = true, env = "TRIAGE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Scheduled retrain period in seconds (0 disables); only used by `serve`
    #[arg(long, global = true, env = "TRIAGE_RETRAIN_INTERVAL_SECS")]
    retrain_interval_secs: Option<u64>,

    /// Sentence-transformer model directory (model.onnx + tokenizer.json)
    #[cfg(feature = "onnx")]
    #[arg(long, global = true, env = "TRIAGE_ONNX_MODEL")]
    onnx_model: Option<PathBuf>,

    /// Print JSON instead of cards
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Route a complaint and score its urgency
    Predict {
        text: String,
    },
    /// Check a complaint against existing ones
    Duplicate {
        new_complaint: String,
        existing_complaints: Vec<String>,
    },
    /// Record a correction for the next retrain
    Feedback {
        text: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        priority: Option<String>,
    },
    /// Retrain now with all recorded feedback and wait for the outcome
    Retrain,
    /// Discard persisted models and fit fresh ones from the base corpus
    Train,
    /// Show the active generation and lifecycle state
    Status,
    /// Serve newline-delimited JSON requests on stdin, with scheduled retrains
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let serving = matches!(cli.command, Command::Serve);
    let config = resolve_config(&cli, serving)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.data_dir.display(),
        "triage starting"
    );

    if matches!(cli.command, Command::Train) {
        discard_artifacts(&config)?;
    }

    let embedder = build_embedder(&cli)?;
    let manager = ModelManager::launch(config, Arc::new(CentroidTrainer))
        .await
        .context("starting model manager")?;
    let service = TriageService::new(manager, embedder);

    match cli.command {
        Command::Predict { text } => {
            let resp = service.predict(&PredictRequest { text: text.clone() })?;
            emit(cli.json, &resp, || display::prediction_card(&text, &resp))?;
        }
        Command::Duplicate {
            new_complaint,
            existing_complaints,
        } => {
            let compared = existing_complaints.len();
            let verdict = service.check_duplicate(&DuplicateRequest {
                new_complaint,
                existing_complaints,
            })?;
            emit(cli.json, &verdict, || display::duplicate_card(&verdict, compared))?;
        }
        Command::Feedback {
            text,
            category,
            priority,
        } => {
            let ack = service.submit_feedback(&FeedbackRequest {
                text,
                correct_category: category,
                correct_priority: priority,
            })?;
            emit(cli.json, &ack, || display::feedback_card(&ack))?;
        }
        Command::Retrain => {
            let outcome = service.manager().retrain_now().await;
            emit(cli.json, &outcome, || display::outcome_card(&outcome))?;
        }
        Command::Train | Command::Status => {
            let status = service.manager().status();
            emit(cli.json, &status, || display::status_card(&status))?;
        }
        Command::Serve => {
            serve::run(&service, tokio::io::stdin(), tokio::io::stdout()).await?;
        }
    }

    service.manager().shutdown();
    Ok(())
}

/// Config file (if any), then CLI/env overrides. One-shot commands never
/// run the scheduler.
fn resolve_config(cli: &Cli, serving: bool) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(secs) = cli.retrain_interval_secs {
        config.retrain_interval_secs = secs;
    }
    if !serving {
        config.retrain_interval_secs = 0;
    }
    Ok(config)
}

fn discard_artifacts(config: &EngineConfig) -> anyhow::Result<()> {
    let store = ArtifactStore::open(&config.data_dir)?;
    for kind in ModelKind::ALL {
        let path = store.path(kind);
        match std::fs::remove_file(&path) {
            Ok(()) => info!(kind = %kind, path = %path.display(), "discarded persisted model"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("removing {}", path.display()));
            }
        }
    }
    Ok(())
}

#[cfg(feature = "onnx")]
fn build_embedder(cli: &Cli) -> anyhow::Result<Arc<dyn Embed>> {
    match &cli.onnx_model {
        Some(dir) => {
            let embedder = triage_ai::OnnxEmbedder::load(dir)
                .with_context(|| format!("loading ONNX model from {}", dir.display()))?;
            Ok(Arc::new(embedder))
        }
        None => Ok(Arc::new(HashEmbedder::default())),
    }
}

#[cfg(not(feature = "onnx"))]
fn build_embedder(_cli: &Cli) -> anyhow::Result<Arc<dyn Embed>> {
    Ok(Arc::new(HashEmbedder::default()))
}

fn emit<T: Serialize>(json: bool, value: &T, card: impl FnOnce() -> String) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", card());
    }
    Ok(())
}
