//! Model lifecycle: startup, retraining, and hot-swapping generations.
//!
//! ```text
//! Uninitialized → Loading → Ready ⇄ Retraining
//! ```
//!
//! Retrains are serialized. Manual triggers and the scheduler both feed a
//! single-slot queue drained by one worker task, so a burst of requests
//! collapses into at most one running retrain plus one pending. Training and
//! artifact I/O run on the blocking pool; the prediction path only ever
//! clones an `Arc` out of [`ActiveModels`].

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use triage_ai::Trainer;
use triage_store::{Artifact, ArtifactStore, FeedbackLedger, ModelKind};

use crate::config::EngineConfig;
use crate::dataset::{self, TrainingRow};
use crate::models::{ActiveModels, Generation, GenerationOrigin};
use crate::training::{TrainingSet, fit_both};
use crate::EngineError;

/// One running retrain plus at most this many waiting.
const RETRAIN_QUEUE_DEPTH: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    Loading,
    Ready,
    Retraining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrainTrigger {
    Manual,
    Scheduled,
}

impl fmt::Display for RetrainTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        })
    }
}

/// What a retrain attempt did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RetrainOutcome {
    /// The ledger held nothing usable; the active generation is unchanged.
    NoFeedback,
    Retrained {
        generation: u64,
        examples: usize,
        feedback_rows: usize,
    },
    /// The active generation is unchanged.
    Failed { reason: String },
}

/// Reply to a fire-and-forget retrain request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrainAck {
    /// A new retrain will run.
    Queued,
    /// One was already waiting; it will pick up this request's feedback too.
    Coalesced,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrainReport {
    pub trigger: RetrainTrigger,
    pub finished_at: DateTime<Utc>,
    pub outcome: RetrainOutcome,
}

/// Point-in-time view for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStatus {
    pub state: LifecycleState,
    pub data_dir: PathBuf,
    pub generation: Option<u64>,
    pub origin: Option<GenerationOrigin>,
    pub trained_at: Option<DateTime<Utc>>,
    pub examples: usize,
    pub categories: Vec<String>,
    pub retrain_interval_secs: u64,
    pub last_retrain: Option<RetrainReport>,
}

struct Shared {
    config: EngineConfig,
    ledger: FeedbackLedger,
    artifacts: ArtifactStore,
    trainer: Arc<dyn Trainer>,
    /// Base corpus, scored once with the configured table.
    base: Vec<TrainingRow>,
    active: OnceLock<ActiveModels>,
    state: Mutex<LifecycleState>,
    next_generation: AtomicU64,
    retrain_lock: tokio::sync::Mutex<()>,
    last_retrain: Mutex<Option<RetrainReport>>,
}

/// Owns the active generation and everything that replaces it.
pub struct ModelManager {
    shared: Arc<Shared>,
    queue: mpsc::Sender<RetrainTrigger>,
    pending_rx: Mutex<Option<mpsc::Receiver<RetrainTrigger>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ModelManager {
    /// Prepare a manager over `config.data_dir`. Nothing is loaded until
    /// [`start`](Self::start).
    pub fn new(config: EngineConfig, trainer: Arc<dyn Trainer>) -> Result<Self, EngineError> {
        let config = config.validated()?;
        let artifacts = ArtifactStore::open(&config.data_dir)?;
        let ledger = FeedbackLedger::in_dir(&config.data_dir);
        let base = dataset::base_rows(&config.scoring);
        let (queue, rx) = mpsc::channel(RETRAIN_QUEUE_DEPTH);

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                ledger,
                artifacts,
                trainer,
                base,
                active: OnceLock::new(),
                state: Mutex::new(LifecycleState::Uninitialized),
                next_generation: AtomicU64::new(1),
                retrain_lock: tokio::sync::Mutex::new(()),
                last_retrain: Mutex::new(None),
            }),
            queue,
            pending_rx: Mutex::new(Some(rx)),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// [`new`](Self::new) followed by [`start`](Self::start).
    pub async fn launch(
        config: EngineConfig,
        trainer: Arc<dyn Trainer>,
    ) -> Result<Self, EngineError> {
        let manager = Self::new(config, trainer)?;
        manager.start().await?;
        Ok(manager)
    }

    /// Populate every model kind, then start the retrain worker and, when an
    /// interval is configured, the scheduler.
    ///
    /// Persisted artifacts are used when both kinds are valid and share a
    /// generation; otherwise both are trained together from the base corpus.
    /// Failing that is fatal.
    pub async fn start(&self) -> Result<(), EngineError> {
        let Some(rx) = lock(&self.pending_rx).take() else {
            return Err(EngineError::NotReady("model manager already started".into()));
        };

        self.shared.set_state(LifecycleState::Loading);
        let shared = Arc::clone(&self.shared);
        let loaded = tokio::task::spawn_blocking(move || shared.load_or_train()).await;
        let generation = match loaded {
            Ok(Ok(generation)) => generation,
            Ok(Err(e)) => {
                error!(error = %e, "startup failed: no usable models");
                self.abort_start(rx);
                return Err(e);
            }
            Err(e) => {
                error!(error = %e, "startup task failed");
                self.abort_start(rx);
                return Err(e.into());
            }
        };

        let id = generation.id;
        let origin = generation.origin;
        self.shared.next_generation.store(id + 1, Ordering::SeqCst);
        if self.shared.active.set(ActiveModels::new(generation)).is_err() {
            return Err(EngineError::NotReady("model manager already started".into()));
        }
        self.shared.set_state(LifecycleState::Ready);
        info!(generation = id, origin = ?origin, "models ready");

        let mut tasks = lock(&self.tasks);
        tasks.push(spawn_worker(Arc::clone(&self.shared), rx));
        if let Some(period) = self.shared.config.retrain_interval() {
            tasks.push(spawn_scheduler(period, self.queue.clone()));
            info!(period_secs = period.as_secs(), "retrain scheduler started");
        }
        Ok(())
    }

    fn abort_start(&self, rx: mpsc::Receiver<RetrainTrigger>) {
        self.shared.set_state(LifecycleState::Uninitialized);
        *lock(&self.pending_rx) = Some(rx);
    }

    /// The generation to serve one request with.
    pub fn snapshot(&self) -> Result<Arc<Generation>, EngineError> {
        Ok(self.shared.active()?.snapshot())
    }

    pub fn state(&self) -> LifecycleState {
        *lock(&self.shared.state)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn ledger(&self) -> &FeedbackLedger {
        &self.shared.ledger
    }

    pub fn status(&self) -> ManagerStatus {
        let current = self.snapshot().ok();
        ManagerStatus {
            state: self.state(),
            data_dir: self.shared.config.data_dir.clone(),
            generation: current.as_ref().map(|g| g.id),
            origin: current.as_ref().map(|g| g.origin),
            trained_at: current.as_ref().map(|g| g.trained_at),
            examples: current.as_ref().map_or(0, |g| g.category.example_count()),
            categories: current
                .as_ref()
                .map(|g| g.category.labels().map(str::to_string).collect())
                .unwrap_or_default(),
            retrain_interval_secs: self.shared.config.retrain_interval_secs,
            last_retrain: lock(&self.shared.last_retrain).clone(),
        }
    }

    /// Run a retrain on the caller's task and wait for its outcome.
    ///
    /// Shares the serialization lock with the background worker, so it never
    /// overlaps a queued or scheduled run.
    pub async fn retrain_now(&self) -> RetrainOutcome {
        run_retrain(Arc::clone(&self.shared), RetrainTrigger::Manual).await
    }

    /// Ask the background worker for a retrain and return immediately.
    pub fn trigger_retrain(&self) -> Result<RetrainAck, EngineError> {
        enqueue(&self.queue, RetrainTrigger::Manual)
    }

    /// Stop the worker and scheduler. In-flight training finishes on the
    /// blocking pool but its result is still published.
    pub fn shutdown(&self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
    }
}

impl Drop for ModelManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    fn active(&self) -> Result<&ActiveModels, EngineError> {
        self.active
            .get()
            .ok_or_else(|| EngineError::NotReady("models are still loading".into()))
    }

    fn set_state(&self, next: LifecycleState) {
        let mut state = lock(&self.state);
        if *state != next {
            debug!(from = ?*state, to = ?next, "lifecycle transition");
            *state = next;
        }
    }

    fn load_or_train(&self) -> Result<Generation, EngineError> {
        let mut artifacts: HashMap<ModelKind, Artifact> = HashMap::new();
        for kind in ModelKind::ALL {
            match self.artifacts.load(kind) {
                Ok(Some(artifact)) => {
                    artifacts.insert(kind, artifact);
                }
                Ok(None) => info!(kind = %kind, "no persisted model; training from base data"),
                Err(e) => {
                    warn!(kind = %kind, error = %e, "persisted model unusable; training from base data")
                }
            }
        }

        // Both kinds must come from the same training run. A pair with
        // differing generations means a save stopped part way.
        let newest = artifacts.values().map(|a| a.generation).max().unwrap_or(0);
        let paired = artifacts.len() == ModelKind::ALL.len()
            && artifacts.values().all(|a| a.generation == newest);
        if paired {
            let category = take_artifact(&mut artifacts, ModelKind::Category)?;
            let priority = take_artifact(&mut artifacts, ModelKind::Priority)?;
            return Ok(Generation {
                id: newest,
                trained_at: category.trained_at.max(priority.trained_at),
                category: category.model,
                priority: priority.model,
                origin: GenerationOrigin::Loaded,
            });
        }

        if !artifacts.is_empty() {
            let generations: HashMap<ModelKind, u64> =
                artifacts.iter().map(|(k, a)| (*k, a.generation)).collect();
            warn!(?generations, "persisted models are not one generation; refitting both from base data");
        }

        let id = newest + 1;
        let set = TrainingSet::base_only(self.base.clone());
        let fitted = fit_both(self.trainer.as_ref(), &set)?;
        let category = Artifact::new(ModelKind::Category, id, fitted.category);
        let priority = Artifact::new(ModelKind::Priority, id, fitted.priority);
        // The fitted pair still serves even if it cannot be persisted.
        if let Err(e) = self.artifacts.save_all(&[&category, &priority]) {
            warn!(generation = id, error = %e, "could not persist base models");
        }

        Ok(Generation {
            id,
            trained_at: category.trained_at,
            category: category.model,
            priority: priority.model,
            origin: GenerationOrigin::BaseData,
        })
    }

    fn retrain_blocking(&self) -> Result<RetrainOutcome, EngineError> {
        let active = self.active()?;
        let feedback = self.ledger.read_all()?;
        let set = TrainingSet::merge(
            self.base.clone(),
            &feedback,
            &self.config.placeholder_category,
            self.config.placeholder_priority,
        );
        if set.feedback_rows == 0 {
            info!(entries = feedback.len(), "no usable feedback; keeping current models");
            return Ok(RetrainOutcome::NoFeedback);
        }

        let fitted = fit_both(self.trainer.as_ref(), &set)?;
        let id = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let category = Artifact::new(ModelKind::Category, id, fitted.category);
        let priority = Artifact::new(ModelKind::Priority, id, fitted.priority);
        self.artifacts.save_all(&[&category, &priority])?;

        let examples = set.rows.len();
        let feedback_rows = set.feedback_rows;
        active.publish(Generation {
            id,
            trained_at: category.trained_at,
            category: category.model,
            priority: priority.model,
            origin: GenerationOrigin::Retrained { feedback_rows },
        });
        info!(generation = id, examples, feedback_rows, "published new model generation");

        Ok(RetrainOutcome::Retrained {
            generation: id,
            examples,
            feedback_rows,
        })
    }

    fn record(&self, trigger: RetrainTrigger, outcome: &RetrainOutcome) {
        *lock(&self.last_retrain) = Some(RetrainReport {
            trigger,
            finished_at: Utc::now(),
            outcome: outcome.clone(),
        });
    }
}

fn take_artifact(
    artifacts: &mut HashMap<ModelKind, Artifact>,
    kind: ModelKind,
) -> Result<Artifact, EngineError> {
    artifacts
        .remove(&kind)
        .ok_or_else(|| EngineError::NotReady(format!("{kind} model missing after startup")))
}

async fn run_retrain(shared: Arc<Shared>, trigger: RetrainTrigger) -> RetrainOutcome {
    let _serial = shared.retrain_lock.lock().await;
    if shared.active.get().is_none() {
        return RetrainOutcome::Failed {
            reason: "models are not loaded yet".into(),
        };
    }

    shared.set_state(LifecycleState::Retraining);
    info!(trigger = %trigger, "retrain started");
    let worker = Arc::clone(&shared);
    let result = tokio::task::spawn_blocking(move || worker.retrain_blocking()).await;
    let outcome = match result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            error!(trigger = %trigger, error = %e, "retrain failed; keeping current models");
            RetrainOutcome::Failed {
                reason: e.to_string(),
            }
        }
        Err(e) => {
            error!(trigger = %trigger, error = %e, "retrain task failed; keeping current models");
            RetrainOutcome::Failed {
                reason: format!("retrain task failed: {e}"),
            }
        }
    };
    shared.set_state(LifecycleState::Ready);
    shared.record(trigger, &outcome);
    outcome
}

fn enqueue(
    queue: &mpsc::Sender<RetrainTrigger>,
    trigger: RetrainTrigger,
) -> Result<RetrainAck, EngineError> {
    match queue.try_send(trigger) {
        Ok(()) => {
            info!(trigger = %trigger, "retrain queued");
            Ok(RetrainAck::Queued)
        }
        Err(TrySendError::Full(_)) => {
            info!(trigger = %trigger, "retrain already pending; request coalesced");
            Ok(RetrainAck::Coalesced)
        }
        Err(TrySendError::Closed(_)) => {
            Err(EngineError::NotReady("retrain worker has stopped".into()))
        }
    }
}

fn spawn_worker(shared: Arc<Shared>, mut rx: mpsc::Receiver<RetrainTrigger>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(trigger) = rx.recv().await {
            let outcome = run_retrain(Arc::clone(&shared), trigger).await;
            debug!(trigger = %trigger, ?outcome, "queued retrain finished");
        }
        debug!("retrain queue closed");
    })
}

fn spawn_scheduler(period: Duration, queue: mpsc::Sender<RetrainTrigger>) -> JoinHandle<()> {
    tokio::spawn(async move {
        // First tick one full period after startup, not immediately.
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if enqueue(&queue, RetrainTrigger::Scheduled).is_err() {
                break;
            }
        }
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
