//! Checkpoint execution engine.
//!
//! Sessions queue checkpoints; the runner owns actually verifying them. In
//! `Classic` mode each checkpoint runs once against the local environment. In
//! `Grid` mode each checkpoint fans out across the configured viewport matrix,
//! executed by a bounded worker pool.
//!
//! Ordering contract: the final report lists entries in submission order
//! (sessions in the order they closed, targets in matrix order, checkpoints in
//! capture order) regardless of which worker finished first. Each job writes
//! into a slot reserved at submission time.

use crate::backend::{ComparisonOutcome, VisualBackend};
use crate::result::{OjearError, OjearResult};
use crate::visual::{Batch, Checkpoint, RenderTarget, Viewport, VisualConfig};
use serde::Serialize;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Execution strategy for queued checkpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerMode {
    /// One verification per checkpoint, against the local environment
    Classic,
    /// Fan each checkpoint out across the viewport matrix
    Grid {
        /// Upper bound on concurrently processed render targets
        test_concurrency: usize,
    },
}

/// Everything one closed session hands to the runner
#[derive(Debug)]
pub struct SessionSubmission {
    /// Application under test
    pub app: String,
    /// Scenario the session covered
    pub scenario: String,
    /// Viewport the local browser ran at
    pub viewport: Viewport,
    /// Checkpoints in capture order
    pub checkpoints: Vec<Checkpoint>,
}

/// One line of the batch report: a checkpoint verified on one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntry {
    /// Scenario the checkpoint belongs to
    pub scenario: String,
    /// Checkpoint label
    pub label: String,
    /// Render target description
    pub target: String,
    /// Comparison verdict
    pub outcome: ComparisonOutcome,
}

struct Job {
    slot: usize,
    app: String,
    scenario: String,
    target: RenderTarget,
    checkpoints: Arc<Vec<Checkpoint>>,
}

/// Executes queued checkpoints against a backend.
///
/// Shared by reference between sessions; collect results once at the end of
/// the batch.
pub struct Runner {
    mode: RunnerMode,
    config: Arc<VisualConfig>,
    tx: Mutex<Option<Sender<Job>>>,
    slots: Arc<Mutex<Vec<Option<Vec<BatchEntry>>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("mode", &self.mode)
            .field("batch", &self.config.batch().name())
            .finish_non_exhaustive()
    }
}

impl Runner {
    /// Create a runner and start its worker pool.
    ///
    /// `Classic` runs a single worker; `Grid` runs `test_concurrency` workers
    /// (clamped to at least one).
    ///
    /// # Errors
    ///
    /// `ConfigurationMissing` when `Grid` mode is requested with an empty
    /// viewport matrix.
    pub fn new(
        config: VisualConfig,
        mode: RunnerMode,
        backend: Arc<dyn VisualBackend>,
    ) -> OjearResult<Self> {
        if matches!(mode, RunnerMode::Grid { .. }) && config.viewport_matrix().is_empty() {
            return Err(OjearError::ConfigurationMissing {
                message: "grid runner requires a non-empty viewport matrix".to_string(),
            });
        }

        let worker_count = match mode {
            RunnerMode::Classic => 1,
            RunnerMode::Grid { test_concurrency } => test_concurrency.max(1),
        };

        let config = Arc::new(config);
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let slots: Arc<Mutex<Vec<Option<Vec<BatchEntry>>>>> = Arc::new(Mutex::new(Vec::new()));

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let rx = Arc::clone(&rx);
            let backend = Arc::clone(&backend);
            let config = Arc::clone(&config);
            let slots = Arc::clone(&slots);
            workers.push(
                std::thread::Builder::new()
                    .name(format!("ojear-visual-{index}"))
                    .spawn(move || worker_loop(&rx, backend.as_ref(), &config, &slots))
                    .map_err(|e| OjearError::TransportError {
                        message: format!("failed to spawn visual worker: {e}"),
                    })?,
            );
        }

        info!(
            workers = worker_count,
            batch = %config.batch().name(),
            "runner started"
        );
        Ok(Self {
            mode,
            config,
            tx: Mutex::new(Some(tx)),
            slots,
            workers: Mutex::new(workers),
        })
    }

    /// The execution mode
    #[must_use]
    pub const fn mode(&self) -> RunnerMode {
        self.mode
    }

    /// The batch results are grouped under
    #[must_use]
    pub fn batch(&self) -> &Batch {
        self.config.batch()
    }

    /// Queue a closed session's checkpoints for verification.
    ///
    /// Returns as soon as the work is queued; verification proceeds on the
    /// worker pool.
    ///
    /// # Errors
    ///
    /// `TransportError` when results were already collected.
    pub fn submit_session(&self, submission: SessionSubmission) -> OjearResult<()> {
        if submission.checkpoints.is_empty() {
            return Ok(());
        }

        let targets: Vec<RenderTarget> = match self.mode {
            RunnerMode::Classic => vec![RenderTarget::Local {
                width: submission.viewport.width,
                height: submission.viewport.height,
            }],
            RunnerMode::Grid { .. } => self.config.viewport_matrix().to_vec(),
        };

        let checkpoints = Arc::new(submission.checkpoints);
        let tx_guard = lock(&self.tx);
        let tx = tx_guard.as_ref().ok_or_else(|| OjearError::TransportError {
            message: "runner results were already collected".to_string(),
        })?;

        for target in targets {
            let slot = {
                let mut slots = lock(&self.slots);
                slots.push(None);
                slots.len() - 1
            };
            debug!(
                scenario = %submission.scenario,
                target = %target.describe(),
                checkpoints = checkpoints.len(),
                "job queued"
            );
            tx.send(Job {
                slot,
                app: submission.app.clone(),
                scenario: submission.scenario.clone(),
                target,
                checkpoints: Arc::clone(&checkpoints),
            })
            .map_err(|_| OjearError::TransportError {
                message: "runner worker pool is gone".to_string(),
            })?;
        }
        Ok(())
    }

    /// Drain the pool and return every verification result, in submission
    /// order.
    ///
    /// Blocks until all queued jobs finish. After this call the runner accepts
    /// no further submissions.
    #[must_use]
    pub fn collect_results(&self) -> Vec<BatchEntry> {
        self.shutdown();
        let mut slots = lock(&self.slots);
        slots
            .drain(..)
            .flat_map(|slot| {
                slot.unwrap_or_else(|| {
                    warn!("a visual worker dropped its job");
                    Vec::new()
                })
            })
            .collect()
    }

    fn shutdown(&self) {
        lock(&self.tx).take();
        let handles = std::mem::take(&mut *lock(&self.workers));
        for handle in handles {
            if handle.join().is_err() {
                warn!("a visual worker panicked");
            }
        }
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn worker_loop(
    rx: &Mutex<Receiver<Job>>,
    backend: &dyn VisualBackend,
    config: &VisualConfig,
    slots: &Mutex<Vec<Option<Vec<BatchEntry>>>>,
) {
    loop {
        // Hold the receiver lock only while waiting, never while comparing.
        let job = match lock(rx).recv() {
            Ok(job) => job,
            Err(_) => break,
        };
        let entries = run_job(backend, config, &job);
        lock(slots)[job.slot] = Some(entries);
    }
}

fn run_job(backend: &dyn VisualBackend, config: &VisualConfig, job: &Job) -> Vec<BatchEntry> {
    let target_desc = job.target.describe();

    let handle = match backend.open_session(config, &job.app, &job.scenario, &job.target) {
        Ok(handle) => handle,
        Err(error) => {
            warn!(
                scenario = %job.scenario,
                target = %target_desc,
                error = %error,
                "backend session failed to open"
            );
            return job
                .checkpoints
                .iter()
                .map(|checkpoint| BatchEntry {
                    scenario: job.scenario.clone(),
                    label: checkpoint.label.clone(),
                    target: target_desc.clone(),
                    outcome: ComparisonOutcome::TransportFault {
                        message: error.to_string(),
                    },
                })
                .collect();
        }
    };

    let mut entries = Vec::with_capacity(job.checkpoints.len());
    for checkpoint in job.checkpoints.iter() {
        let outcome = match backend.submit_checkpoint(&handle, checkpoint) {
            Ok(outcome) => outcome,
            Err(error) => ComparisonOutcome::TransportFault {
                message: error.to_string(),
            },
        };
        debug!(
            label = %checkpoint.label,
            target = %target_desc,
            passing = outcome.is_passing(),
            "checkpoint verified"
        );
        entries.push(BatchEntry {
            scenario: job.scenario.clone(),
            label: checkpoint.label.clone(),
            target: target_desc.clone(),
            outcome,
        });
    }

    if let Err(error) = backend.close_session(&handle) {
        warn!(
            session = %handle.id,
            error = %error,
            "backend session failed to close"
        );
    }
    entries
}
