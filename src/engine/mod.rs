// src/engine/mod.rs

//! Execution engine
//!
//! A fixed pool of worker threads pulls plans from a shared job channel and
//! pushes one [`Outcome`] per plan onto a shared results channel. Each
//! worker provisions its own environment once and reuses it for every plan
//! it takes.
//!
//! Workers never talk to each other. Coordination is limited to the two
//! channels and one [`CancelToken`]. Shutdown sends one [`Job::Shutdown`]
//! per worker and joins them all.

mod worker;

pub use worker::run_plan;

use crate::error::{Error, Result};
use crate::plan::Plan;
use crate::venv::Provisioner;
use flume::{Receiver, Sender};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Shared cancellation flag
///
/// Checked by workers between plans only; a running install or test step is
/// never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a plan did not pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The worker never got a usable environment
    Provision(String),
    /// The installer exited non-zero
    Install,
    /// The test command exited non-zero
    Test,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provision(reason) => write!(f, "environment setup failed: {reason}"),
            Self::Install => write!(f, "Install failed"),
            Self::Test => write!(f, "Test failed"),
        }
    }
}

/// Result of running one plan
#[derive(Debug, Clone)]
pub struct Outcome {
    pub plan: Arc<Plan>,
    /// `None` means the plan passed
    pub failure: Option<Failure>,
    /// Combined output of every step that ran
    pub transcript: String,
}

impl Outcome {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Unit of work on the job channel
#[derive(Debug)]
pub enum Job {
    Run(Arc<Plan>),
    Shutdown,
}

/// Something outcomes can be received from, one at a time
pub trait OutcomeSource {
    /// Block until the next outcome arrives
    fn next_outcome(&self) -> Result<Outcome>;
}

impl OutcomeSource for Receiver<Outcome> {
    fn next_outcome(&self) -> Result<Outcome> {
        self.recv()
            .map_err(|_| Error::WorkerError("all workers have exited".to_string()))
    }
}

/// What every worker installs and runs besides the plan's pins
#[derive(Debug, Clone, Default)]
pub struct WorkerSettings {
    /// Test command, run through the shell
    pub command: String,
    /// Installer passthrough lines added to every install
    pub pip_lines: Vec<String>,
}

/// Fixed-size pool of plan runners
pub struct WorkerPool {
    jobs: Sender<Job>,
    results: Receiver<Outcome>,
    workers: Vec<JoinHandle<()>>,
    cancel: CancelToken,
}

impl WorkerPool {
    /// Spawn `parallelism` workers (at least one)
    pub fn start<P>(provisioner: Arc<P>, settings: WorkerSettings, parallelism: usize) -> Result<Self>
    where
        P: Provisioner + 'static,
    {
        let (jobs_tx, jobs_rx) = flume::unbounded();
        let (results_tx, results_rx) = flume::unbounded();
        let cancel = CancelToken::new();
        let settings = Arc::new(settings);
        let count = parallelism.max(1);

        info!("Starting {} workers", count);

        let mut workers = Vec::with_capacity(count);
        for id in 0..count {
            let provisioner = Arc::clone(&provisioner);
            let settings = Arc::clone(&settings);
            let jobs = jobs_rx.clone();
            let results = results_tx.clone();
            let cancel = cancel.clone();

            let handle = thread::Builder::new()
                .name(format!("pessimist-worker-{id}"))
                .spawn(move || {
                    worker::worker_loop(id, provisioner.as_ref(), &settings, jobs, results, cancel)
                })
                .map_err(|e| Error::WorkerError(format!("failed to spawn worker {id}: {e}")))?;
            workers.push(handle);
        }

        Ok(Self {
            jobs: jobs_tx,
            results: results_rx,
            workers,
            cancel,
        })
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a plan
    pub fn submit(&self, plan: Plan) -> Result<()> {
        debug!("Queueing plan {}", plan.title);
        self.jobs
            .send(Job::Run(Arc::new(plan)))
            .map_err(|_| Error::WorkerError("job queue is closed".to_string()))
    }

    /// Block for the next outcome from any worker
    pub fn recv(&self) -> Result<Outcome> {
        self.results.next_outcome()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Stop every worker and release its environment
    ///
    /// Returns outcomes that arrived after the caller stopped receiving.
    pub fn shutdown(self) -> Vec<Outcome> {
        for _ in 0..self.workers.len() {
            // Fails only once every worker has already exited
            let _ = self.jobs.send(Job::Shutdown);
        }

        for handle in self.workers {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                warn!("{} panicked", name);
            }
        }

        let discarded: Vec<Outcome> = self.results.try_iter().collect();
        for outcome in &discarded {
            info!(
                "Discarding result of {} ({})",
                outcome.plan.title,
                if outcome.passed() { "passed" } else { "failed" }
            );
        }
        discarded
    }
}

impl OutcomeSource for WorkerPool {
    fn next_outcome(&self) -> Result<Outcome> {
        self.recv()
    }
}
