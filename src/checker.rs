// src/checker.rs

//! One complete compatibility run
//!
//! Starts the worker pool, submits the scheduled plans, aggregates their
//! outcomes, runs the final confirmation when it applies, and shuts the
//! pool down on every path.

use crate::aggregate::{Aggregator, Verdict};
use crate::engine::{WorkerPool, WorkerSettings};
use crate::error::Result;
use crate::plan::{Plan, max_plan, schedule};
use crate::resolver::Candidates;
use crate::venv::Provisioner;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info};

/// Workers used in fast mode at most
pub const FAST_PARALLELISM: usize = 2;

/// Run-level settings
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub command: String,
    pub parallelism: usize,
    pub fast: bool,
}

/// Drives the pool and aggregator for one set of candidates
pub struct Checker<P> {
    provisioner: Arc<P>,
    candidates: Candidates,
    pip_lines: Vec<String>,
    options: CheckOptions,
}

impl<P: Provisioner + 'static> Checker<P> {
    pub fn new(
        provisioner: Arc<P>,
        candidates: Candidates,
        pip_lines: Vec<String>,
        options: CheckOptions,
    ) -> Self {
        Self {
            provisioner,
            candidates,
            pip_lines,
            options,
        }
    }

    /// Plans in submission order
    pub fn plans(&self) -> Vec<Plan> {
        schedule(&self.candidates, self.options.fast)
    }

    /// Worker count, capped in fast mode
    pub fn parallelism(&self) -> usize {
        let requested = self.options.parallelism.max(1);
        if self.options.fast {
            requested.min(FAST_PARALLELISM)
        } else {
            requested
        }
    }

    /// Execute every plan and write the report to `out`
    pub fn run<W: Write>(&self, out: W) -> Result<Verdict> {
        let settings = WorkerSettings {
            command: self.options.command.clone(),
            pip_lines: self.pip_lines.clone(),
        };
        let pool = WorkerPool::start(Arc::clone(&self.provisioner), settings, self.parallelism())?;

        let result = self.drive(&pool, out);
        if result.is_err() {
            pool.cancel_token().cancel();
        }

        let discarded = pool.shutdown();
        if !discarded.is_empty() {
            debug!("{} results discarded after the run ended", discarded.len());
        }

        result
    }

    fn drive<W: Write>(&self, pool: &WorkerPool, out: W) -> Result<Verdict> {
        let plans = self.plans();
        info!("Scheduling {} plans on {} workers", plans.len(), pool.size());

        let mut aggregator = Aggregator::new(out);
        for plan in plans {
            pool.submit(plan)?;
            aggregator.expect(1);
        }

        let cancel = pool.cancel_token();
        aggregator.consume(pool, &cancel)?;

        let max = max_plan(&self.candidates);
        aggregator.confirm(&max, &self.candidates.floors(), self.options.fast, |plan| {
            pool.submit(plan)?;
            pool.recv()
        })
    }
}
