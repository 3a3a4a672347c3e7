// src/aggregate.rs

//! Result aggregation and reporting
//!
//! The aggregator is the only writer of [`AggregateState`]. Outcomes are
//! consumed in completion order; the recorded minimum of a package is the
//! pointwise minimum of its passing single-dimension plans, so arrival
//! order does not matter.

use crate::engine::{CancelToken, Outcome, OutcomeSource};
use crate::error::Result;
use crate::plan::{Plan, confirmation_plan};
use crate::version::Version;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{info, warn};

/// Overall result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Every required plan passed
    Passed,
    /// A fatal plan failed
    FatalFailure,
    /// The final confirmation plan failed
    ConfirmationFailure,
}

impl Verdict {
    /// Process exit status
    pub fn code(self) -> u8 {
        match self {
            Self::Passed => 0,
            Self::FatalFailure => 1,
            Self::ConfirmationFailure => 2,
        }
    }
}

/// State owned by the consumer thread
#[derive(Debug, Clone)]
pub struct AggregateState {
    /// Lowest passing version per package, from single-dimension plans
    pub minimums: BTreeMap<String, Version>,
    /// Outcomes still expected
    pub outstanding: usize,
    pub cancelled: bool,
    pub verdict: Verdict,
}

impl Default for AggregateState {
    fn default() -> Self {
        Self {
            minimums: BTreeMap::new(),
            outstanding: 0,
            cancelled: false,
            verdict: Verdict::Passed,
        }
    }
}

/// Consumes outcomes and writes the operator report to `out`
pub struct Aggregator<W: Write> {
    out: W,
    state: AggregateState,
}

impl<W: Write> Aggregator<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            state: AggregateState::default(),
        }
    }

    pub fn state(&self) -> &AggregateState {
        &self.state
    }

    /// Account for `count` more submitted plans
    pub fn expect(&mut self, count: usize) {
        self.state.outstanding += count;
    }

    /// Receive until nothing is outstanding or a fatal plan has failed
    ///
    /// On a fatal failure `cancel` is set and the loop returns at once.
    /// Outcomes still queued are left for the caller to drain.
    pub fn consume<S>(&mut self, source: &S, cancel: &CancelToken) -> Result<()>
    where
        S: OutcomeSource + ?Sized,
    {
        while self.state.outstanding > 0 && !self.state.cancelled {
            let outcome = source.next_outcome()?;
            self.state.outstanding -= 1;
            self.record(&outcome)?;

            if self.state.cancelled {
                info!("Fatal plan {} failed; cancelling", outcome.plan.title);
                cancel.cancel();
            }
        }
        Ok(())
    }

    /// Report one outcome and update the state
    pub fn record(&mut self, outcome: &Outcome) -> Result<()> {
        let plan = &outcome.plan;

        let Some(failure) = &outcome.failure else {
            writeln!(self.out, "OK {}", plan.title)?;
            if let Some(target) = &plan.target {
                self.state
                    .minimums
                    .entry(target.name.clone())
                    .and_modify(|min| {
                        if target.version < *min {
                            *min = target.version.clone();
                        }
                    })
                    .or_insert_with(|| target.version.clone());
            }
            return Ok(());
        };

        writeln!(self.out, "FAIL {}: {}", plan.title, failure)?;
        self.write_transcript(&outcome.transcript)?;

        if let Some(target) = &plan.target {
            if let Some(min) = self.state.minimums.get(&target.name) {
                if *min < target.version {
                    warn!(
                        "  Inconsistent result: {} {} failed but {} passed",
                        target.name, target.version, min
                    );
                }
            }
        }

        if plan.fatal {
            self.state.cancelled = true;
            self.state.verdict = Verdict::FatalFailure;
        }
        Ok(())
    }

    /// Run the final confirmation plan and print narrowing suggestions
    ///
    /// Skipped in fast mode, after a fatal failure, or when no
    /// single-dimension plan passed. `floors` are the oldest resolved
    /// candidates; `run` executes a plan and waits for its outcome.
    pub fn confirm<F>(
        &mut self,
        max: &Plan,
        floors: &BTreeMap<String, Version>,
        fast: bool,
        run: F,
    ) -> Result<Verdict>
    where
        F: FnOnce(Plan) -> Result<Outcome>,
    {
        if fast || self.state.cancelled || self.state.minimums.is_empty() {
            return Ok(self.state.verdict);
        }

        writeln!(self.out, "Final test")?;
        writeln!(self.out, "==========")?;
        for (name, version) in &self.state.minimums {
            writeln!(self.out, "  {name}=={version}")?;
        }

        let plan = confirmation_plan(max, &self.state.minimums);
        let outcome = run(plan)?;

        if let Some(failure) = &outcome.failure {
            writeln!(self.out, "FAIL {}: {}", outcome.plan.title, failure)?;
            self.write_transcript(&outcome.transcript)?;
            self.state.verdict = Verdict::ConfirmationFailure;
            return Ok(self.state.verdict);
        }

        writeln!(self.out, "OK {}", outcome.plan.title)?;

        let mut suggested = false;
        for (name, version) in &self.state.minimums {
            if floors.get(name) != Some(version) {
                writeln!(self.out, "Suggest narrowing: {name}>={version}")?;
                suggested = true;
            }
        }
        if !suggested {
            writeln!(self.out, "Everything is fine.")?;
        }

        Ok(self.state.verdict)
    }

    fn write_transcript(&mut self, transcript: &str) -> Result<()> {
        for line in transcript.lines() {
            writeln!(self.out, "  {line}")?;
        }
        Ok(())
    }

    /// Give back the report writer
    pub fn into_inner(self) -> W {
        self.out
    }
}
