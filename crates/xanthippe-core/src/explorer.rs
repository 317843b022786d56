//! # Exploration Engine
//!
//! Drives the calculator through candidate sequences and records what every
//! prefix shows.
//!
//! ## Loop
//!
//! ```text
//! get_target ──► explore ──► store (one upsert per prefix)
//!     ▲             │
//!     └─────────────┘  timeout: warn, keep partial writes, next target
//! ```
//!
//! Stabilization timeouts abort only the current target. Decode faults and
//! storage failures end the run. The stop flag is checked between targets,
//! never mid-session, so the calculator is never left half-pressed.

use crate::calculator::Calculator;
use crate::config::{ExploreSettings, StrategyKind};
use crate::decoder::DisplayModel;
use crate::hal::{Clock, Keypad, StatusDisplay};
use crate::storage::{CoverageStore, UpsertMode, UpsertOutcome};
use crate::strategy::{Candidate, Rotation, StrategyContext};
use crate::{ButtonSequence, XanthippeError};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Store effects of one exploration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExploreReport {
    /// The explored sequence.
    pub target: ButtonSequence,
    /// Prefixes seen for the first time.
    pub inserted: usize,
    /// Prefixes that were pending and got a screen.
    pub filled: usize,
    /// Prefixes already covered.
    pub unchanged: usize,
}

impl ExploreReport {
    fn new(target: ButtonSequence) -> Self {
        Self {
            target,
            inserted: 0,
            filled: 0,
            unchanged: 0,
        }
    }

    fn tally(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Filled | UpsertOutcome::Overwritten => self.filled += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Result of one loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A target was explored to the end.
    Explored(ExploreReport),
    /// The display did not settle; earlier prefixes stay recorded.
    Aborted {
        /// The abandoned target.
        target: ButtonSequence,
        /// Why it was abandoned.
        reason: String,
    },
    /// No strategy had an uncovered candidate this time.
    Idle,
    /// Every strategy is retired.
    Exhausted,
}

/// Why [`Explorer::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The stop flag was raised.
    Stopped,
    /// The requested number of targets was attempted.
    Limit,
    /// Every strategy is retired.
    Exhausted,
}

/// Totals of one [`Explorer::run`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Targets explored to the end.
    pub explored: usize,
    /// Targets abandoned on a timeout.
    pub aborted: usize,
    /// Iterations without a candidate.
    pub idle: usize,
    /// Prefixes written for the first time.
    pub inserted: usize,
    /// Pending prefixes filled.
    pub filled: usize,
    /// Why the run ended.
    pub reason: StopReason,
}

/// The exploration loop for one calculator.
#[derive(Debug)]
pub struct Explorer<K, C, D> {
    calculator: Calculator<K, C, D>,
    store: Arc<CoverageStore>,
    rotation: Rotation,
    rng: StdRng,
    alphabet: Vec<char>,
    pull_limit: usize,
    idle_backoff: Duration,
}

impl<K: Keypad, C: Clock, D: StatusDisplay> Explorer<K, C, D> {
    /// Create an explorer with the strategies named in `settings`.
    pub fn new(
        calculator: Calculator<K, C, D>,
        store: Arc<CoverageStore>,
        settings: &ExploreSettings,
    ) -> Result<Self, XanthippeError> {
        settings.validate()?;
        let alphabet = calculator.buttons().alphabet();
        if alphabet.is_empty() {
            return Err(XanthippeError::Config(
                "no explorable buttons: bind at least one besides reset".to_string(),
            ));
        }
        let rng = settings
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

        Ok(Self {
            calculator,
            store,
            rotation: Rotation::from_settings(settings),
            rng,
            alphabet,
            pull_limit: settings.pull_limit,
            idle_backoff: settings.idle_backoff(),
        })
    }

    /// The driven calculator.
    #[must_use]
    pub fn calculator(&self) -> &Calculator<K, C, D> {
        &self.calculator
    }

    /// Strategies still in the rotation.
    #[must_use]
    pub fn active_strategies(&self) -> Vec<StrategyKind> {
        self.rotation.active()
    }

    /// The next uncovered candidate.
    ///
    /// `None` means either that the rotation is empty or that `pull_limit`
    /// pulls produced nothing new; [`Self::active_strategies`] tells which.
    pub fn get_target(&mut self) -> Result<Option<ButtonSequence>, XanthippeError> {
        for _ in 0..self.pull_limit {
            let mut ctx = StrategyContext {
                store: &self.store,
                alphabet: &self.alphabet,
                rng: &mut self.rng,
            };
            let Some((kind, candidate)) = self.rotation.pull(&mut ctx)? else {
                return Ok(None);
            };
            let Candidate::Next(target) = candidate else {
                continue;
            };
            if let Err(e) = self.calculator.buttons().check(&target) {
                tracing::warn!(strategy = %kind, buttons = %target, error = %e, "unpressable candidate");
                continue;
            }
            if self.store.is_covered(&target)? {
                continue;
            }
            tracing::debug!(strategy = %kind, buttons = %target, "target");
            return Ok(Some(target));
        }
        Ok(None)
    }

    /// Replay `target` and record the screen of every prefix.
    ///
    /// Each frame is decoded before it is written, so a frame the decoder
    /// cannot read never reaches the store.
    pub fn explore(&mut self, target: &ButtonSequence) -> Result<ExploreReport, XanthippeError> {
        let store = &self.store;
        let mut report = ExploreReport::new(target.clone());
        self.calculator.session_with(target, |prefix, frame| {
            DisplayModel::decode(&frame)?;
            report.tally(store.record(prefix, frame, UpsertMode::FillGap)?);
            Ok(())
        })?;
        tracing::info!(
            buttons = %target,
            inserted = report.inserted,
            filled = report.filled,
            unchanged = report.unchanged,
            "explored"
        );
        Ok(report)
    }

    /// One iteration: pick a target and explore it.
    pub fn step(&mut self) -> Result<StepOutcome, XanthippeError> {
        let Some(target) = self.get_target()? else {
            return Ok(if self.rotation.is_empty() {
                StepOutcome::Exhausted
            } else {
                StepOutcome::Idle
            });
        };
        match self.explore(&target) {
            Ok(report) => Ok(StepOutcome::Explored(report)),
            Err(e) if e.is_recoverable() => {
                tracing::warn!(buttons = %target, error = %e, "exploration aborted");
                Ok(StepOutcome::Aborted {
                    target,
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Loop until `stop` is raised, `limit` targets were attempted, or every
    /// strategy is retired.
    pub fn run(
        &mut self,
        stop: &AtomicBool,
        limit: Option<usize>,
    ) -> Result<RunSummary, XanthippeError> {
        self.run_with(stop, limit, |_| {})
    }

    /// [`Explorer::run`], calling `on_idle` with the backoff after each idle
    /// pause on the calculator clock.
    ///
    /// A virtual clock returns from its pause at once; `on_idle` is where
    /// the caller waits in wall-clock time.
    pub fn run_with<F>(
        &mut self,
        stop: &AtomicBool,
        limit: Option<usize>,
        mut on_idle: F,
    ) -> Result<RunSummary, XanthippeError>
    where
        F: FnMut(Duration),
    {
        let mut summary = RunSummary {
            explored: 0,
            aborted: 0,
            idle: 0,
            inserted: 0,
            filled: 0,
            reason: StopReason::Stopped,
        };

        loop {
            if stop.load(Ordering::Relaxed) {
                summary.reason = StopReason::Stopped;
                break;
            }
            if limit.is_some_and(|n| summary.explored + summary.aborted >= n) {
                summary.reason = StopReason::Limit;
                break;
            }
            match self.step()? {
                StepOutcome::Explored(report) => {
                    summary.explored += 1;
                    summary.inserted += report.inserted;
                    summary.filled += report.filled;
                }
                StepOutcome::Aborted { .. } => summary.aborted += 1,
                StepOutcome::Idle => {
                    summary.idle += 1;
                    self.calculator.clock().sleep(self.idle_backoff);
                    on_idle(self.idle_backoff);
                }
                StepOutcome::Exhausted => {
                    summary.reason = StopReason::Exhausted;
                    break;
                }
            }
        }

        tracing::info!(
            explored = summary.explored,
            aborted = summary.aborted,
            reason = ?summary.reason,
            "exploration finished"
        );
        Ok(summary)
    }
}
