//! # Configuration Types
//!
//! Tunables for acquisition, pressing and exploration. Values are plain
//! integers so they deserialize straight from the `[timing]` and `[explore]`
//! sections of the TOML file; every field has a default matching the
//! reference hardware.

use crate::primitives::{
    DEFAULT_PRESS_OFF_MS, DEFAULT_PRESS_ON_MS, DEFAULT_REFRESH_PERIOD_NS, DEFAULT_RESET_SETTLE_MS,
    DEFAULT_SAMPLE_TIMEOUT_NS, DEFAULT_SHOWING_BUDGET_MS, MAX_SEQUENCE_LENGTH,
};
use crate::XanthippeError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// TIMING
// =============================================================================

/// Hardware timing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timing {
    /// Longest gap between consecutive samples of one cycle (µs).
    pub sample_timeout_us: u64,
    /// Nominal duration of one full refresh cycle (µs).
    pub refresh_period_us: u64,
    /// Budget of one "what is showing" query (ms).
    pub showing_budget_ms: u64,
    /// Enable line active time per press (ms).
    pub press_on_ms: u64,
    /// Enable line released time per press (ms).
    pub press_off_ms: u64,
    /// Extra delay after the reset pulse (ms).
    pub reset_settle_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            sample_timeout_us: DEFAULT_SAMPLE_TIMEOUT_NS / 1_000,
            refresh_period_us: DEFAULT_REFRESH_PERIOD_NS / 1_000,
            showing_budget_ms: DEFAULT_SHOWING_BUDGET_MS,
            press_on_ms: DEFAULT_PRESS_ON_MS,
            press_off_ms: DEFAULT_PRESS_OFF_MS,
            reset_settle_ms: DEFAULT_RESET_SETTLE_MS,
        }
    }
}

impl Timing {
    /// Inter-sample timeout in nanoseconds.
    #[must_use]
    pub const fn sample_timeout_ns(&self) -> u64 {
        self.sample_timeout_us.saturating_mul(1_000)
    }

    /// Refresh period in nanoseconds.
    #[must_use]
    pub const fn refresh_period_ns(&self) -> u64 {
        self.refresh_period_us.saturating_mul(1_000)
    }

    /// Refresh period.
    #[must_use]
    pub const fn refresh_period(&self) -> Duration {
        Duration::from_micros(self.refresh_period_us)
    }

    /// Showing-query budget.
    #[must_use]
    pub const fn showing_budget(&self) -> Duration {
        Duration::from_millis(self.showing_budget_ms)
    }

    /// Enable line active time.
    #[must_use]
    pub const fn press_on(&self) -> Duration {
        Duration::from_millis(self.press_on_ms)
    }

    /// Enable line released time.
    #[must_use]
    pub const fn press_off(&self) -> Duration {
        Duration::from_millis(self.press_off_ms)
    }

    /// Settle time after reset.
    #[must_use]
    pub const fn reset_settle(&self) -> Duration {
        Duration::from_millis(self.reset_settle_ms)
    }

    /// Reject values that would make acquisition or stabilization impossible.
    pub fn validate(&self) -> Result<(), XanthippeError> {
        if self.refresh_period_us == 0 {
            return Err(XanthippeError::Config(
                "timing.refresh_period_us must be positive".to_string(),
            ));
        }
        if self.sample_timeout_us == 0 {
            return Err(XanthippeError::Config(
                "timing.sample_timeout_us must be positive".to_string(),
            ));
        }
        if self.showing_budget_ms == 0 {
            return Err(XanthippeError::Config(
                "timing.showing_budget_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// EXPLORATION
// =============================================================================

/// Candidate generators available to the explorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Endless uniformly random sequences of a fixed length.
    FixedLengthRandom,
    /// Every sequence by length then lexicographic order, padded randomly.
    Lexicographic,
    /// Externally requested sequences that are not covered yet.
    Requested,
    /// A random requested sequence followed by a short random tail.
    RequestContinuation,
}

impl StrategyKind {
    /// Every strategy, in rotation order.
    pub const ALL: [Self; 4] = [
        Self::FixedLengthRandom,
        Self::Lexicographic,
        Self::Requested,
        Self::RequestContinuation,
    ];

    /// Kebab-case name, as used in configuration and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FixedLengthRandom => "fixed-length-random",
            Self::Lexicographic => "lexicographic",
            Self::Requested => "requested",
            Self::RequestContinuation => "request-continuation",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Exploration parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExploreSettings {
    /// Strategies placed in the rotation at startup.
    pub strategies: Vec<StrategyKind>,
    /// Length of fixed-length random sequences.
    pub fixed_length: usize,
    /// Full session length the lexicographic strategy pads to; enumeration
    /// stops after prefixes of this length.
    pub lexicographic_length: usize,
    /// Requested sequences fetched per batch.
    pub request_batch: usize,
    /// Longest requested sequence a continuation may start from.
    pub continuation_max_length: usize,
    /// Random symbols appended to a requested sequence.
    pub continuation_tail: usize,
    /// Continuations drawn from one requested sequence before picking another.
    pub continuation_repeats: usize,
    /// Pulls attempted by one `get_target` before giving up for now.
    pub pull_limit: usize,
    /// Pause when no strategy has a candidate (ms).
    pub idle_backoff_ms: u64,
    /// Seed for the strategy RNG; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for ExploreSettings {
    fn default() -> Self {
        Self {
            strategies: StrategyKind::ALL.to_vec(),
            fixed_length: 10,
            lexicographic_length: 10,
            request_batch: 20,
            continuation_max_length: 20,
            continuation_tail: 5,
            continuation_repeats: 10,
            pull_limit: 1_000,
            idle_backoff_ms: 1_000,
            seed: None,
        }
    }
}

impl ExploreSettings {
    /// Idle pause.
    #[must_use]
    pub const fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    /// Reject lengths the store could not hold and empty rotations.
    pub fn validate(&self) -> Result<(), XanthippeError> {
        if self.strategies.is_empty() {
            return Err(XanthippeError::Config(
                "explore.strategies must name at least one strategy".to_string(),
            ));
        }
        let longest_continuation = self
            .continuation_max_length
            .saturating_add(self.continuation_tail);
        for (field, value) in [
            ("fixed_length", self.fixed_length),
            ("lexicographic_length", self.lexicographic_length),
            ("continuation_max_length + continuation_tail", longest_continuation),
        ] {
            if value == 0 || value > MAX_SEQUENCE_LENGTH {
                return Err(XanthippeError::Config(format!(
                    "explore.{field} must be within 1..={MAX_SEQUENCE_LENGTH}, got {value}"
                )));
            }
        }
        if self.pull_limit == 0 {
            return Err(XanthippeError::Config(
                "explore.pull_limit must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timing_matches_hardware() {
        let timing = Timing::default();
        assert_eq!(timing.sample_timeout_ns(), 6_000_000);
        assert_eq!(timing.refresh_period_ns(), 12_000_000);
        assert_eq!(timing.showing_budget(), Duration::from_millis(500));
        assert!(timing.validate().is_ok());
    }

    #[test]
    fn zero_refresh_rejected() {
        let timing = Timing {
            refresh_period_us: 0,
            ..Timing::default()
        };
        assert!(matches!(timing.validate(), Err(XanthippeError::Config(_))));
    }

    #[test]
    fn default_explore_settings_valid() {
        let settings = ExploreSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.strategies.len(), 4);
    }

    #[test]
    fn oversized_length_rejected() {
        let settings = ExploreSettings {
            fixed_length: MAX_SEQUENCE_LENGTH + 1,
            ..ExploreSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn strategy_names_are_kebab_case() {
        assert_eq!(StrategyKind::RequestContinuation.to_string(), "request-continuation");
    }
}
