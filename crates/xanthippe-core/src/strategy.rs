//! # Exploration Strategies
//!
//! Resumable generators of candidate sequences. Each variant keeps its own
//! cursor, so a strategy picks up where it left off every time the rotation
//! comes back to it.
//!
//! A pull yields one of three things: a candidate, "nothing right now"
//! (the strategy stays in the rotation), or exhaustion (the strategy leaves
//! the rotation for good).

use crate::config::{ExploreSettings, StrategyKind};
use crate::storage::CoverageStore;
use crate::{ButtonSequence, XanthippeError};
use rand::Rng;
use rand::rngs::StdRng;
use std::collections::VecDeque;

/// Result of one pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// A sequence to try.
    Next(ButtonSequence),
    /// Nothing to offer now; ask again later.
    Idle,
    /// Nothing to offer ever again.
    Exhausted,
}

/// What a strategy may look at while producing a candidate.
pub struct StrategyContext<'a> {
    /// Coverage so far.
    pub store: &'a CoverageStore,
    /// Explorable symbols, ascending.
    pub alphabet: &'a [char],
    /// Shared randomness.
    pub rng: &'a mut StdRng,
}

impl StrategyContext<'_> {
    fn random_sequence(&mut self, length: usize) -> Result<ButtonSequence, XanthippeError> {
        let alphabet = self.alphabet;
        let rng = &mut *self.rng;
        let symbols: String = (0..length)
            .map(|_| alphabet[rng.random_range(0..alphabet.len())])
            .collect();
        ButtonSequence::new(symbols)
    }
}

/// A candidate generator with its cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Uniformly random sequences of one length, forever.
    FixedLengthRandom {
        /// Presses per candidate.
        length: usize,
    },
    /// Every uncovered prefix by length then symbol order, padded with a
    /// random tail to `length` presses.
    Lexicographic {
        /// Full candidate length; also the longest prefix enumerated.
        length: usize,
        /// Alphabet indices of the next prefix; empty before the first pull.
        odometer: Vec<usize>,
    },
    /// Requested sequences without a screen, longest first.
    Requested {
        /// Rows fetched per refill.
        batch_size: usize,
        /// Fetched but not yet offered.
        batch: VecDeque<ButtonSequence>,
    },
    /// A requested sequence followed by a short random tail.
    RequestContinuation {
        /// Longest requested sequence used as a base.
        max_base: usize,
        /// Random presses appended.
        tail: usize,
        /// Candidates drawn per base.
        repeats: usize,
        /// Current base and candidates left for it.
        base: Option<(ButtonSequence, usize)>,
    },
}

impl Strategy {
    /// A fresh strategy of `kind`.
    #[must_use]
    pub fn new(kind: StrategyKind, settings: &ExploreSettings) -> Self {
        match kind {
            StrategyKind::FixedLengthRandom => Self::FixedLengthRandom {
                length: settings.fixed_length,
            },
            StrategyKind::Lexicographic => Self::Lexicographic {
                length: settings.lexicographic_length,
                odometer: Vec::new(),
            },
            StrategyKind::Requested => Self::Requested {
                batch_size: settings.request_batch.max(1),
                batch: VecDeque::new(),
            },
            StrategyKind::RequestContinuation => Self::RequestContinuation {
                max_base: settings.continuation_max_length,
                tail: settings.continuation_tail,
                repeats: settings.continuation_repeats.max(1),
                base: None,
            },
        }
    }

    /// The kind this strategy was built from.
    #[must_use]
    pub const fn kind(&self) -> StrategyKind {
        match self {
            Self::FixedLengthRandom { .. } => StrategyKind::FixedLengthRandom,
            Self::Lexicographic { .. } => StrategyKind::Lexicographic,
            Self::Requested { .. } => StrategyKind::Requested,
            Self::RequestContinuation { .. } => StrategyKind::RequestContinuation,
        }
    }

    /// Produce the next candidate.
    pub fn next(&mut self, ctx: &mut StrategyContext<'_>) -> Result<Candidate, XanthippeError> {
        if ctx.alphabet.is_empty() {
            return Ok(Candidate::Exhausted);
        }
        match self {
            Self::FixedLengthRandom { length } => {
                Ok(Candidate::Next(ctx.random_sequence(*length)?))
            }

            Self::Lexicographic { length, odometer } => loop {
                if !advance(odometer, ctx.alphabet.len(), *length) {
                    return Ok(Candidate::Exhausted);
                }
                let prefix: String = odometer.iter().map(|&i| ctx.alphabet[i]).collect();
                let prefix = ButtonSequence::new(prefix)?;
                if ctx.store.is_covered(&prefix)? {
                    continue;
                }
                let tail = ctx.random_sequence(length.saturating_sub(prefix.len()))?;
                return Ok(Candidate::Next(prefix.concat(&tail)?));
            },

            Self::Requested { batch_size, batch } => {
                if batch.is_empty() {
                    batch.extend(ctx.store.pending_requests(*batch_size)?);
                }
                Ok(batch.pop_front().map_or(Candidate::Idle, Candidate::Next))
            }

            Self::RequestContinuation {
                max_base,
                tail,
                repeats,
                base,
            } => {
                if base.is_none() {
                    let requested = ctx.store.requested_up_to(*max_base)?;
                    if requested.is_empty() {
                        return Ok(Candidate::Idle);
                    }
                    let pick = requested[ctx.rng.random_range(0..requested.len())].clone();
                    *base = Some((pick, *repeats));
                }
                let Some((seed, left)) = base.as_mut() else {
                    return Ok(Candidate::Idle);
                };
                let candidate = seed.concat(&ctx.random_sequence(*tail)?)?;
                *left -= 1;
                if *left == 0 {
                    *base = None;
                }
                Ok(Candidate::Next(candidate))
            }
        }
    }
}

/// Step an odometer of alphabet indices to the next sequence in
/// length-then-lexicographic order. Returns false past `max_len`.
fn advance(odometer: &mut Vec<usize>, radix: usize, max_len: usize) -> bool {
    if odometer.len() > max_len {
        return false;
    }
    if odometer.is_empty() {
        odometer.push(0);
        return max_len > 0;
    }
    for digit in odometer.iter_mut().rev() {
        *digit += 1;
        if *digit < radix {
            return true;
        }
        *digit = 0;
    }
    // every digit wrapped: move to the next length
    odometer.push(0);
    odometer.len() <= max_len
}

// =============================================================================
// ROTATION
// =============================================================================

/// The active set of strategies.
#[derive(Debug, Clone, Default)]
pub struct Rotation {
    active: Vec<Strategy>,
}

impl Rotation {
    /// One fresh strategy per configured kind.
    #[must_use]
    pub fn from_settings(settings: &ExploreSettings) -> Self {
        Self {
            active: settings
                .strategies
                .iter()
                .map(|&kind| Strategy::new(kind, settings))
                .collect(),
        }
    }

    /// Strategies still in the rotation.
    #[must_use]
    pub fn active(&self) -> Vec<StrategyKind> {
        self.active.iter().map(Strategy::kind).collect()
    }

    /// True once every strategy has been retired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Pull from a uniformly chosen strategy, retiring it if exhausted.
    ///
    /// Returns `None` only when the rotation is empty.
    pub fn pull(
        &mut self,
        ctx: &mut StrategyContext<'_>,
    ) -> Result<Option<(StrategyKind, Candidate)>, XanthippeError> {
        if self.active.is_empty() {
            return Ok(None);
        }
        let index = ctx.rng.random_range(0..self.active.len());
        let strategy = &mut self.active[index];
        let kind = strategy.kind();
        let candidate = strategy.next(ctx)?;
        if candidate == Candidate::Exhausted {
            self.active.swap_remove(index);
            tracing::info!(strategy = %kind, remaining = self.active.len(), "strategy exhausted");
        }
        Ok(Some((kind, candidate)))
    }
}
