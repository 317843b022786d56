//! # Temporal Log
//!
//! Compacts the stream of assembled frames into intervals and answers "what
//! is the calculator showing right now".
//!
//! The display refreshes on its own clock, so "stable" is operational: a
//! frame is showing while it keeps being observed within two refresh
//! periods. Identical frames seen within 1.5 periods of each other extend one
//! interval; anything else opens a new one.
//!
//! ## Sharing
//!
//! The writer is the edge handler ([`crate::reader::LcdReader`]); readers
//! are application threads. The history sits behind a mutex that only the
//! writer, `flush` and diagnostic replay take. Readers of the current state
//! see a published copy of the last entry, replaced whole under a short
//! write lock, so a half-updated entry is never observable.

use crate::hal::Clock;
use crate::{Frame, Timestamp, XanthippeError};
use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::Duration;

/// A frame and the interval during which it was continuously observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntry {
    /// The observed frame.
    pub frame: Frame,
    /// First observation.
    pub start: Timestamp,
    /// Most recent observation.
    pub end: Timestamp,
}

/// Effect of one [`TemporalLog::record`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The last interval was extended.
    Extended,
    /// A new interval was opened.
    Appended,
}

/// Interval log of observed frames.
#[derive(Debug)]
pub struct TemporalLog {
    history: Mutex<Vec<LogEntry>>,
    latest: RwLock<Option<LogEntry>>,
    refresh_period_ns: u64,
    budget: Duration,
}

impl TemporalLog {
    /// Create an empty log for a display refreshing every
    /// `refresh_period_ns`, answering `showing` within `budget`.
    #[must_use]
    pub fn new(refresh_period_ns: u64, budget: Duration) -> Self {
        Self {
            history: Mutex::new(Vec::new()),
            latest: RwLock::new(None),
            refresh_period_ns,
            budget,
        }
    }

    /// Record that `frame` was observed at `at`.
    ///
    /// An `at` earlier than the last observation is taken as the last
    /// observation's time, so intervals never run backwards.
    pub fn record(&self, at: Timestamp, frame: Frame) -> RecordOutcome {
        let mut history = self.lock();
        let continuity = self.refresh_period_ns.saturating_mul(3) / 2;
        let at = history.last().map_or(at, |last| at.max(last.end));

        let outcome = match history.last_mut() {
            Some(last) if last.frame == frame && at.since(last.end) <= continuity => {
                last.end = at;
                RecordOutcome::Extended
            }
            _ => {
                history.push(LogEntry {
                    frame,
                    start: at,
                    end: at,
                });
                RecordOutcome::Appended
            }
        };

        let last = history.last().copied();
        *self.latest.write().unwrap_or_else(|e| e.into_inner()) = last;
        outcome
    }

    /// The most recent interval, if any.
    #[must_use]
    pub fn latest(&self) -> Option<LogEntry> {
        *self.latest.read().unwrap_or_else(|e| e.into_inner())
    }

    /// The frame currently showing, waiting up to the budget for the
    /// display to be actively refreshing.
    ///
    /// Polls once per refresh period. An exhausted budget is an error, not
    /// a blank display.
    pub fn showing<C: Clock + ?Sized>(&self, clock: &C) -> Result<Frame, XanthippeError> {
        let started = clock.now();
        let budget_ns = u64::try_from(self.budget.as_nanos()).unwrap_or(u64::MAX);
        let fresh_ns = self.refresh_period_ns.saturating_mul(2);
        let poll = Duration::from_nanos(self.refresh_period_ns.max(1));

        loop {
            let now = clock.now();
            if let Some(entry) = self.latest() {
                if now.since(entry.end) <= fresh_ns {
                    return Ok(entry.frame);
                }
            }
            if now.since(started) >= budget_ns {
                return Err(XanthippeError::StabilizationTimeout {
                    waited_ms: u64::try_from(self.budget.as_millis()).unwrap_or(u64::MAX),
                });
            }
            clock.sleep(poll);
        }
    }

    /// Drop every interval but the most recent one.
    ///
    /// Used after a hardware reset so readings from a previous session
    /// cannot leak into the next. Must not race with [`Self::record`].
    pub fn flush(&self) {
        let mut history = self.lock();
        let keep_from = history.len().saturating_sub(1);
        history.drain(..keep_from);
    }

    /// Copy of the retained history, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Number of retained intervals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const PERIOD: u64 = 12_000_000;

    fn frame(tag: u8) -> Frame {
        let mut bytes = [0u8; 14];
        bytes[3] = tag;
        Frame::new(bytes)
    }

    fn at(ms: u64) -> Timestamp {
        Timestamp::from_nanos(ms * 1_000_000)
    }

    fn log() -> TemporalLog {
        TemporalLog::new(PERIOD, Duration::from_millis(500))
    }

    /// Virtual clock; sleeping just advances time.
    struct StepClock(Cell<u64>);

    impl Clock for StepClock {
        fn now(&self) -> Timestamp {
            Timestamp::from_nanos(self.0.get())
        }
        fn sleep(&self, duration: Duration) {
            self.0.set(self.0.get() + duration.as_nanos() as u64);
        }
    }

    #[test]
    fn identical_frames_within_window_coalesce() {
        let log = log();
        assert_eq!(log.record(at(0), frame(1)), RecordOutcome::Appended);
        assert_eq!(log.record(at(12), frame(1)), RecordOutcome::Extended);
        assert_eq!(log.len(), 1);
        let entry = log.latest().expect("entry");
        assert_eq!((entry.start, entry.end), (at(0), at(12)));
    }

    #[test]
    fn gap_over_window_opens_new_entry() {
        let log = log();
        log.record(at(0), frame(1));
        // 1.5 periods = 18 ms
        assert_eq!(log.record(at(19), frame(1)), RecordOutcome::Appended);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn different_frame_opens_new_entry() {
        let log = log();
        log.record(at(0), frame(1));
        assert_eq!(log.record(at(1), frame(2)), RecordOutcome::Appended);
        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.windows(2).all(|w| w[0].start <= w[1].start));
        assert!(entries.windows(2).all(|w| w[0].frame != w[1].frame));
    }

    #[test]
    fn late_observation_is_clamped() {
        let log = log();
        log.record(at(10), frame(1));
        assert_eq!(log.record(at(4), frame(1)), RecordOutcome::Extended);
        let entry = log.latest().expect("entry");
        assert_eq!((entry.start, entry.end), (at(10), at(10)));

        assert_eq!(log.record(at(2), frame(2)), RecordOutcome::Appended);
        let entries = log.entries();
        assert_eq!(entries[1].start, at(10));
        assert!(entries.iter().all(|e| e.start <= e.end));
    }

    #[test]
    fn flush_keeps_only_latest() {
        let log = log();
        log.record(at(0), frame(1));
        log.record(at(1), frame(2));
        log.record(at(2), frame(3));
        log.flush();
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].frame, frame(3));
        log.flush();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn showing_returns_fresh_frame() {
        let log = log();
        let clock = StepClock(Cell::new(at(100).as_nanos()));
        log.record(at(90), frame(7));
        assert_eq!(log.showing(&clock).expect("showing"), frame(7));
    }

    #[test]
    fn showing_times_out_on_stale_display() {
        let log = log();
        let clock = StepClock(Cell::new(at(100).as_nanos()));
        log.record(at(10), frame(7));
        let result = log.showing(&clock);
        assert!(matches!(
            result,
            Err(XanthippeError::StabilizationTimeout { waited_ms: 500 })
        ));
        // the budget was spent sleeping, not spinning
        assert!(clock.now().since(at(100)) >= 500_000_000);
    }

    #[test]
    fn showing_on_empty_log_times_out() {
        let log = log();
        let clock = StepClock(Cell::new(0));
        assert!(log.showing(&clock).is_err());
    }
}
