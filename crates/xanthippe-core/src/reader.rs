//! # LCD Reader
//!
//! Edge-handler glue: every backplane edge goes through the acquisition
//! machine, every completed group is assembled and recorded in the shared
//! [`TemporalLog`].
//!
//! Whatever delivers the edges (a GPIO interrupt, a polling thread, the
//! simulator) owns the reader and calls [`LcdReader::on_edge`] sequentially.

use crate::acquisition::{AcquisitionStateMachine, AcquisitionStats, TriggerOutcome};
use crate::assembler::assemble;
use crate::config::Timing;
use crate::hal::SampleSource;
use crate::temporal::TemporalLog;
use crate::Timestamp;
use std::sync::Arc;

/// Acquisition, assembly and logging for one display.
#[derive(Debug)]
pub struct LcdReader<S> {
    machine: AcquisitionStateMachine<S>,
    log: Arc<TemporalLog>,
}

impl<S: SampleSource> LcdReader<S> {
    /// Create a reader feeding `log`.
    pub fn new(source: S, timing: &Timing, log: Arc<TemporalLog>) -> Self {
        Self {
            machine: AcquisitionStateMachine::new(source, timing.sample_timeout_ns()),
            log,
        }
    }

    /// Handle the inactive edge of backplane `trigger`.
    pub fn on_edge(&mut self, trigger: u8, now: Timestamp) -> TriggerOutcome {
        let outcome = self.machine.on_trigger(trigger, now);
        if let TriggerOutcome::Completed(samples) = &outcome {
            self.log.record(now, assemble(samples));
        }
        outcome
    }

    /// The log this reader writes to.
    #[must_use]
    pub fn log(&self) -> &Arc<TemporalLog> {
        &self.log
    }

    /// Acquisition counters.
    #[must_use]
    pub fn stats(&self) -> AcquisitionStats {
        self.machine.stats()
    }

    /// Access the sample source.
    pub fn source_mut(&mut self) -> &mut S {
        self.machine.source_mut()
    }
}
