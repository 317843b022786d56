//! # Acquisition State Machine
//!
//! Reacts to the four backplane edges of every LCD refresh cycle and collects
//! one raw capture per backplane.
//!
//! ## Rules
//!
//! - Trigger 0 always starts a new group; whatever was pending is dropped.
//! - Trigger `i > 0` is accepted only if exactly `i` samples are pending and
//!   the previous one is at most `sample_timeout` old. Otherwise the group is
//!   cleared and the edge ignored; the next trigger 0 resynchronizes.
//! - Every accepted edge captures 32 bits. If the inverted low nibble is not
//!   `8 >> i` the capture is corrupt and dropped without clearing the group,
//!   so a repeated edge for the same backplane can still complete it.
//! - Trigger 3 completes the group, which is handed out and cleared.
//!
//! Faults are never errors. They are counted in [`AcquisitionStats`].
//! Handlers run in edge-callback context: no allocation, no waiting.

use crate::Timestamp;
use crate::hal::SampleSource;
use crate::primitives::{BACKPLANES, expected_checksum};

/// One accepted capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSample {
    /// Backplane that triggered the capture.
    pub trigger: u8,
    /// The 32 captured bits, checksum nibble included.
    pub value: u32,
    /// When the edge was observed.
    pub at: Timestamp,
}

impl RawSample {
    /// True if the checksum nibble matches the sample's backplane.
    #[must_use]
    pub const fn checksum_ok(&self) -> bool {
        checksum_ok(self.trigger, self.value)
    }
}

/// Checksum test for a capture from backplane `trigger`.
#[must_use]
pub const fn checksum_ok(trigger: u8, value: u32) -> bool {
    (!value & 0x0F) == expected_checksum(trigger)
}

/// What a single edge did to the pending group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The sample was appended; `pending` samples are now held.
    Accepted {
        /// Samples held after this edge.
        pending: usize,
    },
    /// The edge completed a group.
    Completed([u32; BACKPLANES]),
    /// Out-of-order or late edge; the group was cleared.
    SyncFault,
    /// The capture failed its checksum and was dropped.
    ChecksumFault,
}

/// Running fault and completion counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcquisitionStats {
    /// Groups handed to the assembler.
    pub completed: u64,
    /// Edges rejected for order or timing.
    pub sync_faults: u64,
    /// Captures rejected by the checksum.
    pub checksum_faults: u64,
}

/// Collects one group of four captures per refresh cycle.
#[derive(Debug)]
pub struct AcquisitionStateMachine<S> {
    source: S,
    group: [RawSample; BACKPLANES],
    pending: usize,
    timeout_ns: u64,
    stats: AcquisitionStats,
}

impl<S: SampleSource> AcquisitionStateMachine<S> {
    /// Create a machine reading from `source`, with the given inter-sample
    /// timeout.
    pub fn new(source: S, timeout_ns: u64) -> Self {
        Self {
            source,
            group: [RawSample::default(); BACKPLANES],
            pending: 0,
            timeout_ns,
            stats: AcquisitionStats::default(),
        }
    }

    /// Handle the inactive edge of backplane `trigger` observed at `now`.
    pub fn on_trigger(&mut self, trigger: u8, now: Timestamp) -> TriggerOutcome {
        let index = usize::from(trigger);
        if index >= BACKPLANES {
            return self.sync_fault(trigger, "unknown backplane");
        }

        if index == 0 {
            self.pending = 0;
        } else {
            if self.pending != index {
                return self.sync_fault(trigger, "out of order");
            }
            let previous = self.group[index - 1].at;
            if now.since(previous) > self.timeout_ns {
                return self.sync_fault(trigger, "timeout");
            }
        }

        let value = self.source.acquire();
        if !checksum_ok(trigger, value) {
            self.stats.checksum_faults = self.stats.checksum_faults.saturating_add(1);
            tracing::trace!(trigger, value = format_args!("{value:032b}"), "checksum fault");
            return TriggerOutcome::ChecksumFault;
        }

        self.group[index] = RawSample {
            trigger,
            value,
            at: now,
        };
        self.pending = index + 1;

        if self.pending < BACKPLANES {
            return TriggerOutcome::Accepted {
                pending: self.pending,
            };
        }

        self.pending = 0;
        self.stats.completed = self.stats.completed.saturating_add(1);
        TriggerOutcome::Completed(self.group.map(|sample| sample.value))
    }

    /// Samples currently held for the open group.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// The open group's samples, oldest first.
    #[must_use]
    pub fn pending_samples(&self) -> &[RawSample] {
        &self.group[..self.pending]
    }

    /// Counters since construction.
    #[must_use]
    pub fn stats(&self) -> AcquisitionStats {
        self.stats
    }

    /// Access the sample source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    fn sync_fault(&mut self, trigger: u8, reason: &'static str) -> TriggerOutcome {
        self.pending = 0;
        self.stats.sync_faults = self.stats.sync_faults.saturating_add(1);
        tracing::trace!(trigger, reason, "sync fault");
        TriggerOutcome::SyncFault
    }
}
