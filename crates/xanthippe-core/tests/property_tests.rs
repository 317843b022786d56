//! # Property-Based Tests
//!
//! Invariants of acquisition, assembly, the temporal log and the decoder
//! under arbitrary input.

use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::VecDeque;
use std::time::Duration;
use xanthippe_core::acquisition::checksum_ok;
use xanthippe_core::decoder::glyph_bitmap;
use xanthippe_core::hal::SampleSource;
use xanthippe_core::primitives::expected_checksum;
use xanthippe_core::{
    AcquisitionStateMachine, DisplayModel, Frame, TemporalLog, Timestamp, TriggerOutcome,
    assemble, disassemble,
};

const PERIOD: u64 = 12_000_000;
const TIMEOUT: u64 = 6_000_000;

/// Source that replays arbitrary captures.
struct Replay(VecDeque<u32>);

impl SampleSource for Replay {
    fn acquire(&mut self) -> u32 {
        self.0.pop_front().unwrap_or(0)
    }
}

/// A capture for backplane `trigger` with a valid checksum nibble.
fn valid_capture(trigger: u8, segments: u32) -> u32 {
    ((segments & 0x0FFF_FFFF) << 4) | (!expected_checksum(trigger) & 0xF)
}

fn drawable_cell() -> impl Strategy<Value = u8> {
    let glyphs: Vec<u8> = " 0123456789Er otA_=/\"'n-"
        .chars()
        .filter_map(glyph_bitmap)
        .collect();
    (prop::sample::select(glyphs), any::<bool>())
        .prop_map(|(bits, point)| if point { bits | 0x80 } else { bits })
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// A capture failing its checksum never enters the open group.
    #[test]
    fn checksum_invariant(
        events in vec((0u8..4, 0u64..8_000_000, any::<u32>()), 1..200)
    ) {
        let values: VecDeque<u32> = events.iter().map(|&(_, _, v)| v).collect();
        let mut machine = AcquisitionStateMachine::new(Replay(values), TIMEOUT);
        let mut now = Timestamp::default();

        for &(trigger, gap, _) in &events {
            now = now.add_nanos(gap);
            machine.on_trigger(trigger, now);
            for sample in machine.pending_samples() {
                prop_assert!(checksum_ok(sample.trigger, sample.value));
            }
        }
    }

    /// The open group is always a run of ordered, timely samples from 0.
    #[test]
    fn group_integrity(
        events in vec((0u8..5, 0u64..8_000_000, any::<bool>()), 1..200),
        segments in any::<u32>()
    ) {
        let values: VecDeque<u32> = events
            .iter()
            .map(|&(t, _, ok)| {
                let capture = valid_capture(t % 4, segments);
                if ok { capture } else { capture ^ 1 }
            })
            .collect();
        let mut machine = AcquisitionStateMachine::new(Replay(values), TIMEOUT);
        let mut now = Timestamp::default();

        for &(trigger, gap, _) in &events {
            now = now.add_nanos(gap);
            let outcome = machine.on_trigger(trigger, now);
            let pending = machine.pending_samples();

            prop_assert!(pending.len() < 4);
            for (i, sample) in pending.iter().enumerate() {
                prop_assert_eq!(usize::from(sample.trigger), i);
            }
            for pair in pending.windows(2) {
                prop_assert!(pair[1].at.since(pair[0].at) <= TIMEOUT);
            }
            if matches!(outcome, TriggerOutcome::SyncFault | TriggerOutcome::Completed(_)) {
                prop_assert_eq!(pending.len(), 0);
            }
        }
    }

    /// Assembling a disassembled frame gives the frame back.
    #[test]
    fn assembler_inverts_disassembler(bytes in prop::array::uniform14(any::<u8>())) {
        let frame = Frame::new(bytes);
        let captures = disassemble(&frame);
        for (i, capture) in captures.iter().enumerate() {
            prop_assert!(checksum_ok(i as u8, *capture));
        }
        prop_assert_eq!(assemble(&captures), frame);
    }

    /// Log entries never repeat a frame within the continuity window and
    /// start in order.
    #[test]
    fn log_coalescing(
        observations in vec((0u64..40_000_000, 0u8..3), 1..100)
    ) {
        let log = TemporalLog::new(PERIOD, Duration::from_millis(500));
        let mut now = Timestamp::default();
        for &(gap, tag) in &observations {
            now = now.add_nanos(gap);
            let mut bytes = [0u8; 14];
            bytes[3] = tag;
            log.record(now, Frame::new(bytes));
        }

        let entries = log.entries();
        for pair in entries.windows(2) {
            prop_assert!(pair[0].start <= pair[1].start);
            prop_assert!(pair[0].end <= pair[1].start);
            if pair[0].frame == pair[1].frame {
                prop_assert!(pair[1].start.since(pair[0].end) > PERIOD * 3 / 2);
            }
        }
        let expected_last = observations.last().map(|&(_, tag)| tag);
        prop_assert_eq!(log.latest().map(|e| e.frame.as_bytes()[3]), expected_last);
    }

    /// Frames built from drawable cells decode and encode back unchanged.
    #[test]
    fn decode_encode_agree(
        cells in prop::array::uniform12(drawable_cell()),
        low in any::<u8>(),
        high in any::<u8>()
    ) {
        let mut bytes = [0u8; 14];
        bytes[0] = low;
        bytes[1..13].copy_from_slice(&cells);
        bytes[13] = high;
        let frame = Frame::new(bytes);

        let model = DisplayModel::decode(&frame).expect("decode");
        prop_assert_eq!(model.encode().expect("encode"), frame);
        prop_assert_eq!(model.digit_row().chars().count(), 1 + 20 + 2 + 2);
    }
}
