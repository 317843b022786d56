//! # Frame Benchmarks
//!
//! Cost of the per-cycle work: acquisition, assembly, logging and decoding.
//!
//! Run with: `cargo bench -p xanthippe-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;
use xanthippe_core::hal::SampleSource;
use xanthippe_core::{
    AcquisitionStateMachine, DisplayModel, Frame, TemporalLog, Timestamp, assemble, disassemble,
};

const SHOWING_34: [u32; 4] = [
    0b00000000010000000000000000000111,
    0b10000010100000000000000000001011,
    0b10000011110000000000000000001101,
    0b00000001100000000000000000001110,
];

/// Source cycling through the four backplane captures.
struct Cycle {
    rows: [u32; 4],
    next: usize,
}

impl SampleSource for Cycle {
    fn acquire(&mut self) -> u32 {
        let value = self.rows[self.next];
        self.next = (self.next + 1) % 4;
        value
    }
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_assembly(c: &mut Criterion) {
    let frame = Frame::new([0xA5; 14]);
    let captures = disassemble(&frame);

    c.bench_function("assemble", |b| b.iter(|| assemble(black_box(&SHOWING_34))));
    c.bench_function("disassemble", |b| b.iter(|| disassemble(black_box(&frame))));
    c.bench_function("assemble_roundtrip", |b| {
        b.iter(|| assemble(&disassemble(black_box(&assemble(&captures)))))
    });
}

fn bench_acquisition(c: &mut Criterion) {
    let mut group = c.benchmark_group("acquisition");
    for cycles in [1u64, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(cycles), &cycles, |b, &cycles| {
            b.iter(|| {
                let source = Cycle {
                    rows: SHOWING_34,
                    next: 0,
                };
                let mut machine = AcquisitionStateMachine::new(source, 6_000_000);
                for cycle in 0..cycles {
                    for bp in 0..4u8 {
                        let at = Timestamp::from_nanos(cycle * 12_000_000 + u64::from(bp) * 3_000_000);
                        black_box(machine.on_trigger(bp, at));
                    }
                }
                machine.stats()
            });
        });
    }
    group.finish();
}

fn bench_log(c: &mut Criterion) {
    let frame = assemble(&SHOWING_34);
    c.bench_function("log_record_1000", |b| {
        b.iter(|| {
            let log = TemporalLog::new(12_000_000, Duration::from_millis(500));
            for i in 0..1000u64 {
                log.record(Timestamp::from_nanos(i * 12_000_000), black_box(frame));
            }
            log.len()
        })
    });
}

fn bench_decode(c: &mut Criterion) {
    let frame = assemble(&SHOWING_34);
    let lit = Frame::new([0xFF; 14]);

    c.bench_function("decode", |b| {
        b.iter(|| DisplayModel::decode(black_box(&frame)))
    });
    c.bench_function("decode_render_all_lit", |b| {
        b.iter(|| DisplayModel::decode(black_box(&lit)).map(|m| m.render()))
    });
}

criterion_group!(
    benches,
    bench_assembly,
    bench_acquisition,
    bench_log,
    bench_decode
);
criterion_main!(benches);
