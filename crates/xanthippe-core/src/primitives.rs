//! # Innate Primitives
//!
//! Hardcoded constants describing the calculator's LCD multiplexing and the
//! adapter board wiring.
//!
//! These are facts about the hardware, compiled into the binary and immutable
//! at runtime. Tunable timings live in [`crate::config::Timing`] and default
//! to the values below.

/// Number of multiplex backplanes, and therefore triggers per refresh cycle.
pub const BACKPLANES: usize = 4;

/// Width of one raw shift-register capture.
pub const SAMPLE_BITS: u32 = 32;

/// Low bits of every raw capture that carry the backplane checksum.
pub const CHECKSUM_BITS: u32 = 4;

/// Segment columns left in a capture once the checksum nibble is dropped.
pub const SEGMENT_COLUMNS: usize = (SAMPLE_BITS - CHECKSUM_BITS) as usize;

/// Bytes in one assembled display frame.
///
/// Four rows of 28 columns are 112 bits, packed two columns per byte.
pub const FRAME_LEN: usize = 14;

/// Mantissa digit cells in a frame.
pub const MANTISSA_CELLS: usize = 10;

/// Exponent digit cells in a frame.
pub const EXPONENT_CELLS: usize = 2;

/// Bits carried by one button code.
pub const BUTTON_CODE_BITS: u32 = 6;

/// Name reserved for the hardware reset pulse in the button table.
pub const RESET_BUTTON: &str = "reset";

/// Longest button sequence accepted anywhere (store keys, intake, CLI).
pub const MAX_SEQUENCE_LENGTH: usize = 64;

// =============================================================================
// DEFAULT TIMINGS (nanoseconds / milliseconds)
// =============================================================================

/// Longest gap between two accepted samples of one multiplex cycle.
///
/// The LCD driver clocks each backplane for roughly 3 ms; 6 ms leaves one
/// backplane of slack before a group is declared out of sync.
pub const DEFAULT_SAMPLE_TIMEOUT_NS: u64 = 6_000_000;

/// Nominal duration of one full refresh (all four backplanes).
pub const DEFAULT_REFRESH_PERIOD_NS: u64 = 12_000_000;

/// Wall-clock budget of a single "what is showing" query.
pub const DEFAULT_SHOWING_BUDGET_MS: u64 = 500;

/// Time the enable line is held active for one press.
pub const DEFAULT_PRESS_ON_MS: u64 = 50;

/// Time the enable line is released after one press.
pub const DEFAULT_PRESS_OFF_MS: u64 = 100;

/// Extra settle time after the reset pulse.
pub const DEFAULT_RESET_SETTLE_MS: u64 = 350;

/// Maximum request body accepted by the intake endpoint.
pub const DEFAULT_MAX_INTAKE_BYTES: usize = 10_000;

/// Checksum nibble expected (after bit inversion) for a backplane.
#[must_use]
pub const fn expected_checksum(trigger: u8) -> u32 {
    8 >> trigger
}
