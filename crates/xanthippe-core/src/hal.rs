//! # Hardware Abstractions
//!
//! Traits for the adapter board's lines and peripherals, plus the two small
//! line protocols the core needs: the 32-bit shift-register read used to
//! snoop the LCD, and the keypad press pulse.
//!
//! Concrete GPIO bindings implement [`OutputLine`] and [`InputLine`]; the
//! rest of the crate only sees [`SampleSource`], [`Keypad`], [`Clock`] and
//! [`StatusDisplay`].

use crate::buttons::ButtonCode;
use crate::config::Timing;
use crate::primitives::SAMPLE_BITS;
use crate::{Timestamp, XanthippeError};
use std::time::{Duration, Instant};

/// Columns of the auxiliary character display.
pub const STATUS_COLUMNS: usize = 16;

// =============================================================================
// LINES
// =============================================================================

/// Digital output line.
pub trait OutputLine {
    /// Drive the line high.
    fn set_high(&mut self);

    /// Drive the line low.
    fn set_low(&mut self);

    /// Drive the line to a level.
    fn set_state(&mut self, high: bool) {
        if high {
            self.set_high();
        } else {
            self.set_low();
        }
    }
}

/// Digital input line.
pub trait InputLine {
    /// True if the line reads high.
    fn is_high(&self) -> bool;
}

// =============================================================================
// PERIPHERALS
// =============================================================================

/// Anything that can produce one raw 32-bit backplane capture.
pub trait SampleSource {
    /// Capture the current segment state, most significant bit first.
    fn acquire(&mut self) -> u32;
}

/// Monotonic time source with a sleeping primitive.
pub trait Clock {
    /// The current instant.
    fn now(&self) -> Timestamp;

    /// Suspend the caller for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Emits button presses to the calculator.
pub trait Keypad {
    /// Press and release one key. Returns once the press pulse (and any
    /// settle time) has elapsed; the display is not awaited.
    fn send(&mut self, code: ButtonCode) -> Result<(), XanthippeError>;
}

/// Two-line character display on the adapter board.
pub trait StatusDisplay {
    /// Replace `line` (0 or 1) with `text`.
    fn write_line(&mut self, line: u8, text: &str);
}

/// Pad or cut `text` to the width of the status display.
#[must_use]
pub fn fit_status(text: &str) -> String {
    let mut fitted: String = text.chars().take(STATUS_COLUMNS).collect();
    while fitted.chars().count() < STATUS_COLUMNS {
        fitted.push(' ');
    }
    fitted
}

// =============================================================================
// SHIFT REGISTER READ
// =============================================================================

/// Parallel-in/serial-out shift register chain wired to the LCD segments.
///
/// `sample` is the active-low parallel-load line: while low the registers
/// track the segment pins, raising it freezes them for shifting.
#[derive(Debug)]
pub struct ShiftIn<S, C, D> {
    sample: S,
    clock: C,
    data: D,
}

impl<S: OutputLine, C: OutputLine, D: InputLine> ShiftIn<S, C, D> {
    /// Wrap the three lines. The registers are left in load mode.
    pub fn new(mut sample: S, mut clock: C, data: D) -> Self {
        sample.set_low();
        clock.set_high();
        Self {
            sample,
            clock,
            data,
        }
    }
}

impl<S: OutputLine, C: OutputLine, D: InputLine> SampleSource for ShiftIn<S, C, D> {
    fn acquire(&mut self) -> u32 {
        self.sample.set_high();
        let mut result = 0u32;
        for bit in (0..SAMPLE_BITS).rev() {
            result |= u32::from(self.data.is_high()) << bit;
            self.clock.set_low();
            self.clock.set_high();
        }
        self.sample.set_low();
        result
    }
}

// =============================================================================
// BUTTON PRESSER
// =============================================================================

/// Keypad driver: six code lines plus an active-low enable.
#[derive(Debug)]
pub struct ButtonPresser<L, K> {
    data: [L; 6],
    enable: L,
    clock: K,
    reset: ButtonCode,
    press_on: Duration,
    press_off: Duration,
    reset_settle: Duration,
}

impl<L: OutputLine, K: Clock> ButtonPresser<L, K> {
    /// Wrap the lines. The enable line starts released.
    pub fn new(data: [L; 6], mut enable: L, clock: K, reset: ButtonCode, timing: &Timing) -> Self {
        enable.set_high();
        Self {
            data,
            enable,
            clock,
            reset,
            press_on: timing.press_on(),
            press_off: timing.press_off(),
            reset_settle: timing.reset_settle(),
        }
    }
}

impl<L: OutputLine, K: Clock> Keypad for ButtonPresser<L, K> {
    fn send(&mut self, code: ButtonCode) -> Result<(), XanthippeError> {
        for (line, level) in self.data.iter_mut().zip(code.bits_lsb_first()) {
            line.set_state(level);
        }
        self.enable.set_low();
        self.clock.sleep(self.press_on);
        self.enable.set_high();
        self.clock.sleep(self.press_off);
        if code == self.reset {
            // the calculator needs longer to come back from a full reset
            self.clock.sleep(self.reset_settle);
        }
        Ok(())
    }
}

// =============================================================================
// STOCK IMPLEMENTATIONS
// =============================================================================

/// Wall clock backed by `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// A clock whose origin is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let nanos = u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX);
        Timestamp::from_nanos(nanos)
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Status display that mirrors its lines into the log.
#[derive(Debug, Default, Clone)]
pub struct LogDisplay {
    lines: [String; 2],
}

impl LogDisplay {
    /// Current content of a line.
    #[must_use]
    pub fn line(&self, line: u8) -> &str {
        &self.lines[usize::from(line.min(1))]
    }
}

impl StatusDisplay for LogDisplay {
    fn write_line(&mut self, line: u8, text: &str) {
        let slot = usize::from(line.min(1));
        self.lines[slot] = fit_status(text);
        tracing::debug!(line = slot, text = %self.lines[slot], "status display");
    }
}
