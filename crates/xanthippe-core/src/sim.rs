//! # Simulated Calculator
//!
//! A virtual-time stand-in for the calculator and its adapter board, used
//! by the tests and by dry runs of the CLI.
//!
//! The device implements [`Keypad`] and [`Clock`] through the stock line
//! drivers: presses go through a [`ButtonPresser`] onto six simulated code
//! lines and an enable line, and the glass is read by a [`ShiftIn`] clocking
//! a simulated register chain. Time only moves when somebody sleeps on it;
//! while it moves, the four backplane edges of every refresh period are
//! fired into an [`LcdReader`]. Everything from the line protocols down to
//! the temporal log is the real code.
//!
//! What the glass shows is looked up by the symbols pressed since the last
//! reset. Histories without a scripted frame show their press count, which
//! is enough for exploration runs that only care about coverage.

use crate::acquisition::AcquisitionStats;
use crate::assembler::disassemble;
use crate::buttons::ButtonCode;
use crate::config::Timing;
use crate::decoder::{Annunciator, DisplayModel};
use crate::hal::{ButtonPresser, Clock, InputLine, Keypad, OutputLine, ShiftIn};
use crate::primitives::{BACKPLANES, BUTTON_CODE_BITS, SAMPLE_BITS};
use crate::reader::LcdReader;
use crate::temporal::TemporalLog;
use crate::{Frame, Timestamp, XanthippeError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Script of the reference session `2 + 3 =`, keyed by symbols since reset.
pub const REFERENCE_SCRIPT: &[(&str, &str)] = &[
    ("", "0."),
    ("T", "2"),
    ("TC", "2."),
    ("TCb", "3"),
    ("TCbi", "5."),
];

/// Frame with `mantissa` right-aligned and the degree indicator lit.
pub fn degree_frame(mantissa: &str) -> Result<Frame, XanthippeError> {
    DisplayModel::with_mantissa(mantissa)?
        .lit(&[Annunciator::De, Annunciator::G])
        .encode()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// =============================================================================
// SHIFT REGISTER CHAIN
// =============================================================================

/// Register chain wired to the segment pins of the selected backplane.
#[derive(Debug)]
struct ShiftChain {
    rows: [u32; BACKPLANES],
    backplane: usize,
    register: u32,
    captures: u64,
    glitch_every: Option<u64>,
}

impl ShiftChain {
    /// Freeze the pins into the register.
    fn latch(&mut self) {
        self.captures = self.captures.wrapping_add(1);
        let value = self.rows[self.backplane % BACKPLANES];
        self.register = match self.glitch_every {
            Some(n) if n > 0 && self.captures % n == 0 => value ^ 0b0001,
            _ => value,
        };
    }
}

#[derive(Debug, Clone, Copy)]
enum ChainPin {
    Load,
    Clock,
}

/// Parallel-load or shift-clock input of the chain.
#[derive(Debug)]
struct ChainLine {
    chain: Arc<Mutex<ShiftChain>>,
    pin: ChainPin,
}

impl OutputLine for ChainLine {
    fn set_high(&mut self) {
        let mut chain = lock(&self.chain);
        match self.pin {
            ChainPin::Load => chain.latch(),
            ChainPin::Clock => chain.register <<= 1,
        }
    }

    fn set_low(&mut self) {}
}

/// Serial output of the last register in the chain.
#[derive(Debug)]
struct SerialOut {
    chain: Arc<Mutex<ShiftChain>>,
}

impl InputLine for SerialOut {
    fn is_high(&self) -> bool {
        (lock(&self.chain).register >> (SAMPLE_BITS - 1)) & 1 == 1
    }
}

type PanelReader = ShiftIn<ChainLine, ChainLine, SerialOut>;

// =============================================================================
// DEVICE STATE
// =============================================================================

#[derive(Debug)]
struct SimState {
    now: u64,
    next_edge: u64,
    edge_spacing: u64,
    next_backplane: u8,
    chain: Arc<Mutex<ShiftChain>>,
    reader: LcdReader<PanelReader>,
    script: BTreeMap<String, Frame>,
    blackouts: BTreeSet<String>,
    history: String,
    reset: ButtonCode,
    presses: u64,
    code_lines: [bool; BUTTON_CODE_BITS as usize],
    fault: Option<XanthippeError>,
}

impl SimState {
    /// Move virtual time to `target`, firing every edge on the way.
    fn advance_to(&mut self, target: u64) {
        let dark = self.blackouts.contains(&self.history);
        while self.next_edge <= target {
            self.now = self.next_edge;
            if !dark {
                let backplane = self.next_backplane;
                lock(&self.chain).backplane = usize::from(backplane);
                self.reader.on_edge(backplane, Timestamp::from_nanos(self.now));
            }
            self.next_backplane = (self.next_backplane + 1) % BACKPLANES as u8;
            self.next_edge = self.next_edge.saturating_add(self.edge_spacing);
        }
        self.now = self.now.max(target);
    }

    fn advance_by(&mut self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.advance_to(self.now.saturating_add(nanos));
    }

    fn frame_for_history(&self) -> Result<Frame, XanthippeError> {
        match self.script.get(&self.history) {
            Some(frame) => Ok(*frame),
            None => degree_frame(&format!("{}.", self.history.len())),
        }
    }

    fn show(&mut self, frame: Frame) {
        lock(&self.chain).rows = disassemble(&frame);
    }

    /// The enable line went low: take the code on the lines as one press.
    fn key_down(&mut self) {
        let value = self
            .code_lines
            .iter()
            .enumerate()
            .fold(0u8, |acc, (bit, &high)| acc | (u8::from(high) << bit));
        let code = ButtonCode::from_value(value);
        self.presses = self.presses.saturating_add(1);
        if code == self.reset {
            self.history.clear();
        } else {
            self.history.push(code.symbol());
        }
        match self.frame_for_history() {
            Ok(frame) => self.show(frame),
            Err(e) => self.fault = Some(e),
        }
    }
}

// =============================================================================
// KEYPAD LINES
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum KeyPin {
    Code(usize),
    Enable,
}

/// One of the keypad driver's output lines.
#[derive(Debug)]
struct KeyLine {
    state: Arc<Mutex<SimState>>,
    pin: KeyPin,
}

impl OutputLine for KeyLine {
    fn set_high(&mut self) {
        if let KeyPin::Code(bit) = self.pin {
            self.set_code_line(bit, true);
        }
    }

    fn set_low(&mut self) {
        match self.pin {
            KeyPin::Code(bit) => self.set_code_line(bit, false),
            KeyPin::Enable => lock(&self.state).key_down(),
        }
    }
}

impl KeyLine {
    fn set_code_line(&self, bit: usize, high: bool) {
        if let Some(level) = lock(&self.state).code_lines.get_mut(bit) {
            *level = high;
        }
    }
}

/// Virtual clock shared by the device and its keypad driver.
#[derive(Debug, Clone)]
struct DeviceClock {
    state: Arc<Mutex<SimState>>,
}

impl Clock for DeviceClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_nanos(lock(&self.state).now)
    }

    fn sleep(&self, duration: Duration) {
        lock(&self.state).advance_by(duration);
    }
}

// =============================================================================
// DEVICE
// =============================================================================

/// Handle to a simulated calculator. Clones share the same device.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    state: Arc<Mutex<SimState>>,
    keypad: Arc<Mutex<ButtonPresser<KeyLine, DeviceClock>>>,
}

impl SimulatedDevice {
    /// Power on a device that writes into `log`, showing the reset frame.
    pub fn new(timing: &Timing, reset: ButtonCode, log: Arc<TemporalLog>) -> Self {
        let chain = Arc::new(Mutex::new(ShiftChain {
            rows: disassemble(&Frame::BLANK),
            backplane: 0,
            register: 0,
            captures: 0,
            glitch_every: None,
        }));
        let panel = ShiftIn::new(
            ChainLine {
                chain: Arc::clone(&chain),
                pin: ChainPin::Load,
            },
            ChainLine {
                chain: Arc::clone(&chain),
                pin: ChainPin::Clock,
            },
            SerialOut {
                chain: Arc::clone(&chain),
            },
        );
        let edge_spacing = (timing.refresh_period_ns() / BACKPLANES as u64).max(1);
        let state = Arc::new(Mutex::new(SimState {
            now: 0,
            next_edge: edge_spacing,
            edge_spacing,
            next_backplane: 0,
            chain,
            reader: LcdReader::new(panel, timing, log),
            script: BTreeMap::new(),
            blackouts: BTreeSet::new(),
            history: String::new(),
            reset,
            presses: 0,
            code_lines: [false; BUTTON_CODE_BITS as usize],
            fault: None,
        }));

        let key_line = |pin| KeyLine {
            state: Arc::clone(&state),
            pin,
        };
        let data = [0, 1, 2, 3, 4, 5].map(|bit| key_line(KeyPin::Code(bit)));
        let presser = ButtonPresser::new(
            data,
            key_line(KeyPin::Enable),
            DeviceClock {
                state: Arc::clone(&state),
            },
            reset,
            timing,
        );
        Self {
            state,
            keypad: Arc::new(Mutex::new(presser)),
        }
    }

    /// A device scripted with [`REFERENCE_SCRIPT`].
    pub fn reference(
        timing: &Timing,
        reset: ButtonCode,
        log: Arc<TemporalLog>,
    ) -> Result<Self, XanthippeError> {
        let device = Self::new(timing, reset, log);
        for (history, mantissa) in REFERENCE_SCRIPT {
            device.script(history, degree_frame(mantissa)?);
        }
        device.refresh()?;
        Ok(device)
    }

    /// Show `frame` whenever `history` is the press history since reset.
    pub fn script(&self, history: &str, frame: Frame) {
        self.lock().script.insert(history.to_string(), frame);
    }

    /// Stop refreshing the display while `history` is current.
    pub fn blackout(&self, history: &str) {
        self.lock().blackouts.insert(history.to_string());
    }

    /// Corrupt the checksum of every `n`-th capture.
    pub fn glitch_every(&self, n: Option<u64>) {
        lock(&self.lock().chain).glitch_every = n;
    }

    /// Symbols pressed since the last reset.
    #[must_use]
    pub fn history(&self) -> String {
        self.lock().history.clone()
    }

    /// Keys sent since power-on, reset included.
    #[must_use]
    pub fn presses(&self) -> u64 {
        self.lock().presses
    }

    /// Acquisition counters of the simulated reader.
    #[must_use]
    pub fn stats(&self) -> AcquisitionStats {
        self.lock().reader.stats()
    }

    /// Re-read the script for the current history.
    pub fn refresh(&self) -> Result<(), XanthippeError> {
        let mut state = self.lock();
        let frame = state.frame_for_history()?;
        state.show(frame);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        lock(&self.state)
    }
}

impl Keypad for SimulatedDevice {
    fn send(&mut self, code: ButtonCode) -> Result<(), XanthippeError> {
        lock(&self.keypad).send(code)?;
        match self.lock().fault.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Clock for SimulatedDevice {
    fn now(&self) -> Timestamp {
        Timestamp::from_nanos(self.lock().now)
    }

    fn sleep(&self, duration: Duration) {
        self.lock().advance_by(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::SampleSource;

    fn setup() -> (SimulatedDevice, Arc<TemporalLog>, ButtonCode) {
        let timing = Timing::default();
        let log = Arc::new(TemporalLog::new(
            timing.refresh_period_ns(),
            timing.showing_budget(),
        ));
        let reset = ButtonCode::from_value(55);
        let device = SimulatedDevice::reference(&timing, reset, Arc::clone(&log)).expect("device");
        (device, log, reset)
    }

    #[test]
    fn sleeping_fires_refresh_cycles() {
        let (device, log, _) = setup();
        device.sleep(Duration::from_millis(120));
        assert_eq!(device.stats().completed, 10);
        assert_eq!(log.len(), 1);
        assert_eq!(
            log.latest().expect("entry").frame,
            degree_frame("0.").expect("frame")
        );
    }

    #[test]
    fn presses_follow_script() {
        let (mut device, log, reset) = setup();
        device.send(reset).expect("reset");
        device
            .send(ButtonCode::from_symbol('T').expect("T"))
            .expect("press");
        assert_eq!(device.history(), "T");
        assert_eq!(
            log.latest().expect("entry").frame,
            degree_frame("2").expect("frame")
        );
    }

    #[test]
    fn unscripted_history_shows_press_count() {
        let (mut device, log, _) = setup();
        for symbol in ['j', 'j', 'j'] {
            device
                .send(ButtonCode::from_symbol(symbol).expect("symbol"))
                .expect("press");
        }
        assert_eq!(
            log.latest().expect("entry").frame,
            degree_frame("3.").expect("frame")
        );
    }

    #[test]
    fn glitches_cost_cycles_not_correctness() {
        let (device, log, _) = setup();
        device.glitch_every(Some(7));
        device.sleep(Duration::from_millis(240));
        let stats = device.stats();
        assert!(stats.checksum_faults > 0);
        assert!(stats.completed > 0);
        assert!(
            log.entries()
                .iter()
                .all(|e| e.frame == degree_frame("0.").expect("frame"))
        );
    }

    #[test]
    fn chain_shifts_out_the_selected_row() {
        let chain = Arc::new(Mutex::new(ShiftChain {
            rows: [0x8000_0001, 0x1234_5678, 0, 0xFFFF_FFFF],
            backplane: 1,
            register: 0,
            captures: 0,
            glitch_every: None,
        }));
        let line = |pin| ChainLine {
            chain: Arc::clone(&chain),
            pin,
        };
        let mut reader = ShiftIn::new(
            line(ChainPin::Load),
            line(ChainPin::Clock),
            SerialOut {
                chain: Arc::clone(&chain),
            },
        );
        assert_eq!(reader.acquire(), 0x1234_5678);
        lock(&chain).backplane = 0;
        assert_eq!(reader.acquire(), 0x8000_0001);
        assert_eq!(lock(&chain).captures, 2);
    }

    #[test]
    fn reset_press_clears_history() {
        let (mut device, log, reset) = setup();
        for symbol in ['T', 'C'] {
            device
                .send(ButtonCode::from_symbol(symbol).expect("symbol"))
                .expect("press");
        }
        assert_eq!(device.history(), "TC");
        device.send(reset).expect("reset");
        assert_eq!(device.history(), "");
        assert_eq!(device.presses(), 3);
        assert_eq!(
            log.latest().expect("entry").frame,
            degree_frame("0.").expect("frame")
        );
    }

    #[test]
    fn blackout_stops_refresh() {
        let (mut device, _, _) = setup();
        device.blackout("j");
        let before = device.stats().completed;
        device
            .send(ButtonCode::from_symbol('j').expect("j"))
            .expect("press");
        device.sleep(Duration::from_millis(100));
        assert_eq!(device.stats().completed, before);
    }
}
