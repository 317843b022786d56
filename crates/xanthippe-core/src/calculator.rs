//! # Calculator Facade
//!
//! One operation the rest of the system builds on: press a key, then wait
//! (bounded) for the display to show something stable. Sessions replay a
//! whole target from a reset state, reporting the frame after every prefix.

use crate::buttons::{ButtonCode, ButtonTable};
use crate::decoder::DisplayModel;
use crate::hal::{Clock, Keypad, StatusDisplay};
use crate::temporal::TemporalLog;
use crate::{ButtonSequence, Frame, XanthippeError};
use std::sync::Arc;

/// Frames observed while replaying a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The replayed sequence.
    pub target: ButtonSequence,
    /// `frames[i]` was showing after the first `i + 1` presses.
    pub frames: Vec<Frame>,
}

impl Session {
    /// `(prefix, frame)` pairs, shortest prefix first.
    pub fn prefixes(&self) -> impl Iterator<Item = (ButtonSequence, Frame)> + '_ {
        self.target.prefixes().zip(self.frames.iter().copied())
    }
}

/// Keypad, clock and display log of one physical calculator.
///
/// Owns the keypad, so two sessions can never interleave on one device.
#[derive(Debug)]
pub struct Calculator<K, C, D> {
    keypad: K,
    clock: C,
    display: D,
    log: Arc<TemporalLog>,
    buttons: Arc<ButtonTable>,
}

impl<K: Keypad, C: Clock, D: StatusDisplay> Calculator<K, C, D> {
    /// Assemble a calculator from its parts.
    pub fn new(
        keypad: K,
        clock: C,
        display: D,
        log: Arc<TemporalLog>,
        buttons: Arc<ButtonTable>,
    ) -> Self {
        Self {
            keypad,
            clock,
            display,
            log,
            buttons,
        }
    }

    /// The button table in use.
    #[must_use]
    pub fn buttons(&self) -> &ButtonTable {
        &self.buttons
    }

    /// The display log read by [`Self::showing`].
    #[must_use]
    pub fn log(&self) -> &Arc<TemporalLog> {
        &self.log
    }

    /// The clock the display is observed against.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The status display.
    #[must_use]
    pub fn display(&self) -> &D {
        &self.display
    }

    /// The frame currently showing.
    pub fn showing(&self) -> Result<Frame, XanthippeError> {
        self.log.showing(&self.clock)
    }

    /// Press one key and return the frame that settles afterwards.
    pub fn press(&mut self, code: ButtonCode) -> Result<Frame, XanthippeError> {
        self.keypad.send(code)?;
        self.showing()
    }

    /// Press the key bound to `symbol`.
    pub fn press_symbol(&mut self, symbol: char) -> Result<Frame, XanthippeError> {
        self.press(ButtonCode::from_symbol(symbol)?)
    }

    /// Press the key bound to the button `name`.
    pub fn press_name(&mut self, name: &str) -> Result<Frame, XanthippeError> {
        let code = self.buttons.code(name)?;
        self.press(code)
    }

    /// Pulse reset and forget everything observed before it.
    pub fn reset(&mut self) -> Result<Frame, XanthippeError> {
        self.keypad.send(self.buttons.reset())?;
        self.log.flush();
        self.showing()
    }

    /// Replay `target` from reset, collecting the frame after every prefix.
    pub fn session(&mut self, target: &ButtonSequence) -> Result<Session, XanthippeError> {
        let mut frames = Vec::with_capacity(target.len());
        self.session_with(target, |_, frame| {
            frames.push(frame);
            Ok(())
        })?;
        Ok(Session {
            target: target.clone(),
            frames,
        })
    }

    /// Replay `target` from reset, handing every `(prefix, frame)` to
    /// `observe` as soon as it settles.
    ///
    /// Stops at the first error; prefixes already handed out stay handed
    /// out.
    pub fn session_with<F>(
        &mut self,
        target: &ButtonSequence,
        mut observe: F,
    ) -> Result<(), XanthippeError>
    where
        F: FnMut(&ButtonSequence, Frame) -> Result<(), XanthippeError>,
    {
        self.buttons.check(target)?;
        tracing::info!(buttons = %target, names = %self.buttons.describe(target), "session");
        self.reset()?;

        for (prefix, symbol) in target.prefixes().zip(target.symbols()) {
            let frame = self.press_symbol(symbol)?;
            self.status(&prefix, &frame);
            tracing::debug!(buttons = %prefix, frame = %frame, "observed");
            observe(&prefix, frame)?;
        }
        Ok(())
    }

    fn status(&mut self, prefix: &ButtonSequence, frame: &Frame) {
        self.display.write_line(0, prefix.as_str());
        let digits = DisplayModel::decode(frame)
            .map(|model| model.digit_row().trim().to_string())
            .unwrap_or_else(|_| frame.hex());
        self.display.write_line(1, &digits);
    }
}
