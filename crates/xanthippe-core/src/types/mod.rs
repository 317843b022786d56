//! # Core Type Definitions
//!
//! This module contains the value types shared by every Xanthippe component:
//! - Monotonic time (`Timestamp`)
//! - The assembled display memory image (`Frame`)
//! - Button histories used as store keys (`ButtonSequence`)
//! - Error types (`XanthippeError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Use saturating arithmetic for time differences

use crate::primitives::{FRAME_LEN, MAX_SEQUENCE_LENGTH};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// TIMESTAMP
// =============================================================================

/// Monotonic instant in nanoseconds since an arbitrary origin.
///
/// The origin is owned by the [`crate::hal::Clock`] that produced the value;
/// timestamps from different clocks must not be compared.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Create a timestamp from raw nanoseconds.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Raw nanoseconds.
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Nanoseconds elapsed since `earlier`, zero if `earlier` is later.
    #[must_use]
    pub const fn since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// This timestamp moved forward by `nanos`.
    #[must_use]
    pub const fn add_nanos(self, nanos: u64) -> Self {
        Self(self.0.saturating_add(nanos))
    }
}

// =============================================================================
// FRAME
// =============================================================================

/// One assembled, checksum-stripped display memory image.
///
/// Byte layout (see [`crate::decoder`]):
/// - `0`: annunciator bits (statistics, angle units, fix, exponent sign)
/// - `1..3`: exponent cells, least significant digit first
/// - `3..13`: mantissa cells, least significant digit first
/// - `13`: annunciator bits (memories, 2nd, hyp, notation, mantissa sign)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Frame(pub [u8; FRAME_LEN]);

impl Frame {
    /// A frame with every segment off.
    pub const BLANK: Self = Self([0; FRAME_LEN]);

    /// Create a frame from its raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; FRAME_LEN]) -> Self {
        Self(bytes)
    }

    /// Build a frame from a slice, which must be exactly `FRAME_LEN` bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, XanthippeError> {
        let array: [u8; FRAME_LEN] = bytes.try_into().map_err(|_| {
            XanthippeError::DeserializationError(format!(
                "frame must be {} bytes, got {}",
                FRAME_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Parse a frame from hex, ignoring whitespace (`"60 00 00 63 ..."`).
    pub fn from_hex(text: &str) -> Result<Self, XanthippeError> {
        let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
        if digits.len() != FRAME_LEN * 2 {
            return Err(XanthippeError::DeserializationError(format!(
                "expected {} hex digits, got {}",
                FRAME_LEN * 2,
                digits.len()
            )));
        }
        let mut bytes = [0u8; FRAME_LEN];
        for (slot, pair) in bytes.iter_mut().zip(digits.chunks_exact(2)) {
            let pair = std::str::from_utf8(pair)
                .map_err(|e| XanthippeError::DeserializationError(e.to_string()))?;
            *slot = u8::from_str_radix(pair, 16)
                .map_err(|e| XanthippeError::DeserializationError(format!("{pair:?}: {e}")))?;
        }
        Ok(Self(bytes))
    }

    /// Raw bytes of the frame.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    /// Lowercase hex without separators.
    #[must_use]
    pub fn hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Frame {
    /// Space-separated hex, the format used in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

// =============================================================================
// BUTTON SEQUENCE
// =============================================================================

/// A history of button presses, one symbol per press.
///
/// Symbols are base64 digits (`A-Z a-z 0-9 + /`). Whether a symbol is bound
/// to a real button is decided by [`crate::buttons::ButtonTable`]; this type
/// only guarantees the charset and the length bound, which makes it safe to
/// use as a store key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ButtonSequence(String);

impl ButtonSequence {
    /// Validate and wrap a symbol string.
    pub fn new(symbols: impl Into<String>) -> Result<Self, XanthippeError> {
        let symbols = symbols.into();
        if symbols.len() > MAX_SEQUENCE_LENGTH {
            return Err(XanthippeError::InvalidSequence(format!(
                "{} symbols exceeds the limit of {}",
                symbols.len(),
                MAX_SEQUENCE_LENGTH
            )));
        }
        if let Some(bad) = symbols.chars().find(|c| !is_symbol_char(*c)) {
            return Err(XanthippeError::InvalidSymbol(bad));
        }
        Ok(Self(symbols))
    }

    /// The empty sequence (nothing pressed since reset).
    #[must_use]
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Symbols as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of presses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if nothing is pressed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the symbols.
    pub fn symbols(&self) -> impl Iterator<Item = char> + '_ {
        self.0.chars()
    }

    /// The first `len` presses. Symbols are ASCII, so byte slicing is exact.
    #[must_use]
    pub fn prefix(&self, len: usize) -> Self {
        Self(self.0[..len.min(self.0.len())].to_string())
    }

    /// Every non-empty prefix, shortest first.
    pub fn prefixes(&self) -> impl Iterator<Item = Self> + '_ {
        (1..=self.len()).map(|len| self.prefix(len))
    }

    /// True if `self` begins with `prefix`.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(prefix.as_str())
    }

    /// This sequence extended by one symbol.
    pub fn pushed(&self, symbol: char) -> Result<Self, XanthippeError> {
        let mut next = self.0.clone();
        next.push(symbol);
        Self::new(next)
    }

    /// This sequence followed by `tail`.
    pub fn concat(&self, tail: &Self) -> Result<Self, XanthippeError> {
        Self::new(format!("{}{}", self.0, tail.0))
    }
}

impl fmt::Display for ButtonSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ButtonSequence {
    type Err = XanthippeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// True for characters of the standard base64 alphabet.
#[must_use]
pub const fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '+' || c == '/'
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Xanthippe system.
///
/// Hardware timing noise (out-of-order triggers, corrupted samples) is not
/// represented here: it is recovered inside the acquisition machine and only
/// counted. What remains is either recoverable per exploration step
/// (`StabilizationTimeout`) or terminal for a run.
#[derive(Debug, Error)]
pub enum XanthippeError {
    /// A display cell holds a segment pattern with no known glyph.
    #[error("no symbol for bitmap {bitmap:08b}")]
    Decode {
        /// The full cell byte, including the decimal-point bit.
        bitmap: u8,
    },

    /// A button name is not present in the button table.
    #[error("Unknown button: {0}")]
    UnknownButton(String),

    /// A character is not a valid or bound button symbol.
    #[error("Invalid button symbol: {0:?}")]
    InvalidSymbol(char),

    /// A button sequence violates a structural limit.
    #[error("Invalid button sequence: {0}")]
    InvalidSequence(String),

    /// The display never settled within the observation budget.
    #[error("Display did not stabilize within {waited_ms} ms")]
    StabilizationTimeout {
        /// Budget that was exhausted, in milliseconds.
        waited_ms: u64,
    },

    /// The configuration is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// The coverage store file is locked by another open handle.
    #[error("Coverage store {0} is already open")]
    StoreBusy(String),
}

impl XanthippeError {
    /// True if the failure only invalidates the current exploration step.
    ///
    /// Everything else (decode faults, storage failures, bad configuration)
    /// ends the run.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::StabilizationTimeout { .. })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_since_saturates() {
        let early = Timestamp::from_nanos(10);
        let late = Timestamp::from_nanos(25);
        assert_eq!(late.since(early), 15);
        assert_eq!(early.since(late), 0);
    }

    #[test]
    fn frame_hex_roundtrip() {
        let frame = Frame::from_hex("60 00 00 63 7a 00 00 00 00 00 00 00 00 00").expect("hex");
        assert_eq!(frame.0[3], 0x63);
        assert_eq!(frame.hex(), "600000637a000000000000000000");
        assert_eq!(frame.to_string(), "60 00 00 63 7a 00 00 00 00 00 00 00 00 00");
    }

    #[test]
    fn frame_hex_rejects_wrong_length() {
        assert!(Frame::from_hex("60 00").is_err());
        assert!(Frame::from_slice(&[0u8; 13]).is_err());
    }

    #[test]
    fn sequence_rejects_foreign_symbols() {
        assert!(matches!(
            ButtonSequence::new("TC,b"),
            Err(XanthippeError::InvalidSymbol(','))
        ));
        assert!(ButtonSequence::new("a".repeat(MAX_SEQUENCE_LENGTH + 1)).is_err());
    }

    #[test]
    fn sequence_prefixes_shortest_first() {
        let seq = ButtonSequence::new("TCb").expect("valid");
        let prefixes: Vec<String> = seq.prefixes().map(|p| p.to_string()).collect();
        assert_eq!(prefixes, vec!["T", "TC", "TCb"]);
    }

    #[test]
    fn only_timeouts_are_recoverable() {
        assert!(XanthippeError::StabilizationTimeout { waited_ms: 500 }.is_recoverable());
        assert!(!XanthippeError::Decode { bitmap: 3 }.is_recoverable());
        assert!(!XanthippeError::IoError("disk".into()).is_recoverable());
    }
}
