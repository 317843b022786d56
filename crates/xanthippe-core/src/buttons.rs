//! # Button Codes
//!
//! Each calculator key is addressed by a 6-bit code that the adapter board
//! shifts onto the keypad matrix. Codes are written as single base64 digits,
//! so a whole key history is a short printable string:
//!
//! ```text
//! 2 + 3 = reset   ->   T C b i 3
//! ```
//!
//! The [`ButtonTable`] binds human names to symbols. It is loaded once at
//! startup, validated to be bijective, and shared read-only afterwards.

use crate::primitives::{BUTTON_CODE_BITS, RESET_BUTTON};
use crate::{ButtonSequence, XanthippeError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::BTreeMap;

/// Bindings verified on the reference calculator.
pub const REFERENCE_BINDINGS: &[(&str, char)] = &[
    ("reset", '3'),
    ("on", '4'),
    ("2", 'T'),
    ("3", 'b'),
    ("4", 'j'),
    ("+", 'C'),
    ("=", 'i'),
];

// =============================================================================
// BUTTON CODE
// =============================================================================

/// A 6-bit keypad code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ButtonCode(u8);

impl ButtonCode {
    /// Code for a base64 digit.
    pub fn from_symbol(symbol: char) -> Result<Self, XanthippeError> {
        if !crate::types::is_symbol_char(symbol) {
            return Err(XanthippeError::InvalidSymbol(symbol));
        }
        // Three leading zero digits make the symbol the low six bits of the
        // last decoded byte.
        let decoded = STANDARD
            .decode(format!("AAA{symbol}"))
            .map_err(|_| XanthippeError::InvalidSymbol(symbol))?;
        decoded
            .last()
            .map(|byte| Self(byte & 0x3F))
            .ok_or(XanthippeError::InvalidSymbol(symbol))
    }

    /// Code from its raw value. Only the low six bits are kept.
    #[must_use]
    pub const fn from_value(value: u8) -> Self {
        Self(value & 0x3F)
    }

    /// Raw 6-bit value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// The base64 digit for this code.
    #[must_use]
    pub fn symbol(self) -> char {
        STANDARD
            .encode([0u8, 0, self.0])
            .chars()
            .last()
            .unwrap_or('A')
    }

    /// Line levels in shift order, least significant bit first.
    #[must_use]
    pub fn bits_lsb_first(self) -> [bool; BUTTON_CODE_BITS as usize] {
        let mut bits = [false; BUTTON_CODE_BITS as usize];
        for (i, bit) in bits.iter_mut().enumerate() {
            *bit = (self.0 >> i) & 1 == 1;
        }
        bits
    }
}

// =============================================================================
// BUTTON TABLE
// =============================================================================

/// Bijective mapping between button names and codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonTable {
    by_name: BTreeMap<String, ButtonCode>,
    by_symbol: BTreeMap<char, String>,
    reset: ButtonCode,
}

impl ButtonTable {
    /// Build a table from `name -> symbol` bindings.
    ///
    /// Every symbol must be a single base64 digit, no two names may share a
    /// symbol, and a binding for `reset` must be present.
    pub fn from_bindings<'a, I>(bindings: I) -> Result<Self, XanthippeError>
    where
        I: IntoIterator<Item = (&'a str, char)>,
    {
        let mut by_name = BTreeMap::new();
        let mut by_symbol = BTreeMap::new();

        for (name, symbol) in bindings {
            if name.is_empty() {
                return Err(XanthippeError::Config("empty button name".to_string()));
            }
            let code = ButtonCode::from_symbol(symbol)?;
            if let Some(previous) = by_symbol.insert(symbol, name.to_string()) {
                return Err(XanthippeError::Config(format!(
                    "symbol {symbol:?} bound to both {previous:?} and {name:?}"
                )));
            }
            if by_name.insert(name.to_string(), code).is_some() {
                return Err(XanthippeError::Config(format!(
                    "button {name:?} bound twice"
                )));
            }
        }

        let reset = by_name.get(RESET_BUTTON).copied().ok_or_else(|| {
            XanthippeError::Config(format!("no binding for {RESET_BUTTON:?}"))
        })?;

        Ok(Self {
            by_name,
            by_symbol,
            reset,
        })
    }

    /// Build a table from string values, as read from configuration.
    pub fn from_config(bindings: &BTreeMap<String, String>) -> Result<Self, XanthippeError> {
        let mut pairs = Vec::with_capacity(bindings.len());
        for (name, symbol) in bindings {
            let mut chars = symbol.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => pairs.push((name.as_str(), c)),
                _ => {
                    return Err(XanthippeError::Config(format!(
                        "button {name:?} must map to exactly one symbol, got {symbol:?}"
                    )));
                }
            }
        }
        Self::from_bindings(pairs)
    }

    /// The table of [`REFERENCE_BINDINGS`].
    pub fn reference() -> Result<Self, XanthippeError> {
        Self::from_bindings(REFERENCE_BINDINGS.iter().copied())
    }

    /// Code for a button name.
    pub fn code(&self, name: &str) -> Result<ButtonCode, XanthippeError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| XanthippeError::UnknownButton(name.to_string()))
    }

    /// Name bound to a symbol.
    #[must_use]
    pub fn name_of(&self, symbol: char) -> Option<&str> {
        self.by_symbol.get(&symbol).map(String::as_str)
    }

    /// The reset pulse code.
    #[must_use]
    pub const fn reset(&self) -> ButtonCode {
        self.reset
    }

    /// True if the code is the reset pulse.
    #[must_use]
    pub fn is_reset(&self, code: ButtonCode) -> bool {
        code == self.reset
    }

    /// Symbols available to exploration: every bound symbol except reset,
    /// in ascending order.
    #[must_use]
    pub fn alphabet(&self) -> Vec<char> {
        let reset = self.reset.symbol();
        self.by_symbol.keys().copied().filter(|&s| s != reset).collect()
    }

    /// True if the symbol is bound and is not the reset pulse.
    #[must_use]
    pub fn is_explorable(&self, symbol: char) -> bool {
        symbol != self.reset.symbol() && self.by_symbol.contains_key(&symbol)
    }

    /// Check that every symbol of `sequence` is explorable.
    pub fn check(&self, sequence: &ButtonSequence) -> Result<(), XanthippeError> {
        match sequence.symbols().find(|&s| !self.is_explorable(s)) {
            Some(bad) => Err(XanthippeError::InvalidSymbol(bad)),
            None => Ok(()),
        }
    }

    /// Encode button names (`["2", "+", "3"]`) into a symbol sequence.
    pub fn encode<'a, I>(&self, names: I) -> Result<ButtonSequence, XanthippeError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let symbols: String = names
            .into_iter()
            .map(|name| self.code(name).map(ButtonCode::symbol))
            .collect::<Result<_, _>>()?;
        ButtonSequence::new(symbols)
    }

    /// Space-separated button names for a sequence; unbound symbols are
    /// shown as themselves.
    #[must_use]
    pub fn describe(&self, sequence: &ButtonSequence) -> String {
        sequence
            .symbols()
            .map(|s| self.name_of(s).map_or_else(|| s.to_string(), str::to_string))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Number of bindings, reset included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// True if the table has no bindings (never the case once built).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
