//! # Frame Decoder
//!
//! Turns a [`Frame`] into the calculator's semantic display: ten mantissa
//! digits, a two-digit exponent, sign flags and the annunciator labels.
//!
//! ## Segment cells
//!
//! ```text
//!      -A-
//!     |   |
//!     F   B
//!     |   |          bit:  7  6 5 4 3 2 1 0
//!      -G-                 DP C B A D E G F
//!     |   |
//!     E   C
//!     |   |
//!      -D- DP
//! ```
//!
//! A cell's low seven bits select a glyph; bit 7 is its decimal point. A
//! pattern with no glyph is a decode fault for the whole call: it means the
//! wiring or the table drifted, and guessing would poison the store.
//!
//! ## Annunciators
//!
//! Bytes 0 and 13 carry one flag per bit, most significant bit first. The
//! decimal points of the two exponent cells are the `K` and `()` flags.

use crate::primitives::{EXPONENT_CELLS, FRAME_LEN, MANTISSA_CELLS};
use crate::{Frame, XanthippeError};
use std::collections::BTreeSet;

/// Decimal point bit of a cell.
const POINT: u8 = 0x80;

/// Segment pattern (`CBADEGF`) to glyph.
const GLYPHS: [(u8, char); 23] = [
    (0b0000000, ' '),
    (0b1100000, '1'),
    (0b0111110, '2'),
    (0b1111010, '3'),
    (0b1100011, '4'),
    (0b1011011, '5'),
    (0b1011111, '6'),
    (0b1110001, '7'),
    (0b1111111, '8'),
    (0b1111011, '9'),
    (0b1111101, '0'),
    (0b0011111, 'E'),
    (0b0000110, 'r'),
    (0b1001110, 'o'),
    (0b0001111, 't'),
    (0b1110111, 'A'),
    (0b0001000, '_'),
    (0b0001010, '='),
    (0b1001000, '/'),
    (0b0100001, '"'),
    (0b0000001, '\''),
    (0b1000110, 'n'),
    (0b0000010, '-'),
];

const EXPONENT_RANGE: std::ops::Range<usize> = 1..1 + EXPONENT_CELLS;
const MANTISSA_RANGE: std::ops::Range<usize> =
    1 + EXPONENT_CELLS..1 + EXPONENT_CELLS + MANTISSA_CELLS;
const LOW_FLAGS: usize = 0;
const HIGH_FLAGS: usize = FRAME_LEN - 1;

// =============================================================================
// CELLS
// =============================================================================

/// One decoded seven-segment cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// The glyph drawn by the segments (`' '` when dark).
    pub glyph: char,
    /// Decimal point to the right of the glyph.
    pub point: bool,
}

impl Cell {
    /// A dark cell.
    pub const BLANK: Self = Self {
        glyph: ' ',
        point: false,
    };

    /// Decode a cell byte.
    pub fn decode(byte: u8) -> Result<Self, XanthippeError> {
        let pattern = byte & !POINT;
        GLYPHS
            .iter()
            .find(|(bits, _)| *bits == pattern)
            .map(|&(_, glyph)| Self {
                glyph,
                point: byte & POINT != 0,
            })
            .ok_or(XanthippeError::Decode { bitmap: byte })
    }

    /// Encode back to a cell byte.
    pub fn encode(self) -> Result<u8, XanthippeError> {
        let pattern = glyph_bitmap(self.glyph).ok_or(XanthippeError::InvalidSymbol(self.glyph))?;
        Ok(if self.point { pattern | POINT } else { pattern })
    }
}

/// Segment pattern for a glyph, if the display can draw it.
#[must_use]
pub fn glyph_bitmap(glyph: char) -> Option<u8> {
    GLYPHS
        .iter()
        .find(|(_, g)| *g == glyph)
        .map(|&(bits, _)| bits)
}

// =============================================================================
// ANNUNCIATORS
// =============================================================================

/// Indicator labels around the digits, in canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Annunciator {
    /// Memory 1 in use.
    M1,
    /// Memory 2 in use.
    M2,
    /// Memory 3 in use.
    M3,
    /// Second function key armed.
    Second,
    /// Hyperbolic prefix armed.
    Hyp,
    /// Scientific notation.
    Sci,
    /// Engineering notation.
    Eng,
    /// Fixed decimal places.
    Fix,
    /// Statistics mode.
    Stat,
    /// "DE", lit with [`Self::G`] to spell "DEG".
    De,
    /// "G", the end of "DEG" and the start of "GRAD".
    G,
    /// "RAD", lit alone for radians or after [`Self::G`] for "GRAD".
    Rad,
    /// "X" of the "XR" register exchange indicator.
    X,
    /// "R" of the "XR" register exchange indicator.
    R,
    /// Open parentheses pending.
    Parens,
    /// Constant operation.
    K,
}

impl Annunciator {
    /// Every annunciator, left to right on the glass.
    pub const CANONICAL: [Self; 16] = [
        Self::M1,
        Self::M2,
        Self::M3,
        Self::Second,
        Self::Hyp,
        Self::Sci,
        Self::Eng,
        Self::Fix,
        Self::Stat,
        Self::De,
        Self::G,
        Self::Rad,
        Self::X,
        Self::R,
        Self::Parens,
        Self::K,
    ];

    /// Label with its trailing spacing; inactive labels render as blanks of
    /// the same width so columns stay aligned.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::M1 => "M1 ",
            Self::M2 => "M2 ",
            Self::M3 => "M3 ",
            Self::Second => "2nd ",
            Self::Hyp => "HYP ",
            Self::Sci => "SCI",
            Self::Eng => "ENG ",
            Self::Fix => "FIX ",
            Self::Stat => "STAT ",
            Self::De => "DE",
            Self::G => "G",
            Self::Rad => "RAD ",
            Self::X => "X",
            Self::R => "R ",
            Self::Parens => "() ",
            Self::K => "K",
        }
    }
}

/// Meaning of one bit in a flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagBit {
    Show(Annunciator),
    ExponentMinus,
    MantissaMinus,
}

/// Byte 0, most significant bit first.
const LOW_FLAG_BITS: [FlagBit; 8] = [
    FlagBit::Show(Annunciator::Stat),
    FlagBit::Show(Annunciator::De),
    FlagBit::Show(Annunciator::G),
    FlagBit::Show(Annunciator::Fix),
    FlagBit::Show(Annunciator::R),
    FlagBit::Show(Annunciator::X),
    FlagBit::Show(Annunciator::Rad),
    FlagBit::ExponentMinus,
];

/// Byte 13, most significant bit first.
const HIGH_FLAG_BITS: [FlagBit; 8] = [
    FlagBit::Show(Annunciator::M3),
    FlagBit::MantissaMinus,
    FlagBit::Show(Annunciator::M2),
    FlagBit::Show(Annunciator::M1),
    FlagBit::Show(Annunciator::Second),
    FlagBit::Show(Annunciator::Hyp),
    FlagBit::Show(Annunciator::Eng),
    FlagBit::Show(Annunciator::Sci),
];

// =============================================================================
// DISPLAY MODEL
// =============================================================================

/// Semantic content of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayModel {
    /// Mantissa cells, least significant (rightmost) first.
    pub mantissa: [Cell; MANTISSA_CELLS],
    /// Exponent cells, least significant first. Their points are not
    /// decimal points but the `K` / `()` annunciators.
    pub exponent: [Cell; EXPONENT_CELLS],
    /// Minus sign before the mantissa.
    pub mantissa_negative: bool,
    /// Minus sign before the exponent.
    pub exponent_negative: bool,
    /// Lit annunciators.
    pub annunciators: BTreeSet<Annunciator>,
}

impl Default for DisplayModel {
    fn default() -> Self {
        Self {
            mantissa: [Cell::BLANK; MANTISSA_CELLS],
            exponent: [Cell::BLANK; EXPONENT_CELLS],
            mantissa_negative: false,
            exponent_negative: false,
            annunciators: BTreeSet::new(),
        }
    }
}

impl DisplayModel {
    /// Decode a frame. Fails on the first cell without a glyph.
    pub fn decode(frame: &Frame) -> Result<Self, XanthippeError> {
        let bytes = frame.as_bytes();
        let mut model = Self::default();

        for (cell, &byte) in model.mantissa.iter_mut().zip(&bytes[MANTISSA_RANGE]) {
            *cell = Cell::decode(byte)?;
        }
        for (cell, &byte) in model.exponent.iter_mut().zip(&bytes[EXPONENT_RANGE]) {
            *cell = Cell::decode(byte)?;
        }

        for (table, byte) in [
            (&LOW_FLAG_BITS, bytes[LOW_FLAGS]),
            (&HIGH_FLAG_BITS, bytes[HIGH_FLAGS]),
        ] {
            for (i, flag) in table.iter().enumerate() {
                if byte & (0x80 >> i) == 0 {
                    continue;
                }
                match *flag {
                    FlagBit::Show(a) => {
                        model.annunciators.insert(a);
                    }
                    FlagBit::ExponentMinus => model.exponent_negative = true,
                    FlagBit::MantissaMinus => model.mantissa_negative = true,
                }
            }
        }

        if model.exponent[0].point {
            model.annunciators.insert(Annunciator::K);
        }
        if model.exponent[1].point {
            model.annunciators.insert(Annunciator::Parens);
        }
        Ok(model)
    }

    /// Encode back into a frame.
    pub fn encode(&self) -> Result<Frame, XanthippeError> {
        let mut bytes = [0u8; FRAME_LEN];
        for (slot, cell) in bytes[MANTISSA_RANGE].iter_mut().zip(&self.mantissa) {
            *slot = cell.encode()?;
        }
        for (slot, cell) in bytes[EXPONENT_RANGE].iter_mut().zip(&self.exponent) {
            *slot = Cell { point: false, ..*cell }.encode()?;
        }
        if self.annunciators.contains(&Annunciator::K) {
            bytes[EXPONENT_RANGE.start] |= POINT;
        }
        if self.annunciators.contains(&Annunciator::Parens) {
            bytes[EXPONENT_RANGE.start + 1] |= POINT;
        }

        for (table, index) in [(&LOW_FLAG_BITS, LOW_FLAGS), (&HIGH_FLAG_BITS, HIGH_FLAGS)] {
            for (i, flag) in table.iter().enumerate() {
                let lit = match *flag {
                    FlagBit::Show(a) => self.annunciators.contains(&a),
                    FlagBit::ExponentMinus => self.exponent_negative,
                    FlagBit::MantissaMinus => self.mantissa_negative,
                };
                if lit {
                    bytes[index] |= 0x80 >> i;
                }
            }
        }
        Ok(Frame::new(bytes))
    }

    /// Model with right-aligned mantissa text such as `"5."` or `"E r"`.
    ///
    /// Each glyph may be followed by `.` to light its decimal point.
    pub fn with_mantissa(text: &str) -> Result<Self, XanthippeError> {
        let mut cells: Vec<Cell> = Vec::new();
        for c in text.chars() {
            match (c, cells.last_mut()) {
                ('.', Some(last)) if !last.point => last.point = true,
                ('.', _) => cells.push(Cell {
                    glyph: ' ',
                    point: true,
                }),
                (glyph, _) => {
                    glyph_bitmap(glyph).ok_or(XanthippeError::InvalidSymbol(glyph))?;
                    cells.push(Cell {
                        glyph,
                        point: false,
                    });
                }
            }
        }
        if cells.len() > MANTISSA_CELLS {
            return Err(XanthippeError::InvalidSequence(format!(
                "mantissa {text:?} needs {} cells",
                cells.len()
            )));
        }

        let mut model = Self::default();
        for (slot, cell) in model.mantissa.iter_mut().zip(cells.into_iter().rev()) {
            *slot = cell;
        }
        Ok(model)
    }

    /// Add lit annunciators.
    #[must_use]
    pub fn lit(mut self, annunciators: &[Annunciator]) -> Self {
        self.annunciators.extend(annunciators.iter().copied());
        self
    }

    /// Annunciator row: active labels in canonical order, blanks elsewhere.
    #[must_use]
    pub fn annunciator_row(&self) -> String {
        Annunciator::CANONICAL
            .iter()
            .map(|a| {
                let label = a.label();
                if self.annunciators.contains(a) {
                    label.to_string()
                } else {
                    " ".repeat(label.len())
                }
            })
            .collect()
    }

    /// Digit row: signs, mantissa and exponent as drawn, leftmost first.
    #[must_use]
    pub fn digit_row(&self) -> String {
        let mut row = String::with_capacity(2 + 2 * MANTISSA_CELLS + 2 + EXPONENT_CELLS);
        row.push(if self.mantissa_negative { '-' } else { ' ' });
        for cell in self.mantissa.iter().rev() {
            row.push(cell.glyph);
            row.push(if cell.point { '.' } else { ' ' });
        }
        row.push_str(if self.exponent_negative { " -" } else { "  " });
        for cell in self.exponent.iter().rev() {
            row.push(cell.glyph);
        }
        row
    }

    /// Mantissa as a compact string, e.g. `"5."`.
    #[must_use]
    pub fn mantissa_text(&self) -> String {
        let mut text = String::new();
        for cell in self.mantissa.iter().rev() {
            text.push(cell.glyph);
            if cell.point {
                text.push('.');
            }
        }
        text.trim().to_string()
    }

    /// Both rows, as the glass shows them.
    #[must_use]
    pub fn render(&self) -> String {
        format!("{}\n{}", self.annunciator_row(), self.digit_row())
    }
}

impl std::fmt::Display for DisplayModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Decode and render a frame in one step.
pub fn render(frame: &Frame) -> Result<String, XanthippeError> {
    DisplayModel::decode(frame).map(|model| model.render())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_cells_decode() {
        assert_eq!(
            Cell::decode(0x63).expect("4"),
            Cell {
                glyph: '4',
                point: false
            }
        );
        assert_eq!(
            Cell::decode(0x7a).expect("3"),
            Cell {
                glyph: '3',
                point: false
            }
        );
        assert_eq!(
            Cell::decode(0xe3).expect("4."),
            Cell {
                glyph: '4',
                point: true
            }
        );
    }

    #[test]
    fn unknown_bitmap_is_a_decode_fault() {
        let err = Cell::decode(0b0000_0011).expect_err("no glyph");
        assert!(matches!(err, XanthippeError::Decode { bitmap: 3 }));
        assert_eq!(err.to_string(), "no symbol for bitmap 00000011");
    }

    #[test]
    fn bad_cell_fails_whole_frame() {
        let mut bytes = [0u8; FRAME_LEN];
        bytes[7] = 0b0000_0011;
        assert!(DisplayModel::decode(&Frame::new(bytes)).is_err());
    }

    #[test]
    fn glyph_table_is_bijective() {
        for (bits, glyph) in GLYPHS {
            assert_eq!(glyph_bitmap(glyph), Some(bits));
            assert_eq!(Cell::decode(bits).expect("glyph").glyph, glyph);
        }
    }

    #[test]
    fn showing_34_renders() {
        let frame = Frame::from_hex("60 00 00 63 7a 00 00 00 00 00 00 00 00 00").expect("hex");
        let model = DisplayModel::decode(&frame).expect("decode");
        assert_eq!(
            model.annunciators,
            BTreeSet::from([Annunciator::De, Annunciator::G])
        );
        assert_eq!(model.mantissa_text(), "34");
        assert_eq!(model.annunciator_row().trim(), "DEG");
        assert_eq!(model.digit_row().trim_end(), "                 3 4");
    }

    #[test]
    fn everything_lit_renders() {
        let model = DisplayModel::decode(&Frame::new([0xFF; FRAME_LEN])).expect("decode");
        assert_eq!(
            model.render(),
            "M1 M2 M3 2nd HYP SCIENG FIX STAT DEGRAD XR () K\n-8.8.8.8.8.8.8.8.8.8. -88"
        );
    }

    #[test]
    fn encode_inverts_decode() {
        let frame = Frame::new([0xFF; FRAME_LEN]);
        let model = DisplayModel::decode(&frame).expect("decode");
        assert_eq!(model.encode().expect("encode"), frame);
    }

    #[test]
    fn mantissa_text_builds_cells() {
        let model = DisplayModel::with_mantissa("5.")
            .expect("model")
            .lit(&[Annunciator::De, Annunciator::G]);
        assert_eq!(
            model.mantissa[0],
            Cell {
                glyph: '5',
                point: true
            }
        );
        let frame = model.encode().expect("encode");
        let back = DisplayModel::decode(&frame).expect("decode");
        assert_eq!(back.mantissa_text(), "5.");
        assert_eq!(back.annunciator_row().trim(), "DEG");
    }

    #[test]
    fn mantissa_text_rejects_unknown_glyphs() {
        assert!(matches!(
            DisplayModel::with_mantissa("x"),
            Err(XanthippeError::InvalidSymbol('x'))
        ));
        assert!(DisplayModel::with_mantissa("12345678901").is_err());
    }
}
