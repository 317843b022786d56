//! # Bit Assembler
//!
//! Packs the four raw backplane captures of one refresh cycle into a frame.
//!
//! Each capture is one row: 28 segment columns (most significant first)
//! followed by a 4-bit checksum. Transposing the 4×28 bit matrix gives 28
//! four-bit columns; two adjacent columns make one output byte.
//!
//! ```text
//!            col 0   col 1   ...   col 26  col 27
//! row 0 (bp0)  a0      b0            ..      ..     | cksum
//! row 1 (bp1)  a1      b1                           | cksum
//! row 2 (bp2)  a2      b2                           | cksum
//! row 3 (bp3)  a3      b3                           | cksum
//!
//! byte 0 = a0 a1 a2 a3 b0 b1 b2 b3
//! ```

use crate::Frame;
use crate::primitives::{BACKPLANES, CHECKSUM_BITS, FRAME_LEN, SEGMENT_COLUMNS, expected_checksum};

/// Four-bit column `col` of the transposed sample matrix, row 0 in the MSB.
fn column(samples: &[u32; BACKPLANES], col: usize) -> u8 {
    let shift = SEGMENT_COLUMNS - 1 - col;
    samples.iter().fold(0u8, |nibble, sample| {
        let bit = ((sample >> CHECKSUM_BITS) >> shift) & 1;
        (nibble << 1) | bit as u8
    })
}

/// Assemble one frame from the captures of backplanes 0..3, in order.
///
/// The checksum nibble of every capture is discarded; validation happens in
/// [`crate::acquisition`] before a sample is accepted.
#[must_use]
pub fn assemble(samples: &[u32; BACKPLANES]) -> Frame {
    let mut bytes = [0u8; FRAME_LEN];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = (column(samples, 2 * i) << 4) | column(samples, 2 * i + 1);
    }
    Frame::new(bytes)
}

/// Inverse of [`assemble`]: the captures a healthy panel would present for
/// `frame`, each carrying its backplane's checksum nibble.
#[must_use]
pub fn disassemble(frame: &Frame) -> [u32; BACKPLANES] {
    let mut samples = [0u32; BACKPLANES];
    for (row, sample) in samples.iter_mut().enumerate() {
        let mut segments = 0u32;
        for col in 0..SEGMENT_COLUMNS {
            let byte = frame.0[col / 2];
            let nibble = if col % 2 == 0 { byte >> 4 } else { byte & 0x0F };
            let bit = (nibble >> (BACKPLANES - 1 - row)) & 1;
            segments = (segments << 1) | u32::from(bit);
        }
        let checksum = !expected_checksum(row as u8) & 0x0F;
        *sample = (segments << CHECKSUM_BITS) | checksum;
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Captures taken from the panel showing "34" in DEG mode.
    const SHOWING_34: [u32; 4] = [
        0b00000000010000000000000000000111,
        0b10000010100000000000000000001011,
        0b10000011110000000000000000001101,
        0b00000001100000000000000000001110,
    ];

    #[test]
    fn documented_captures_assemble() {
        let frame = assemble(&SHOWING_34);
        assert_eq!(
            frame.0,
            [0x60, 0x00, 0x00, 0x63, 0x7a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn disassemble_restores_captures() {
        assert_eq!(disassemble(&assemble(&SHOWING_34)), SHOWING_34);
    }

    #[test]
    fn checksum_nibble_is_ignored() {
        let mut noisy = SHOWING_34;
        for sample in &mut noisy {
            *sample ^= 0x0F;
        }
        assert_eq!(assemble(&noisy), assemble(&SHOWING_34));
    }

    #[test]
    fn all_segments_on() {
        let frame = Frame::new([0xFF; FRAME_LEN]);
        let samples = disassemble(&frame);
        for (row, sample) in samples.iter().enumerate() {
            assert_eq!(sample >> CHECKSUM_BITS, (1 << SEGMENT_COLUMNS) - 1);
            assert_eq!(!sample & 0x0F, expected_checksum(row as u8));
        }
        assert_eq!(assemble(&samples), frame);
    }
}
