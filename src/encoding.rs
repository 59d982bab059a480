//! 4b6b symbol encoding and decoding for ASK/OOK frames.
//!
//! Every frame byte travels as two 6-bit symbols (high nibble first). The 16
//! symbols are chosen for transition density: each one carries exactly three
//! ones and three zeroes and never more than two equal bits in a row, which
//! keeps the receiver's envelope detector and software PLL locked.
//!
//! Only 16 of the 64 possible 6-bit values are valid. [`decode_6b4b`] reports
//! anything else as `None`, so the receiver can tell an invalid symbol apart
//! from a legitimate `0` nibble.

use heapless::Vec;

use crate::consts::{RADIO_MAX_BUF_LEN_USIZE, RADIO_PREAMBLE};

/// Nibble to symbol table.
pub const SYMBOLS: [u8; 16] = [
    0xd, 0xe, 0x13, 0x15, 0x16, 0x19, 0x1a, 0x1c, 0x23, 0x25, 0x26, 0x29, 0x2a, 0x2c, 0x32, 0x34,
];

static REV_SYMBOLS: [Option<u8>; 64] = reverse_table();

const fn reverse_table() -> [Option<u8>; 64] {
    let mut table = [None; 64];
    let mut nibble = 0;
    while nibble < SYMBOLS.len() {
        table[SYMBOLS[nibble] as usize] = Some(nibble as u8);
        nibble += 1;
    }
    table
}

/// Encoded frame: preamble plus two symbols per frame byte.
pub type SymbolBuffer = Vec<u8, RADIO_MAX_BUF_LEN_USIZE>;

/// Encodes an 8-bit byte into two 6-bit symbols using 4b6b encoding.
pub fn encode_4b6b(byte: u8) -> [u8; 2] {
    let high = (byte >> 4) & 0x0F;
    let low = byte & 0x0F;
    [SYMBOLS[high as usize], SYMBOLS[low as usize]]
}

/// Maps one 6-bit symbol back to its nibble.
///
/// Returns `None` for values outside the symbol table.
pub fn decode_symbol(symbol: u8) -> Option<u8> {
    REV_SYMBOLS.get(usize::from(symbol)).copied().flatten()
}

/// Decodes two 6-bit symbols back into the original byte using the reverse symbol table.
///
/// Returns `None` if either symbol is invalid (not part of the encoding table).
pub fn decode_6b4b(sym_hi: u8, sym_lo: u8) -> Option<u8> {
    let high = decode_symbol(sym_hi)?;
    let low = decode_symbol(sym_lo)?;
    Some((high << 4) | low)
}

/// Encodes an array of 8-bit bytes into `output` as 6-bit symbols.
///
/// Encoding stops at whichever of `input` or `output` runs out first; a
/// trailing odd slot in `output` is left untouched.
///
/// # Returns
/// The number of symbols written.
pub fn encode_buffer(input: &[u8], output: &mut [u8]) -> usize {
    let mut written = 0;
    for (&byte, pair) in input.iter().zip(output.chunks_exact_mut(2)) {
        pair.copy_from_slice(&encode_4b6b(byte));
        written += 2;
    }
    written
}

/// Builds the on-air symbol sequence for a raw frame: the preamble followed by
/// two symbols per byte of `raw`.
///
/// Returns `None` if the encoded frame does not fit a [`SymbolBuffer`].
pub fn encode_frame(raw: &[u8]) -> Option<SymbolBuffer> {
    let mut symbols = SymbolBuffer::new();
    symbols.extend_from_slice(&RADIO_PREAMBLE).ok()?;
    let start = symbols.len();
    symbols.resize(start + raw.len() * 2, 0).ok()?;
    let written = encode_buffer(raw, &mut symbols[start..]);
    debug_assert_eq!(written, raw.len() * 2);
    Some(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_are_dc_balanced() {
        for sym in SYMBOLS {
            assert_eq!(sym.count_ones(), 3, "symbol {sym:#x}");
            assert!(sym < 64);
        }
    }

    #[test]
    fn test_every_byte_survives_the_table() {
        for byte in 0..=u8::MAX {
            let [hi, lo] = encode_4b6b(byte);
            assert_eq!(decode_6b4b(hi, lo), Some(byte));
        }
    }

    #[test]
    fn test_unknown_symbol_is_reported() {
        assert_eq!(decode_symbol(0x00), None);
        assert_eq!(decode_symbol(0x3f), None);
        assert_eq!(decode_symbol(0x40), None);
        assert_eq!(decode_6b4b(SYMBOLS[1], 0x07), None);
        assert_eq!(decode_symbol(SYMBOLS[0]), Some(0));
    }

    #[test]
    fn test_encode_frame_prefixes_preamble() {
        let symbols = encode_frame(&[0x41]).unwrap();
        assert_eq!(&symbols[..8], &RADIO_PREAMBLE);
        assert_eq!(&symbols[8..], &[SYMBOLS[4], SYMBOLS[1]]);
    }

    #[test]
    fn test_encode_buffer_stops_at_short_output() {
        let mut output = [0u8; 5];
        assert_eq!(encode_buffer(&[0x12, 0x34, 0x56], &mut output), 4);
        assert_eq!(&output[..4], &[SYMBOLS[1], SYMBOLS[2], SYMBOLS[3], SYMBOLS[4]]);
        assert_eq!(output[4], 0);
        assert_eq!(encode_buffer(&[0x12], &mut [0u8; 1]), 0);
    }

    #[test]
    fn test_encode_frame_rejects_oversized_input() {
        let raw = [0u8; 68];
        assert!(encode_frame(&raw).is_none());
        assert!(encode_frame(&raw[..67]).is_some());
    }
}
