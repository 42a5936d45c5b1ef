//! # Code Page 437 Encoding
//!
//! Converts Unicode strings to CP437 single-byte encoding, the default
//! character table of most ESC/POS printers (`ESC t 0`).
//!
//! ASCII (U+0000–U+007F) passes through unchanged. Characters outside CP437
//! are rejected: a receipt with silently substituted characters is worse
//! than no receipt.

use crate::error::EncodeError;

/// Upper half of CP437, indexed by `byte - 0x80`.
const UPPER_HALF: [char; 128] = [
    // 0x80
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å',
    // 0x90
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ',
    // 0xA0
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»',
    // 0xB0
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐',
    // 0xC0
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧',
    // 0xD0
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀',
    // 0xE0
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩',
    // 0xF0
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{00A0}',
];

/// Map a Unicode character to its CP437 byte, if it has one.
pub fn byte_for(ch: char) -> Option<u8> {
    if ch.is_ascii() {
        return Some(ch as u8);
    }
    UPPER_HALF
        .iter()
        .position(|&c| c == ch)
        .map(|pos| 0x80 + pos as u8)
}

/// Encode a Unicode string as CP437 bytes.
///
/// Fails on the first character with no CP437 representation.
pub fn encode(s: &str) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(s.len());
    for (index, ch) in s.chars().enumerate() {
        match byte_for(ch) {
            Some(byte) => out.push(byte),
            None => {
                return Err(EncodeError::Unmappable {
                    ch,
                    index,
                    encoding: "cp437",
                });
            }
        }
    }
    Ok(out)
}
