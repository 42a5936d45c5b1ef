//! # Text Encoding and Styling Commands
//!
//! Host strings are Unicode; printers speak byte tables. This module turns a
//! `&str` into the byte encoding the printer has been told to expect, and
//! provides the ESC/POS styling commands that usually surround text.
//!
//! ## Encodings
//!
//! | Encoding | Bytes/char | Typical printer setting |
//! |----------|------------|-------------------------|
//! | `ascii`  | 1 | any |
//! | `cp437`  | 1 | `ESC t 0` (factory default) |
//! | `gbk`    | 1–2 | Chinese firmware, Kanji mode |
//! | `utf-8`  | 1–4 | firmware with UTF-8 support |
//!
//! Encoding fails closed: a character the table cannot represent is an
//! error, never a replacement byte.
//!
//! ## Styling
//!
//! | Style | Command |
//! |-------|---------|
//! | Alignment | ESC a n |
//! | Bold | ESC E n |
//! | Underline | ESC - n |
//! | Character size | GS ! n |
//! | Code table | ESC t n |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::commands::{ESC, GS};
use super::cp437;
use crate::error::EncodeError;

// ============================================================================
// TEXT ENCODING
// ============================================================================

/// Byte encoding used for text and QR content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    /// 7-bit ASCII only
    Ascii,
    /// IBM Code Page 437
    #[default]
    Cp437,
    /// GBK double-byte table for Simplified Chinese
    Gbk,
    /// Raw UTF-8, for firmware that decodes it
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
}

impl TextEncoding {
    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::Cp437 => "cp437",
            Self::Gbk => "gbk",
            Self::Utf8 => "utf-8",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextEncoding {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            "cp437" | "pc437" | "ibm437" => Ok(Self::Cp437),
            "gbk" | "gb2312" | "cp936" => Ok(Self::Gbk),
            "utf-8" | "utf8" => Ok(Self::Utf8),
            other => Err(EncodeError::UnsupportedEncoding(other.to_string())),
        }
    }
}

/// # Encode Text
///
/// Converts `content` to the byte encoding the printer expects.
///
/// ## Example
///
/// ```
/// use bleprint::protocol::text::{self, TextEncoding};
///
/// assert_eq!(text::encode("Hi", TextEncoding::Ascii).unwrap(), b"Hi".to_vec());
/// assert!(text::encode("é", TextEncoding::Ascii).is_err());
/// ```
pub fn encode(content: &str, encoding: TextEncoding) -> Result<Vec<u8>, EncodeError> {
    match encoding {
        TextEncoding::Ascii => encode_ascii(content),
        TextEncoding::Cp437 => cp437::encode(content),
        TextEncoding::Gbk => encode_gbk(content),
        TextEncoding::Utf8 => Ok(content.as_bytes().to_vec()),
    }
}

fn encode_ascii(content: &str) -> Result<Vec<u8>, EncodeError> {
    match content.chars().enumerate().find(|(_, ch)| !ch.is_ascii()) {
        Some((index, ch)) => Err(EncodeError::Unmappable {
            ch,
            index,
            encoding: "ascii",
        }),
        None => Ok(content.as_bytes().to_vec()),
    }
}

fn encode_gbk(content: &str) -> Result<Vec<u8>, EncodeError> {
    let (bytes, _, had_errors) = encoding_rs::GBK.encode(content);
    if !had_errors {
        return Ok(bytes.into_owned());
    }

    // Locate the offending character for the error report.
    let mut buf = [0u8; 4];
    for (index, ch) in content.chars().enumerate() {
        let (_, _, bad) = encoding_rs::GBK.encode(ch.encode_utf8(&mut buf));
        if bad {
            return Err(EncodeError::Unmappable {
                ch,
                index,
                encoding: "gbk",
            });
        }
    }
    Err(EncodeError::UnsupportedEncoding("gbk".to_string()))
}

// ============================================================================
// TEXT ALIGNMENT
// ============================================================================

/// Text alignment options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left = 0,
    Center = 1,
    Right = 2,
}

/// # Set Justification (ESC a n)
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | ESC a n  |
/// | Hex     | 1B 61 n  |
///
/// Takes effect at the start of the next line.
///
/// ```
/// use bleprint::protocol::text::{align, Alignment};
///
/// assert_eq!(align(Alignment::Center), vec![0x1B, 0x61, 0x01]);
/// ```
pub fn align(alignment: Alignment) -> Vec<u8> {
    vec![ESC, b'a', alignment as u8]
}

// ============================================================================
// EMPHASIS
// ============================================================================

/// Bold on/off (ESC E n)
pub fn bold(enabled: bool) -> Vec<u8> {
    vec![ESC, b'E', u8::from(enabled)]
}

/// Underline thickness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Underline {
    #[default]
    Off = 0,
    Thin = 1,
    Thick = 2,
}

/// Underline mode (ESC - n)
pub fn underline(mode: Underline) -> Vec<u8> {
    vec![ESC, b'-', mode as u8]
}

// ============================================================================
// CHARACTER SIZE
// ============================================================================

/// # Select Character Size (GS ! n)
///
/// Width and height multipliers are clamped to 1–8. The high nibble of `n`
/// carries the width, the low nibble the height.
///
/// ```
/// use bleprint::protocol::text::size;
///
/// assert_eq!(size(1, 1), vec![0x1D, 0x21, 0x00]);
/// assert_eq!(size(2, 2), vec![0x1D, 0x21, 0x11]);
/// ```
pub fn size(width: u8, height: u8) -> Vec<u8> {
    let w = width.clamp(1, 8) - 1;
    let h = height.clamp(1, 8) - 1;
    vec![GS, b'!', (w << 4) | h]
}

/// # Select Character Code Table (ESC t n)
///
/// `n = 0` selects PC437 on virtually every ESC/POS printer.
pub fn select_code_table(n: u8) -> Vec<u8> {
    vec![ESC, b't', n]
}
