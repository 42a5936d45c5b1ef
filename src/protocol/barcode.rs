//! # ESC/POS Barcode Commands
//!
//! This module implements 1-D barcode and QR code command sequences.
//! Content is always validated first (see [`validate`](super::validate));
//! a descriptor that fails validation never produces bytes.
//!
//! ## 1D Barcode Usage
//!
//! ```
//! use bleprint::protocol::barcode::{self, LinearOptions};
//! use bleprint::protocol::validate::BarcodeFormat;
//!
//! let buffers = barcode::linear("HELLO-123", &LinearOptions::new(BarcodeFormat::Code39)).unwrap();
//! // height, module width, text position, symbol
//! assert_eq!(buffers.len(), 4);
//! ```
//!
//! ## QR Code Usage
//!
//! ```
//! use bleprint::protocol::barcode::{self, QrOptions};
//! use bleprint::protocol::text::TextEncoding;
//!
//! let buffers = barcode::qr("https://example.com", &QrOptions::default(), TextEncoding::Utf8).unwrap();
//! // model, module size, error correction, store, print
//! assert_eq!(buffers.len(), 5);
//! ```

use serde::{Deserialize, Serialize};

use super::commands::{GS, u16_le};
use super::text::{self, TextEncoding};
use super::validate::{self, BarcodeFormat, ValidationIssue, ValidationReport};
use crate::error::EncodeError;

// ============================================================================
// 1D BARCODES (GS k m n data)
// ============================================================================

/// Human-readable text position (GS H n)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    None = 0,
    Above = 1,
    #[default]
    Below = 2,
    Both = 3,
}

/// Rendering options for a 1-D symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearOptions {
    pub format: BarcodeFormat,
    /// Bar height in dots, clamped to 1–255
    pub height: u16,
    /// Narrow module width in dots, clamped to 2–6
    pub module_width: u8,
    pub text_position: TextPosition,
}

impl LinearOptions {
    pub fn new(format: BarcodeFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }
}

impl Default for LinearOptions {
    fn default() -> Self {
        Self {
            format: BarcodeFormat::Code128,
            height: 80,
            module_width: 3,
            text_position: TextPosition::Below,
        }
    }
}

/// `GS k` function B symbol type code for each 1-D format.
///
/// | Format | m |
/// |--------|---|
/// | UPC-A | 65 |
/// | EAN-13 | 67 |
/// | EAN-8 | 68 |
/// | CODE 39 | 69 |
/// | ITF | 70 |
/// | CODABAR | 71 |
/// | CODE 128 | 73 |
pub fn type_code(format: BarcodeFormat) -> Option<u8> {
    match format {
        BarcodeFormat::UpcA => Some(65),
        BarcodeFormat::Ean13 => Some(67),
        BarcodeFormat::Ean8 => Some(68),
        BarcodeFormat::Code39 => Some(69),
        BarcodeFormat::Itf => Some(70),
        BarcodeFormat::Codabar => Some(71),
        BarcodeFormat::Code128 => Some(73),
        BarcodeFormat::Qr => None,
    }
}

/// Bar height (GS h n), clamped to 1–255.
pub fn set_height(dots: u16) -> Vec<u8> {
    vec![GS, b'h', dots.clamp(1, 255) as u8]
}

/// Module width (GS w n), clamped to 2–6.
pub fn set_module_width(dots: u8) -> Vec<u8> {
    vec![GS, b'w', dots.clamp(2, 6)]
}

/// Human-readable text position (GS H n).
pub fn set_text_position(position: TextPosition) -> Vec<u8> {
    vec![GS, b'H', position as u8]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeSet {
    A,
    B,
}

impl CodeSet {
    fn selector(self) -> &'static [u8] {
        match self {
            Self::A => b"{A",
            Self::B => b"{B",
        }
    }
}

/// # Code 128 Data With Code-Set Selectors
///
/// - Numeric content of 4+ digits uses code set C: `{C` followed by one byte
///   per digit pair. An odd trailing digit is sent after a `{B` switch.
/// - Everything else uses code set B, switching to code set A around control
///   characters. A literal `{` is escaped as `{{`.
///
/// ```
/// use bleprint::protocol::barcode::code128_payload;
///
/// assert_eq!(code128_payload("1234"), vec![b'{', b'C', 12, 34]);
/// assert_eq!(code128_payload("123"), b"{B123".to_vec());
/// assert_eq!(code128_payload("AB"), b"{BAB".to_vec());
/// ```
pub fn code128_payload(content: &str) -> Vec<u8> {
    let bytes = content.as_bytes();

    if bytes.len() >= 4 && bytes.iter().all(u8::is_ascii_digit) {
        let pairs = bytes.len() / 2;
        let mut out = Vec::with_capacity(2 + pairs + 3);
        out.extend_from_slice(b"{C");
        for pair in bytes[..pairs * 2].chunks_exact(2) {
            out.push((pair[0] - b'0') * 10 + (pair[1] - b'0'));
        }
        if bytes.len() % 2 == 1 {
            out.extend_from_slice(b"{B");
            out.push(bytes[bytes.len() - 1]);
        }
        return out;
    }

    let mut out = Vec::with_capacity(bytes.len() + 2);
    let mut current: Option<CodeSet> = None;
    for &b in bytes {
        let needed = match b {
            0..=31 => Some(CodeSet::A),
            96..=127 => Some(CodeSet::B),
            _ => None,
        };
        let set = match (needed, current) {
            (Some(set), _) => set,
            (None, Some(set)) => set,
            (None, None) => CodeSet::B,
        };
        if current != Some(set) {
            out.extend_from_slice(set.selector());
            current = Some(set);
        }
        if b == b'{' {
            out.push(b'{');
        }
        out.push(b);
    }
    out
}

/// # Print a 1-D Barcode
///
/// Returns the setup buffers (height, module width, text position) followed
/// by one `GS k m n data` symbol buffer.
///
/// ## Errors
///
/// A [`ValidationReport`] when the content is not valid for the format (or
/// when the format is QR, which has its own command set).
pub fn linear(content: &str, options: &LinearOptions) -> Result<Vec<Vec<u8>>, ValidationReport> {
    let Some(m) = type_code(options.format) else {
        return Err(ValidationReport {
            format: options.format,
            issues: vec![ValidationIssue::NotLinear],
        });
    };
    validate::validate(options.format, content).into_result()?;

    let data = match options.format {
        BarcodeFormat::Code128 => code128_payload(content),
        BarcodeFormat::Codabar => content.to_ascii_uppercase().into_bytes(),
        _ => content.as_bytes().to_vec(),
    };

    let mut symbol = Vec::with_capacity(4 + data.len());
    symbol.extend_from_slice(&[GS, b'k', m, data.len() as u8]);
    symbol.extend_from_slice(&data);

    Ok(vec![
        set_height(options.height),
        set_module_width(options.module_width),
        set_text_position(options.text_position),
        symbol,
    ])
}

// ============================================================================
// QR CODE (GS ( k)
// ============================================================================

/// QR Code model selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrModel {
    Model1 = 49,
    #[default]
    Model2 = 50,
    Micro = 51,
}

/// QR Code error correction level
///
/// | Level | Recovery | n |
/// |-------|----------|---|
/// | L | ~7% | 48 |
/// | M | ~15% | 49 |
/// | Q | ~25% | 50 |
/// | H | ~30% | 51 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QrErrorLevel {
    L = 48,
    #[default]
    M = 49,
    Q = 50,
    H = 51,
}

/// Rendering options for a QR symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrOptions {
    pub model: QrModel,
    /// Module size in dots, clamped to 1–16
    pub size: u8,
    pub error_correction: QrErrorLevel,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            model: QrModel::Model2,
            size: 6,
            error_correction: QrErrorLevel::M,
        }
    }
}

/// Prefix shared by every QR function: `GS ( k`
const QR_PREFIX: [u8; 3] = [GS, b'(', b'k'];

/// Symbol type `cn = 49` followed by the function code.
fn qr_function(fn_code: u8, params: &[u8]) -> Vec<u8> {
    let [pl, ph] = u16_le((params.len() + 2) as u16);
    let mut cmd = Vec::with_capacity(7 + params.len());
    cmd.extend_from_slice(&QR_PREFIX);
    cmd.extend_from_slice(&[pl, ph, 49, fn_code]);
    cmd.extend_from_slice(params);
    cmd
}

/// Select model (function 165): `GS ( k 04 00 31 41 n 00`
pub fn qr_set_model(model: QrModel) -> Vec<u8> {
    qr_function(b'A', &[model as u8, 0])
}

/// Module size (function 167): `GS ( k 03 00 31 43 n`, clamped to 1–16
pub fn qr_set_size(size: u8) -> Vec<u8> {
    qr_function(b'C', &[size.clamp(1, 16)])
}

/// Error correction (function 169): `GS ( k 03 00 31 45 n`
pub fn qr_set_error_correction(level: QrErrorLevel) -> Vec<u8> {
    qr_function(b'E', &[level as u8])
}

/// # Store Data (function 180)
///
/// `GS ( k pL pH 31 50 30 data`, where `pL pH` = data length + 3.
///
/// ```
/// use bleprint::protocol::barcode::qr_store;
///
/// let cmd = qr_store(b"abc");
/// assert_eq!(cmd, vec![0x1D, 0x28, 0x6B, 6, 0, 0x31, 0x50, 0x30, b'a', b'b', b'c']);
/// ```
pub fn qr_store(data: &[u8]) -> Vec<u8> {
    let mut params = Vec::with_capacity(1 + data.len());
    params.push(b'0');
    params.extend_from_slice(data);
    qr_function(b'P', &params)
}

/// Print the stored symbol (function 181): `GS ( k 03 00 31 51 30`
pub fn qr_print() -> Vec<u8> {
    qr_function(b'Q', b"0")
}

/// # Print a QR Code
///
/// Returns five buffers in fixed order: model, module size, error
/// correction, store data, print.
///
/// ## Errors
///
/// - [`EncodeError::Invalid`] when the content is empty or too long
/// - [`EncodeError::Unmappable`] when `encoding` cannot represent the content
pub fn qr(content: &str, options: &QrOptions, encoding: TextEncoding) -> Result<Vec<Vec<u8>>, EncodeError> {
    validate::validate(BarcodeFormat::Qr, content)
        .into_result()
        .map_err(EncodeError::Invalid)?;

    let data = text::encode(content, encoding)?;
    if data.len() > validate::QR_MAX_BYTES {
        return Err(EncodeError::Invalid(ValidationReport {
            format: BarcodeFormat::Qr,
            issues: vec![ValidationIssue::Capacity {
                max: validate::QR_MAX_BYTES,
                actual: data.len(),
            }],
        }));
    }

    Ok(vec![
        qr_set_model(options.model),
        qr_set_size(options.size),
        qr_set_error_correction(options.error_correction),
        qr_store(&data),
        qr_print(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_type_codes() {
        assert_eq!(type_code(BarcodeFormat::UpcA), Some(65));
        assert_eq!(type_code(BarcodeFormat::Code128), Some(73));
        assert_eq!(type_code(BarcodeFormat::Qr), None);
    }

    #[test]
    fn test_setup_clamping() {
        assert_eq!(set_height(0), vec![0x1D, 0x68, 1]);
        assert_eq!(set_height(1000), vec![0x1D, 0x68, 255]);
        assert_eq!(set_module_width(1), vec![0x1D, 0x77, 2]);
        assert_eq!(set_module_width(9), vec![0x1D, 0x77, 6]);
        assert_eq!(set_text_position(TextPosition::Both), vec![0x1D, 0x48, 3]);
    }

    #[test]
    fn test_ean13_symbol() {
        let buffers = linear("5901234123457", &LinearOptions::new(BarcodeFormat::Ean13)).unwrap();
        let mut expected = vec![0x1D, 0x6B, 67, 13];
        expected.extend_from_slice(b"5901234123457");
        assert_eq!(buffers[3], expected);
        assert_eq!(buffers[0], vec![0x1D, 0x68, 80]);
    }

    #[test]
    fn test_invalid_content_emits_nothing() {
        let report = linear("5901234123458", &LinearOptions::new(BarcodeFormat::Ean13)).unwrap_err();
        assert_eq!(report.format, BarcodeFormat::Ean13);
        assert!(matches!(report.issues[0], ValidationIssue::Checksum { .. }));
    }

    #[test]
    fn test_linear_rejects_qr_format() {
        assert!(linear("abc", &LinearOptions::new(BarcodeFormat::Qr)).is_err());
    }

    #[test]
    fn test_code128_selectors() {
        assert_eq!(code128_payload("12345"), vec![b'{', b'C', 12, 34, b'{', b'B', b'5']);
        assert_eq!(code128_payload("Ab{"), b"{BAb{{".to_vec());
        assert_eq!(code128_payload("A\tb"), b"{BA{A\t{Bb".to_vec());
        assert_eq!(code128_payload("\rX"), b"{A\rX".to_vec());
    }

    #[test]
    fn test_code128_symbol_length_counts_selector() {
        let buffers = linear("ABC", &LinearOptions::new(BarcodeFormat::Code128)).unwrap();
        assert_eq!(buffers[3], vec![0x1D, 0x6B, 73, 5, b'{', b'B', b'A', b'B', b'C']);
    }

    #[test]
    fn test_codabar_uppercases_guards() {
        let buffers = linear("a123b", &LinearOptions::new(BarcodeFormat::Codabar)).unwrap();
        assert_eq!(&buffers[3][4..], b"A123B");
    }

    #[test]
    fn test_qr_sequence() {
        let options = QrOptions {
            model: QrModel::Model2,
            size: 40,
            error_correction: QrErrorLevel::H,
        };
        let buffers = qr("Hi", &options, TextEncoding::Ascii).unwrap();
        assert_eq!(
            buffers,
            vec![
                vec![0x1D, 0x28, 0x6B, 4, 0, 0x31, 0x41, 50, 0],
                vec![0x1D, 0x28, 0x6B, 3, 0, 0x31, 0x43, 16],
                vec![0x1D, 0x28, 0x6B, 3, 0, 0x31, 0x45, 51],
                vec![0x1D, 0x28, 0x6B, 5, 0, 0x31, 0x50, 0x30, b'H', b'i'],
                vec![0x1D, 0x28, 0x6B, 3, 0, 0x31, 0x51, 0x30],
            ]
        );
    }

    #[test]
    fn test_qr_store_length_high_byte() {
        let data = vec![b'x'; 300];
        let cmd = qr_store(&data);
        // 303 = 0x012F
        assert_eq!(&cmd[3..5], &[0x2F, 0x01]);
        assert_eq!(cmd.len(), 8 + 300);
    }

    #[test]
    fn test_qr_error_levels() {
        assert_eq!(qr_set_error_correction(QrErrorLevel::L)[7], 48);
        assert_eq!(qr_set_error_correction(QrErrorLevel::M)[7], 49);
        assert_eq!(qr_set_error_correction(QrErrorLevel::Q)[7], 50);
        assert_eq!(qr_set_error_correction(QrErrorLevel::H)[7], 51);
    }

    #[test]
    fn test_qr_uses_text_encoding() {
        let buffers = qr("中", &QrOptions::default(), TextEncoding::Gbk).unwrap();
        assert_eq!(&buffers[3][8..], &[0xD6, 0xD0]);
        assert!(matches!(
            qr("中", &QrOptions::default(), TextEncoding::Ascii),
            Err(EncodeError::Unmappable { .. })
        ));
    }

    #[test]
    fn test_qr_rejects_empty() {
        assert!(matches!(
            qr("", &QrOptions::default(), TextEncoding::Utf8),
            Err(EncodeError::Invalid(_))
        ));
    }
}
