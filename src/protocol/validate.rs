//! # Symbol Content Validation
//!
//! Every barcode and QR descriptor is checked here before any command byte
//! is emitted. Problems come back as a [`ValidationReport`], a plain value
//! listing each issue, so callers can point at the offending field instead
//! of catching an error.
//!
//! ## Rules
//!
//! | Format | Characters | Length | Extra |
//! |--------|------------|--------|-------|
//! | EAN-13 | digits | 12–13 | 13th digit must match the check digit |
//! | EAN-8 | digits | 7–8 | 8th digit must match the check digit |
//! | UPC-A | digits | 11–12 | 12th digit must match the check digit |
//! | CODE 39 | `0-9 A-Z space - . $ / + %` | 1–255 | |
//! | CODE 128 | ASCII 0–127 | 1–255 | encoded symbol must fit 255 bytes |
//! | ITF | digits | 2–254 | even count |
//! | CODABAR | `A-D` + `0-9 - $ : / . +` + `A-D` | 3–255 | start/stop case-insensitive |
//! | QR | any | 1–7089 bytes | |
//!
//! ## Check Digits
//!
//! EAN-13, EAN-8 and UPC-A use a modulo-10 check digit with weights that
//! alternate between ×1 and ×3, counted from the leftmost data digit. EAN-13
//! and EAN-8 start at ×1; UPC-A starts at ×3.
//!
//! ```
//! use bleprint::protocol::validate::{self, BarcodeFormat};
//!
//! assert!(validate::validate(BarcodeFormat::Ean13, "4006381333931").is_valid());
//! assert!(!validate::validate(BarcodeFormat::Ean13, "4006381333932").is_valid());
//! assert!(validate::validate(BarcodeFormat::Ean13, "400638133393").is_valid());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::barcode::code128_payload;

/// Largest payload a QR symbol can hold (numeric mode, version 40, level L).
pub const QR_MAX_BYTES: usize = 7089;

/// Largest data length the one-byte barcode length field can carry.
pub const LINEAR_MAX_BYTES: usize = 255;

/// Symbologies the codec can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BarcodeFormat {
    Code128,
    Code39,
    Ean13,
    Ean8,
    UpcA,
    Itf,
    Codabar,
    Qr,
}

impl BarcodeFormat {
    /// All formats, 1-D first.
    pub const ALL: [Self; 8] = [
        Self::Code128,
        Self::Code39,
        Self::Ean13,
        Self::Ean8,
        Self::UpcA,
        Self::Itf,
        Self::Codabar,
        Self::Qr,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Code128 => "CODE128",
            Self::Code39 => "CODE39",
            Self::Ean13 => "EAN13",
            Self::Ean8 => "EAN8",
            Self::UpcA => "UPCA",
            Self::Itf => "ITF",
            Self::Codabar => "CODABAR",
            Self::Qr => "QR",
        }
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BarcodeFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|f| f.name() == key || (key == "QRCODE" && *f == Self::Qr))
            .ok_or_else(|| format!("unknown barcode format '{s}'"))
    }
}

/// One problem found in symbol content.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    #[error("content is empty")]
    Empty,

    #[error("length must be {min}-{max}, got {actual}")]
    Length { min: usize, max: usize, actual: usize },

    #[error("character {ch:?} at index {index} is not allowed")]
    InvalidCharacter { ch: char, index: usize },

    #[error("digit count must be even, got {actual}")]
    OddLength { actual: usize },

    #[error("check digit should be {expected}, got {found}")]
    Checksum { expected: u8, found: u8 },

    #[error("must start and end with A, B, C or D")]
    MissingStartStop,

    #[error("encoded symbol needs {actual} bytes, limit is {max}")]
    Capacity { max: usize, actual: usize },

    #[error("format has no 1-D barcode command")]
    NotLinear,
}

/// Result of validating one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub format: BarcodeFormat,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn new(format: BarcodeFormat) -> Self {
        Self {
            format,
            issues: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// `Ok(())` when valid, otherwise the report itself.
    pub fn into_result(self) -> Result<(), ValidationReport> {
        if self.is_valid() { Ok(()) } else { Err(self) }
    }

    fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format)?;
        if self.issues.is_empty() {
            return f.write_str(": ok");
        }
        for (i, issue) in self.issues.iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { "; " })?;
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

// ============================================================================
// CHECK DIGITS
// ============================================================================

/// Modulo-10 check digit over `data` (ASCII digits, check digit excluded).
///
/// Index 0 is weighted `first_weight` (1 or 3) and the weights alternate
/// from there.
pub fn mod10_check_digit(data: &[u8], first_weight: u32) -> u8 {
    let other_weight = if first_weight == 1 { 3 } else { 1 };
    let sum: u32 = data
        .iter()
        .enumerate()
        .map(|(i, &d)| {
            let value = u32::from(d - b'0');
            if i % 2 == 0 { value * first_weight } else { value * other_weight }
        })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Validate `content` for `format`.
pub fn validate(format: BarcodeFormat, content: &str) -> ValidationReport {
    let mut report = ValidationReport::new(format);
    if content.is_empty() {
        report.push(ValidationIssue::Empty);
        return report;
    }

    match format {
        BarcodeFormat::Ean13 => check_retail(&mut report, content, 12, 1),
        BarcodeFormat::Ean8 => check_retail(&mut report, content, 7, 1),
        BarcodeFormat::UpcA => check_retail(&mut report, content, 11, 3),
        BarcodeFormat::Code39 => {
            check_chars(&mut report, content, is_code39_char);
            check_len(&mut report, content, 1, LINEAR_MAX_BYTES);
        }
        BarcodeFormat::Code128 => {
            check_chars(&mut report, content, |c| c.is_ascii());
            check_len(&mut report, content, 1, LINEAR_MAX_BYTES);
            if report.is_valid() {
                let actual = code128_payload(content).len();
                if actual > LINEAR_MAX_BYTES {
                    report.push(ValidationIssue::Capacity {
                        max: LINEAR_MAX_BYTES,
                        actual,
                    });
                }
            }
        }
        BarcodeFormat::Itf => {
            check_chars(&mut report, content, |c| c.is_ascii_digit());
            check_len(&mut report, content, 2, 254);
            let actual = content.chars().count();
            if actual % 2 != 0 {
                report.push(ValidationIssue::OddLength { actual });
            }
        }
        BarcodeFormat::Codabar => check_codabar(&mut report, content),
        BarcodeFormat::Qr => {
            if content.len() > QR_MAX_BYTES {
                report.push(ValidationIssue::Capacity {
                    max: QR_MAX_BYTES,
                    actual: content.len(),
                });
            }
        }
    }

    report
}

fn check_len(report: &mut ValidationReport, content: &str, min: usize, max: usize) {
    let actual = content.chars().count();
    if actual < min || actual > max {
        report.push(ValidationIssue::Length { min, max, actual });
    }
}

fn check_chars(report: &mut ValidationReport, content: &str, allowed: impl Fn(char) -> bool) {
    if let Some((index, ch)) = content.chars().enumerate().find(|&(_, c)| !allowed(c)) {
        report.push(ValidationIssue::InvalidCharacter { ch, index });
    }
}

/// Digits-only with an optional trailing check digit.
fn check_retail(report: &mut ValidationReport, content: &str, data_len: usize, first_weight: u32) {
    check_chars(report, content, |c| c.is_ascii_digit());
    check_len(report, content, data_len, data_len + 1);
    if !report.is_valid() || content.len() == data_len {
        return;
    }

    let bytes = content.as_bytes();
    let expected = mod10_check_digit(&bytes[..data_len], first_weight);
    let found = bytes[data_len] - b'0';
    if expected != found {
        report.push(ValidationIssue::Checksum { expected, found });
    }
}

fn is_code39_char(c: char) -> bool {
    c.is_ascii_digit() || c.is_ascii_uppercase() || matches!(c, ' ' | '-' | '.' | '$' | '/' | '+' | '%')
}

fn is_codabar_guard(c: char) -> bool {
    matches!(c.to_ascii_uppercase(), 'A' | 'B' | 'C' | 'D')
}

fn check_codabar(report: &mut ValidationReport, content: &str) {
    check_len(report, content, 3, LINEAR_MAX_BYTES);

    let chars: Vec<char> = content.chars().collect();
    let (first, last) = (chars[0], chars[chars.len() - 1]);
    if chars.len() < 2 || !is_codabar_guard(first) || !is_codabar_guard(last) {
        report.push(ValidationIssue::MissingStartStop);
        return;
    }

    let body = &chars[1..chars.len() - 1];
    if let Some((i, &ch)) = body
        .iter()
        .enumerate()
        .find(|&(_, &c)| !(c.is_ascii_digit() || matches!(c, '-' | '$' | ':' | '/' | '.' | '+')))
    {
        report.push(ValidationIssue::InvalidCharacter { ch, index: i + 1 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issues(format: BarcodeFormat, content: &str) -> Vec<ValidationIssue> {
        validate(format, content).issues
    }

    #[test]
    fn test_check_digits() {
        assert_eq!(mod10_check_digit(b"400638133393", 1), 1); // EAN-13
        assert_eq!(mod10_check_digit(b"590123412345", 1), 7); // EAN-13
        assert_eq!(mod10_check_digit(b"03600029145", 3), 2); // UPC-A
        assert_eq!(mod10_check_digit(b"9638507", 1), 4); // EAN-8
        assert_eq!(mod10_check_digit(b"7351353", 1), 5); // EAN-8
    }

    #[test]
    fn test_ean13_left_weights_start_at_one() {
        let data = b"123456789012";
        let sum: u32 = data
            .iter()
            .enumerate()
            .map(|(i, &d)| u32::from(d - b'0') * if i % 2 == 0 { 1 } else { 3 })
            .sum();
        assert_eq!(u32::from(mod10_check_digit(data, 1)), (10 - sum % 10) % 10);
    }

    #[test]
    fn test_upca_left_weights_start_at_three() {
        let data = b"01234567890";
        let sum: u32 = data
            .iter()
            .enumerate()
            .map(|(i, &d)| u32::from(d - b'0') * if i % 2 == 0 { 3 } else { 1 })
            .sum();
        assert_eq!(u32::from(mod10_check_digit(data, 3)), (10 - sum % 10) % 10);
    }

    #[test]
    fn test_ean13() {
        assert!(issues(BarcodeFormat::Ean13, "5901234123457").is_empty());
        assert!(issues(BarcodeFormat::Ean13, "590123412345").is_empty());
        assert_eq!(
            issues(BarcodeFormat::Ean13, "5901234123458"),
            vec![ValidationIssue::Checksum {
                expected: 7,
                found: 8
            }]
        );
        assert_eq!(
            issues(BarcodeFormat::Ean13, "12345"),
            vec![ValidationIssue::Length {
                min: 12,
                max: 13,
                actual: 5
            }]
        );
        assert_eq!(
            issues(BarcodeFormat::Ean13, "59012341234A"),
            vec![ValidationIssue::InvalidCharacter { ch: 'A', index: 11 }]
        );
    }

    #[test]
    fn test_ean8_and_upca() {
        assert!(validate(BarcodeFormat::Ean8, "96385074").is_valid());
        assert!(validate(BarcodeFormat::Ean8, "9638507").is_valid());
        assert!(!validate(BarcodeFormat::Ean8, "96385075").is_valid());
        // index 0 weighs x1, unlike UPC-A
        assert!(validate(BarcodeFormat::Ean8, "73513535").is_valid());
        assert_eq!(
            issues(BarcodeFormat::Ean8, "73513537"),
            vec![ValidationIssue::Checksum {
                expected: 5,
                found: 7
            }]
        );
        assert!(validate(BarcodeFormat::UpcA, "036000291452").is_valid());
        assert!(validate(BarcodeFormat::UpcA, "03600029145").is_valid());
        assert!(!validate(BarcodeFormat::UpcA, "036000291453").is_valid());
        assert!(!validate(BarcodeFormat::UpcA, "0360002914").is_valid());
    }

    #[test]
    fn test_missing_check_digit_always_passes() {
        for data in ["000000000000", "999999999999", "123456789012"] {
            assert!(validate(BarcodeFormat::Ean13, data).is_valid(), "{data}");
        }
    }

    #[test]
    fn test_code39() {
        assert!(validate(BarcodeFormat::Code39, "HELLO-123 $/+%.").is_valid());
        assert_eq!(
            issues(BarcodeFormat::Code39, "Hello"),
            vec![ValidationIssue::InvalidCharacter { ch: 'e', index: 1 }]
        );
        let long = "A".repeat(256);
        assert!(!validate(BarcodeFormat::Code39, &long).is_valid());
    }

    #[test]
    fn test_code128() {
        assert!(validate(BarcodeFormat::Code128, "Hello World 123").is_valid());
        assert!(!validate(BarcodeFormat::Code128, "café").is_valid());
        // 255 lowercase letters need a two-byte selector: too big
        let long = "a".repeat(255);
        assert_eq!(
            issues(BarcodeFormat::Code128, &long),
            vec![ValidationIssue::Capacity {
                max: 255,
                actual: 257
            }]
        );
        // 255 digits pack into pairs and fit
        assert!(validate(BarcodeFormat::Code128, &"7".repeat(255)).is_valid());
    }

    #[test]
    fn test_itf() {
        assert!(validate(BarcodeFormat::Itf, "12345678").is_valid());
        assert_eq!(
            issues(BarcodeFormat::Itf, "123"),
            vec![ValidationIssue::OddLength { actual: 3 }]
        );
        assert!(!validate(BarcodeFormat::Itf, "12AB").is_valid());
        assert!(!validate(BarcodeFormat::Itf, &"1".repeat(256)).is_valid());
    }

    #[test]
    fn test_codabar() {
        assert!(validate(BarcodeFormat::Codabar, "A40156B").is_valid());
        assert!(validate(BarcodeFormat::Codabar, "c12-34$:/.+d").is_valid());
        assert_eq!(
            issues(BarcodeFormat::Codabar, "1234"),
            vec![ValidationIssue::MissingStartStop]
        );
        assert_eq!(
            issues(BarcodeFormat::Codabar, "A12X4B"),
            vec![ValidationIssue::InvalidCharacter { ch: 'X', index: 3 }]
        );
        assert!(!validate(BarcodeFormat::Codabar, "AB").is_valid());
    }

    #[test]
    fn test_qr() {
        assert!(validate(BarcodeFormat::Qr, "https://example.com").is_valid());
        assert_eq!(issues(BarcodeFormat::Qr, ""), vec![ValidationIssue::Empty]);
        assert!(!validate(BarcodeFormat::Qr, &"x".repeat(QR_MAX_BYTES + 1)).is_valid());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("ean-13".parse::<BarcodeFormat>().unwrap(), BarcodeFormat::Ean13);
        assert_eq!("upc_a".parse::<BarcodeFormat>().unwrap(), BarcodeFormat::UpcA);
        assert_eq!("qrcode".parse::<BarcodeFormat>().unwrap(), BarcodeFormat::Qr);
        assert!("pdf417".parse::<BarcodeFormat>().is_err());
    }

    #[test]
    fn test_report_display_and_json() {
        let report = validate(BarcodeFormat::Itf, "123");
        assert_eq!(report.to_string(), "ITF: digit count must be even, got 3");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["format"], "ITF");
        assert_eq!(json["issues"][0]["kind"], "odd_length");
    }
}
