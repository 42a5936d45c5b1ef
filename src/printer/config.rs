//! # Printer Configuration
//!
//! Paper profiles for common ESC/POS thermal printers.
//!
//! | Paper | Print width | Width (dots) | Resolution |
//! |-------|-------------|--------------|------------|
//! | 58mm | 48mm | 384 | 203 DPI |
//! | 80mm | 72mm | 576 | 203 DPI |
//!
//! ```
//! use bleprint::printer::PrinterConfig;
//!
//! let config = PrinterConfig::MM58;
//! assert_eq!(config.width_bytes, 48);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Physical paper roll width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaperWidth {
    #[default]
    #[serde(rename = "58mm")]
    Mm58,
    #[serde(rename = "80mm")]
    Mm80,
}

impl PaperWidth {
    pub fn config(self) -> PrinterConfig {
        match self {
            Self::Mm58 => PrinterConfig::MM58,
            Self::Mm80 => PrinterConfig::MM80,
        }
    }
}

impl fmt::Display for PaperWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mm58 => "58mm",
            Self::Mm80 => "80mm",
        })
    }
}

impl FromStr for PaperWidth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().trim_end_matches("mm") {
            "58" => Ok(Self::Mm58),
            "80" => Ok(Self::Mm80),
            _ => Err(format!("Unknown paper width '{}'. Use '58mm' or '80mm'", s)),
        }
    }
}

/// # Printer Configuration
///
/// Hardware characteristics of a thermal printer.
///
/// ```text
/// dots_per_mm = dpi / 25.4
///
/// 80mm paper at 203 DPI:
///   dots_per_mm = 203 / 25.4 ≈ 8
///   width_mm = 576 / 8 = 72mm
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrinterConfig {
    pub name: &'static str,

    /// Maximum print width in dots (pixels)
    pub width_dots: u16,

    /// Print width in bytes (width_dots / 8)
    pub width_bytes: u16,

    /// Resolution in dots per inch
    pub dpi: u16,
}

impl PrinterConfig {
    /// 58mm roll, 48mm printable.
    pub const MM58: Self = Self {
        name: "58mm thermal",
        width_dots: 384,
        width_bytes: 48,
        dpi: 203,
    };

    /// 80mm roll, 72mm printable.
    ///
    /// ```text
    /// ├── 4mm ──┼────── 72mm printable ──────┼── 4mm ──┤
    /// │ margin  │         576 dots           │ margin  │
    /// ```
    pub const MM80: Self = Self {
        name: "80mm thermal",
        width_dots: 576,
        width_bytes: 72,
        dpi: 203,
    };

    #[inline]
    pub fn dots_per_mm(&self) -> f32 {
        self.dpi as f32 / 25.4
    }

    #[inline]
    pub fn width_mm(&self) -> f32 {
        self.width_dots as f32 / self.dots_per_mm()
    }

    #[inline]
    pub fn mm_to_dots(&self, mm: f32) -> u16 {
        (mm * self.dots_per_mm()).round() as u16
    }

    /// Scale an image down so it fits the print width, keeping aspect ratio.
    /// Images that already fit are left alone.
    pub fn fit_width(&self, width: u32, height: u32) -> (u32, u32) {
        let max = u32::from(self.width_dots);
        if width <= max || width == 0 {
            return (width, height);
        }
        let scaled = (u64::from(height) * u64::from(max)).div_ceil(u64::from(width));
        (max, scaled.max(1) as u32)
    }
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self::MM58
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_dimensions() {
        for config in [PrinterConfig::MM58, PrinterConfig::MM80] {
            assert_eq!(config.width_dots, config.width_bytes * 8);
        }
        assert!((PrinterConfig::MM80.width_mm() - 72.0).abs() < 1.0);
        assert!((PrinterConfig::MM58.width_mm() - 48.0).abs() < 1.0);
    }

    #[test]
    fn test_mm_to_dots() {
        let dots = PrinterConfig::MM80.mm_to_dots(10.0);
        assert!((dots as i32 - 80).abs() < 2);
    }

    #[test]
    fn test_fit_width() {
        let config = PrinterConfig::MM58;
        assert_eq!(config.fit_width(200, 100), (200, 100));
        assert_eq!(config.fit_width(768, 100), (384, 50));
        assert_eq!(config.fit_width(1000, 1), (384, 1));
    }

    #[test]
    fn test_paper_width_parsing() {
        assert_eq!("58mm".parse::<PaperWidth>(), Ok(PaperWidth::Mm58));
        assert_eq!("80".parse::<PaperWidth>(), Ok(PaperWidth::Mm80));
        assert!("110mm".parse::<PaperWidth>().is_err());
        assert_eq!(PaperWidth::Mm80.config(), PrinterConfig::MM80);
    }
}
