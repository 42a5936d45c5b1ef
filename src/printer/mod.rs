//! # Printer Module
//!
//! Printer hardware profiles.
//!
//! - [`config`]: paper widths and print geometry

pub mod config;

pub use config::{PaperWidth, PrinterConfig};
