//! # Settings
//!
//! Runtime settings loaded from a TOML file. Every section and every field
//! is optional; missing values take their defaults.
//!
//! ```toml
//! device = "/dev/rfcomm0"
//!
//! [transport]
//! chunk_size = 20
//! delay_ms = 20
//! retries = 3
//!
//! [queue]
//! max_size = 100
//! default_retries = 3
//! retry_delay_ms = 1000
//! auto_process = true
//! concurrency = 1
//!
//! [printer]
//! paper = "58mm"
//! encoding = "cp437"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::printer::PaperWidth;
use crate::protocol::text::TextEncoding;
use crate::queue::QueueConfig;
use crate::transport::{AdaptiveLimits, TransportConfig};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterSettings {
    pub paper: PaperWidth,
    pub encoding: TextEncoding,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Device path or MAC address of the printer
    pub device: Option<String>,
    pub transport: TransportConfig,
    /// Adaptation bounds for the chunked writer
    pub limits: AdaptiveLimits,
    pub queue: QueueConfig,
    pub printer: PrinterSettings,
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
