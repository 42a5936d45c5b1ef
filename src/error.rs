//! # Error Types
//!
//! This module defines error types used throughout the bleprint library.
//!
//! ## Fault Families
//!
//! | Type | Raised by | Retry policy |
//! |------|-----------|--------------|
//! | [`ValidationReport`] | codec validators | never thrown, returned as data |
//! | [`LinkError`] | link backends | one automatic retry during discovery only |
//! | [`TransportError`] | adaptive writer | surfaced to the queue as a job failure |
//! | [`QueueError`] | print queue | immediate, never retried |
//!
//! [`ValidationReport`]: crate::protocol::validate::ValidationReport

use thiserror::Error;

use crate::protocol::validate::ValidationReport;
use crate::queue::JobStatus;

/// Faults reported by a link backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkError {
    /// No device answered for this identifier
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Connecting took longer than the backend allows
    #[error("connection to {0} timed out")]
    ConnectTimeout(String),

    /// The link is down (or went down mid-operation)
    #[error("device {0} is disconnected")]
    Disconnected(String),

    /// The device exposes no service we can print through
    #[error("no printable service on {0}")]
    ServiceNotFound(String),

    /// The service has no writable characteristic
    #[error("no writable characteristic on {0}")]
    CharacteristicNotFound(String),

    /// A single write did not complete within its deadline
    #[error("write timed out after {0} ms")]
    WriteTimeout(u64),

    /// A single write was rejected by the backend
    #[error("write failed: {0}")]
    WriteFailed(String),
}

impl LinkError {
    /// Whether this fault means the link itself is gone, as opposed to a
    /// single write going wrong.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }
}

/// Faults raised while streaming a buffer through the adaptive writer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The link failed; the write was aborted without chunk-level retry
    #[error("link fault: {0}")]
    Link(#[from] LinkError),

    /// A chunk kept failing after every allowed attempt
    #[error("chunk {chunk_index} failed after {attempts} attempts: {source}")]
    Transmission {
        chunk_index: usize,
        attempts: u32,
        #[source]
        source: LinkError,
    },
}

/// Faults raised by the print queue itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The queue already holds its maximum number of live jobs
    #[error("queue is full ({capacity} jobs)")]
    Full { capacity: usize },

    /// The queue was disposed and accepts no more work
    #[error("queue has been disposed")]
    Disposed,

    /// No job with this id is known
    #[error("unknown job {0}")]
    NotFound(String),

    /// Only pending jobs may be cancelled
    #[error("job is {status}, only pending jobs can be cancelled")]
    NotPending { status: JobStatus },
}

/// Faults raised while turning print intents into command bytes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// The requested text encoding is not one we can emit
    #[error("unsupported text encoding: {0}")]
    UnsupportedEncoding(String),

    /// A character has no representation in the selected encoding
    #[error("character {ch:?} at index {index} cannot be encoded as {encoding}")]
    Unmappable {
        ch: char,
        index: usize,
        encoding: &'static str,
    },

    /// The pixel buffer does not match the declared dimensions
    #[error("image buffer holds {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    ImageDimensions {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },

    /// The image does not fit the 16-bit raster header fields
    #[error("image {width}x{height} exceeds the raster command limits")]
    ImageTooLarge { width: usize, height: usize },

    /// A barcode or QR descriptor failed validation
    #[error("invalid symbol content: {0}")]
    Invalid(ValidationReport),
}

/// Faults raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Main error type for bleprint operations
#[derive(Debug, Error)]
pub enum BleprintError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Image decoding error (CLI image loading)
    #[error("Image error: {0}")]
    Image(String),

    /// The executor task panicked or was aborted
    #[error("executor aborted: {0}")]
    Aborted(String),

    /// A queued job ended in FAILED
    #[error("print job {id} failed: {reason}")]
    JobFailed { id: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
