//! # bleprint - Thermal Printing over Bluetooth
//!
//! bleprint drives ESC/POS thermal receipt and label printers over narrow,
//! lossy wireless links. It provides:
//!
//! - **Protocol codec**: ESC/POS command builders for text, raster images,
//!   1-D barcodes and QR codes, with barcode validation and checksums
//! - **Dithering**: Floyd–Steinberg error diffusion for raster images
//! - **Adaptive transport**: chunked writes that shrink and grow with link
//!   health, with per-chunk timeouts and exponential backoff
//! - **Print queue**: priority ordering, retries and lifecycle events
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use bleprint::{
//!     protocol::{PrintBuilder, text::TextEncoding},
//!     queue::{JobOptions, LinkExecutor, PrintQueue, QueueConfig},
//!     transport::{AdaptiveWriter, RfcommLink},
//! };
//!
//! # async fn run() -> Result<(), bleprint::BleprintError> {
//! let payload = PrintBuilder::new(TextEncoding::Cp437)
//!     .init()
//!     .line("Hello")?
//!     .feed(3)
//!     .cut()
//!     .build();
//!
//! let link = Arc::new(RfcommLink::new());
//! let executor = LinkExecutor::new(link, "/dev/rfcomm0", AdaptiveWriter::default());
//! let queue = PrintQueue::new(QueueConfig::default(), executor);
//!
//! queue.add(payload, JobOptions::default())?;
//! queue.wait_idle().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | ESC/POS command builders and validation |
//! | [`render`] | Dithering |
//! | [`transport`] | Link backends and the adaptive writer |
//! | [`queue`] | Priority print queue and executors |
//! | [`printer`] | Paper profiles |
//! | [`config`] | TOML settings |
//! | [`error`] | Error types |

pub mod config;
pub mod error;
pub mod printer;
pub mod protocol;
pub mod queue;
pub mod render;
pub mod transport;

// Re-exports for convenience
pub use config::Settings;
pub use error::BleprintError;
pub use printer::PrinterConfig;
pub use queue::PrintQueue;
