//! # ESC/POS Protocol Codec
//!
//! Pure functions turning print intents (text, raster images, 1-D barcodes,
//! QR codes, feed and cut) into ESC/POS command buffers. Nothing here does
//! I/O or keeps state between calls.
//!
//! ## Module Structure
//!
//! - [`commands`]: init, feed, cut
//! - [`text`]: text encodings and styling
//! - [`cp437`]: Code Page 437 table
//! - [`graphics`]: raster images (`GS v 0`)
//! - [`barcode`]: 1-D symbols (`GS k`) and QR (`GS ( k`)
//! - [`validate`]: symbol content rules and check digits
//! - [`builder`]: chains all of the above into one job payload
//!
//! ## Usage Example
//!
//! ```
//! use bleprint::protocol::{commands, text};
//!
//! let mut data = Vec::new();
//! data.extend(commands::init());
//! data.extend(text::align(text::Alignment::Center));
//! data.extend(text::encode("RECEIPT\n", text::TextEncoding::Ascii).unwrap());
//! data.extend(commands::feed(3));
//! data.extend(commands::cut());
//! ```

pub mod barcode;
pub mod builder;
pub mod commands;
pub mod cp437;
pub mod graphics;
pub mod text;
pub mod validate;

pub use builder::PrintBuilder;
