//! # Print Payload Builder
//!
//! Chains codec operations into the single byte buffer a print job carries.
//! Steps that can fail return `Result<Self, EncodeError>`, so a payload only
//! exists once every descriptor in it has passed validation.
//!
//! ```
//! use bleprint::protocol::builder::PrintBuilder;
//! use bleprint::protocol::text::{Alignment, TextEncoding};
//! use bleprint::protocol::barcode::QrOptions;
//!
//! let payload = PrintBuilder::new(TextEncoding::Cp437)
//!     .init()
//!     .align(Alignment::Center)
//!     .line("RECEIPT")?
//!     .qr("https://example.com", &QrOptions::default())?
//!     .feed(3)
//!     .cut()
//!     .build();
//! assert_eq!(&payload[..2], &[0x1B, 0x40]);
//! # Ok::<(), bleprint::error::EncodeError>(())
//! ```

use super::barcode::{self, LinearOptions, QrOptions};
use super::commands::{self, LF};
use super::graphics;
use super::text::{self, Alignment, TextEncoding};
use crate::error::EncodeError;

#[derive(Debug, Clone, Default)]
pub struct PrintBuilder {
    encoding: TextEncoding,
    buffers: Vec<Vec<u8>>,
}

impl PrintBuilder {
    pub fn new(encoding: TextEncoding) -> Self {
        Self {
            encoding,
            buffers: Vec::new(),
        }
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Append an already-encoded command buffer.
    pub fn raw(mut self, buffer: Vec<u8>) -> Self {
        self.buffers.push(buffer);
        self
    }

    fn extend(mut self, buffers: Vec<Vec<u8>>) -> Self {
        self.buffers.extend(buffers);
        self
    }

    pub fn init(self) -> Self {
        self.raw(commands::init())
    }

    pub fn align(self, alignment: Alignment) -> Self {
        self.raw(text::align(alignment))
    }

    pub fn bold(self, enabled: bool) -> Self {
        self.raw(text::bold(enabled))
    }

    pub fn size(self, width: u8, height: u8) -> Self {
        self.raw(text::size(width, height))
    }

    pub fn text(self, content: &str) -> Result<Self, EncodeError> {
        let bytes = text::encode(content, self.encoding)?;
        Ok(self.raw(bytes))
    }

    /// Text followed by a line feed.
    pub fn line(self, content: &str) -> Result<Self, EncodeError> {
        Ok(self.text(content)?.raw(vec![LF]))
    }

    pub fn feed(self, lines: u32) -> Self {
        self.raw(commands::feed(lines))
    }

    pub fn cut(self) -> Self {
        self.raw(commands::cut())
    }

    pub fn cut_partial(self) -> Self {
        self.raw(commands::cut_partial())
    }

    pub fn image(self, pixels: &[u8], width: usize, height: usize) -> Result<Self, EncodeError> {
        let buffers = graphics::image(pixels, width, height)?;
        Ok(self.extend(buffers))
    }

    pub fn barcode(self, content: &str, options: &LinearOptions) -> Result<Self, EncodeError> {
        let buffers = barcode::linear(content, options).map_err(EncodeError::Invalid)?;
        Ok(self.extend(buffers))
    }

    pub fn qr(self, content: &str, options: &QrOptions) -> Result<Self, EncodeError> {
        let buffers = barcode::qr(content, options, self.encoding)?;
        Ok(self.extend(buffers))
    }

    /// Command buffers in emission order.
    pub fn buffers(&self) -> &[Vec<u8>] {
        &self.buffers
    }

    /// Concatenate every buffer into one payload.
    pub fn build(self) -> Vec<u8> {
        self.buffers.concat()
    }
}
