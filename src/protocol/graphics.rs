//! # ESC/POS Raster Graphics
//!
//! Prints arbitrary bitmaps with the raster bit image command `GS v 0`.
//!
//! ## Bit Packing
//!
//! Graphics data is packed as bytes where each bit represents one dot:
//! - Bit 7 (MSB) = leftmost dot
//! - 1 = black (print), 0 = white (no print)
//!
//! ```text
//! Byte value 0xF0 = 11110000 = ████░░░░
//! Byte value 0xAA = 10101010 = █░█░█░█░
//! ```
//!
//! Rows are `ceil(width / 8)` bytes long; the last byte of a row is padded
//! with white bits.

use super::commands::{GS, u16_le};
use crate::error::EncodeError;
use crate::render::dither;

/// `GS v 0`: the raster bit image opcode.
pub const RASTER_OPCODE: [u8; 3] = [GS, b'v', b'0'];

/// Normal density (no doubling).
pub const MODE_NORMAL: u8 = 0;

/// # Raster Header (GS v 0 m xL xH yL yH)
///
/// | Byte | Meaning |
/// |------|---------|
/// | `GS v 0` | opcode |
/// | `m` | mode, always 0 (normal density) |
/// | `xL xH` | width in **bytes**, little-endian |
/// | `yL yH` | height in dots, little-endian |
///
/// ```
/// use bleprint::protocol::graphics;
///
/// let header = graphics::raster_header(72, 300);
/// assert_eq!(header, vec![0x1D, 0x76, 0x30, 0x00, 72, 0, 0x2C, 0x01]);
/// ```
pub fn raster_header(width_bytes: u16, height: u16) -> Vec<u8> {
    let [xl, xh] = u16_le(width_bytes);
    let [yl, yh] = u16_le(height);

    let mut cmd = Vec::with_capacity(8);
    cmd.extend_from_slice(&RASTER_OPCODE);
    cmd.push(MODE_NORMAL);
    cmd.extend_from_slice(&[xl, xh, yl, yh]);
    cmd
}

/// # Print an RGBA Image
///
/// Dithers a dense row-major RGBA buffer with Floyd–Steinberg and returns two
/// command buffers: the raster header and the packed bitmap.
///
/// ## Errors
///
/// - [`EncodeError::ImageDimensions`] when `pixels.len() != width * height * 4`
/// - [`EncodeError::ImageTooLarge`] when the width in bytes or the height does
///   not fit the 16-bit header fields, or the RGBA size overflows `usize`
///
/// ## Example
///
/// ```
/// use bleprint::protocol::graphics;
///
/// // One black pixel.
/// let buffers = graphics::image(&[0, 0, 0, 255], 1, 1).unwrap();
/// assert_eq!(buffers.len(), 2);
/// assert_eq!(buffers[0], vec![0x1D, 0x76, 0x30, 0x00, 1, 0, 1, 0]);
/// assert_eq!(buffers[1], vec![0x80]);
/// ```
pub fn image(pixels: &[u8], width: usize, height: usize) -> Result<Vec<Vec<u8>>, EncodeError> {
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(4))
        .ok_or(EncodeError::ImageTooLarge { width, height })?;
    if pixels.len() != expected {
        return Err(EncodeError::ImageDimensions {
            width,
            height,
            expected,
            actual: pixels.len(),
        });
    }

    let width_bytes = u16::try_from(width.div_ceil(8))
        .map_err(|_| EncodeError::ImageTooLarge { width, height })?;
    let rows = u16::try_from(height).map_err(|_| EncodeError::ImageTooLarge { width, height })?;

    let bitmap = dither::dither_rgba(pixels, width, height);
    Ok(vec![raster_header(width_bytes, rows), bitmap])
}
