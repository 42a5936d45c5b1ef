//! # Floyd–Steinberg Error-Diffusion Dithering
//!
//! Converts RGBA images to the 1-bit rasters thermal printers print.
//!
//! ## Pipeline
//!
//! ```text
//! RGBA ──► luminance ──► error diffusion ──► bool mask ──► MSB-first bytes
//!          0.299 R         threshold 128       true=black    stride ceil(w/8)
//!          0.587 G
//!          0.114 B
//! ```
//!
//! ## Error Diffusion
//!
//! Each pixel is snapped to black (0) or white (255). The quantization error
//! `old - new` is pushed onto neighbours that have not been visited yet:
//!
//! ```text
//!              [  *  ] [7/16]
//!      [3/16]  [5/16]  [1/16]
//! ```
//!
//! Neighbour values are clamped to [0, 255] after each push. The scan is
//! left-to-right, top-to-bottom, so the output is deterministic.
//!
//! ## Usage Example
//!
//! ```
//! use bleprint::render::dither;
//!
//! // One white and one black pixel, RGBA.
//! let pixels = [255, 255, 255, 255, 0, 0, 0, 255];
//! let raster = dither::dither_rgba(&pixels, 2, 1);
//! assert_eq!(raster, vec![0b0100_0000]);
//! ```

/// Luminance threshold: values below it print black.
pub const THRESHOLD: f32 = 128.0;

/// Grayscale value of an RGB triple, rounded to the nearest integer.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> f32 {
    (0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)).round()
}

/// Convert a dense row-major RGBA buffer to grayscale values.
///
/// Alpha is ignored. The caller guarantees `pixels.len() >= width * height * 4`.
pub fn grayscale(pixels: &[u8], width: usize, height: usize) -> Vec<f32> {
    pixels
        .chunks_exact(4)
        .take(width * height)
        .map(|px| luminance(px[0], px[1], px[2]))
        .collect()
}

/// Run Floyd–Steinberg over a grayscale buffer.
///
/// Returns one flag per pixel, `true` meaning black (print a dot).
pub fn floyd_steinberg(mut gray: Vec<f32>, width: usize, height: usize) -> Vec<bool> {
    let mut black = vec![false; width * height];

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let old = gray[idx];
            let new = if old < THRESHOLD { 0.0 } else { 255.0 };
            black[idx] = new == 0.0;
            let error = old - new;

            let mut spread = |nx: usize, ny: usize, weight: f32| {
                let n = ny * width + nx;
                gray[n] = (gray[n] + error * weight).clamp(0.0, 255.0);
            };

            if x + 1 < width {
                spread(x + 1, y, 7.0 / 16.0);
            }
            if y + 1 < height {
                if x > 0 {
                    spread(x - 1, y + 1, 3.0 / 16.0);
                }
                spread(x, y + 1, 5.0 / 16.0);
                if x + 1 < width {
                    spread(x + 1, y + 1, 1.0 / 16.0);
                }
            }
        }
    }

    black
}

/// Pack a row of boolean pixel values into bytes.
///
/// - Bit 7 (MSB) = leftmost pixel
/// - 1 = black (print dot), 0 = white (no dot)
///
/// A row whose length is not a multiple of 8 is padded with white bits.
///
/// ```
/// use bleprint::render::dither::pack_row;
///
/// let row = vec![true, true, true, true, false, false, false, false];
/// assert_eq!(pack_row(&row), vec![0xF0]);
///
/// let row = vec![true; 12];
/// assert_eq!(pack_row(&row), vec![0xFF, 0xF0]);
/// ```
pub fn pack_row(pixels: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; pixels.len().div_ceil(8)];

    for (i, &pixel) in pixels.iter().enumerate() {
        if pixel {
            bytes[i / 8] |= 1 << (7 - (i % 8));
        }
    }

    bytes
}

/// Dither an RGBA image into a packed raster of `ceil(width/8) * height` bytes.
pub fn dither_rgba(pixels: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mask = floyd_steinberg(grayscale(pixels, width, height), width, height);
    let mut data = Vec::with_capacity(width.div_ceil(8) * height);
    if width == 0 {
        return data;
    }
    for row in mask.chunks(width) {
        data.extend(pack_row(row));
    }
    data
}
