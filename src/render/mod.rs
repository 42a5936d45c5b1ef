//! # Rendering Module
//!
//! Turns host images into printable 1-bit rasters.
//!
//! - [`dither`]: Floyd–Steinberg error diffusion and MSB-first bit packing
//!
//! ```
//! use bleprint::render::dither;
//!
//! let white = [255u8; 4 * 8];
//! assert_eq!(dither::dither_rgba(&white, 8, 1), vec![0x00]);
//! ```

pub mod dither;
