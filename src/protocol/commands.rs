//! # ESC/POS Basic Commands
//!
//! This module implements the small, fixed-shape ESC/POS commands every
//! print job uses: reset, paper feed and cutting.
//!
//! ## Escape Sequence Structure
//!
//! Commands follow these patterns:
//! - Two bytes: `ESC @`
//! - Prefix + opcode + parameter: `ESC d n`, `GS V m`
//! - Prefix + opcode + length + payload: `GS ( k pL pH ...`, `GS v 0 m xL xH yL yH ...`
//!
//! ## Byte Order
//!
//! Multi-byte integers use **little-endian** encoding:
//! - `u16` value 0x1234 is sent as bytes `[0x34, 0x12]`

// ============================================================================
// ESCAPE SEQUENCE CONSTANTS
// ============================================================================

/// ESC (Escape) - Command prefix byte
pub const ESC: u8 = 0x1B;

/// GS (Group Separator) - Extended command prefix
///
/// Used for graphics, barcodes, character size and the cutter.
pub const GS: u8 = 0x1D;

/// LF (Line Feed) - Print and advance one line
pub const LF: u8 = 0x0A;

/// Largest value accepted by one-byte feed parameters
pub const MAX_FEED_LINES: u8 = u8::MAX;

// ============================================================================
// INITIALIZATION
// ============================================================================

/// # Initialize Printer (ESC @)
///
/// Resets the printer to its power-on state: clears the print buffer,
/// styling, alignment and character size. Send at the start of each job.
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC @ |
/// | Hex     | 1B 40 |
///
/// ## Example
///
/// ```
/// use bleprint::protocol::commands;
///
/// assert_eq!(commands::init(), vec![0x1B, 0x40]);
/// ```
#[inline]
pub fn init() -> Vec<u8> {
    vec![ESC, b'@']
}

// ============================================================================
// PAPER FEED
// ============================================================================

/// # Print and Feed Lines (ESC d n)
///
/// Prints the line buffer and advances the paper by `n` lines.
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | ESC d n  |
/// | Hex     | 1B 64 n  |
///
/// `lines` is clamped to 0–255 rather than rejected.
///
/// ```
/// use bleprint::protocol::commands;
///
/// assert_eq!(commands::feed(3), vec![0x1B, 0x64, 3]);
/// assert_eq!(commands::feed(1_000), vec![0x1B, 0x64, 255]);
/// ```
pub fn feed(lines: u32) -> Vec<u8> {
    let n = lines.min(u32::from(MAX_FEED_LINES)) as u8;
    vec![ESC, b'd', n]
}

// ============================================================================
// CUTTER CONTROL
// ============================================================================

/// # Full Cut (GS V 0)
///
/// Cuts the paper completely at the current position.
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | GS V 0   |
/// | Hex     | 1D 56 00 |
#[inline]
pub fn cut() -> Vec<u8> {
    vec![GS, b'V', 0]
}

/// # Partial Cut (GS V 1)
///
/// Leaves a small hinge so the receipt does not fall off the roll.
#[inline]
pub fn cut_partial() -> Vec<u8> {
    vec![GS, b'V', 1]
}

// ============================================================================
// HELPERS
// ============================================================================

/// Split a `u16` into the `[low, high]` byte pair ESC/POS length fields use.
#[inline]
pub const fn u16_le(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}
