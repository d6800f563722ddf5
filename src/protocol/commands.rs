//! # ESC/POS Protocol Commands
//!
//! This module implements the subset of the ESC/POS command protocol used
//! to print text receipts on BLE thermal printers.
//!
//! ## Escape Sequence Structure
//!
//! Commands follow these patterns:
//! - Single byte: `LF`
//! - Two bytes: `ESC @`
//! - Multi-byte with parameters: `ESC a n`, `ESC ! n`, `GS V A n`
//!
//! Every builder is a pure function returning the exact byte sequence;
//! nothing here knows about the transport.

use crate::receipt::{Alignment, TextSize};

// ============================================================================
// ESCAPE SEQUENCE CONSTANTS
// ============================================================================

/// ESC (Escape) - Command prefix byte
pub const ESC: u8 = 0x1B;

/// GS (Group Separator) - Extended command prefix
///
/// Used for paper cutting and other mechanism control.
/// - Hex: 0x1D, Decimal: 29
pub const GS: u8 = 0x1D;

/// LF (Line Feed) - Print the line buffer and advance one line
pub const LF: u8 = 0x0A;

/// Print mode bit: double-height characters (`ESC ! n`, bit 4)
pub const MODE_DOUBLE_HEIGHT: u8 = 0x10;

/// Print mode bit: double-width characters (`ESC ! n`, bit 5)
pub const MODE_DOUBLE_WIDTH: u8 = 0x20;

/// Default feed (in dot rows) before the cut in `GS V A n`
pub const DEFAULT_CUT_FEED: u8 = 3;

// ============================================================================
// INITIALIZATION
// ============================================================================

/// # Initialize Printer (ESC @)
///
/// Clears the print buffer and resets text formatting, alignment and
/// character size to the power-on defaults.
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC @ |
/// | Hex     | 1B 40 |
///
/// ```
/// use escble::protocol::commands;
///
/// assert_eq!(commands::init(), vec![0x1B, 0x40]);
/// ```
#[inline]
pub fn init() -> Vec<u8> {
    vec![ESC, b'@']
}

// ============================================================================
// TEXT FORMATTING
// ============================================================================

/// # Select Justification (ESC a n)
///
/// | Format  | Bytes      |
/// |---------|------------|
/// | ASCII   | ESC a n    |
/// | Hex     | 1B 61 n    |
///
/// - `n = 0`: left
/// - `n = 1`: center
/// - `n = 2`: right
///
/// Takes effect at the start of the next line.
#[inline]
pub fn align(alignment: Alignment) -> Vec<u8> {
    let n = match alignment {
        Alignment::Left => 0,
        Alignment::Center => 1,
        Alignment::Right => 2,
    };
    vec![ESC, b'a', n]
}

/// # Emphasis On (ESC E 1)
#[inline]
pub fn bold_on() -> Vec<u8> {
    vec![ESC, b'E', 1]
}

/// # Emphasis Off (ESC E 0)
#[inline]
pub fn bold_off() -> Vec<u8> {
    vec![ESC, b'E', 0]
}

/// # Select Print Mode (ESC ! n)
///
/// Sets character size through the print-mode bit field.
///
/// | Size | n |
/// |------|---|
/// | Normal | 0x00 |
/// | Double height | 0x10 |
/// | Double width | 0x20 |
/// | Double both | 0x30 |
///
/// `ESC ! n` also rewrites the emphasis bit, so it clears bold. Callers
/// set size before turning emphasis on.
#[inline]
pub fn print_mode(size: TextSize) -> Vec<u8> {
    let n = match size {
        TextSize::Normal => 0,
        TextSize::DoubleHeight => MODE_DOUBLE_HEIGHT,
        TextSize::DoubleWidth => MODE_DOUBLE_WIDTH,
        TextSize::Double => MODE_DOUBLE_HEIGHT | MODE_DOUBLE_WIDTH,
    };
    vec![ESC, b'!', n]
}

// ============================================================================
// PAPER CONTROL
// ============================================================================

/// # Line Feed (LF)
#[inline]
pub fn line_feed() -> Vec<u8> {
    vec![LF]
}

/// # Feed and Full Cut (GS V A n)
///
/// Feeds the paper `n` dot rows past the cutter position, then performs a
/// full cut.
///
/// | Format  | Bytes        |
/// |---------|--------------|
/// | ASCII   | GS V A n     |
/// | Hex     | 1D 56 41 n   |
#[inline]
pub fn cut_feed(n: u8) -> Vec<u8> {
    vec![GS, b'V', b'A', n]
}

/// Literal text payload (UTF-8 bytes, no terminator).
#[inline]
pub fn text(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}
