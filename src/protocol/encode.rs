//! # Receipt Encoding
//!
//! Compiles a receipt description to ESC/POS bytes.
//!
//! ```text
//! [ReceiptLine] ──encode──► segments (one per line) ──packetize──► write chunks
//! ```
//!
//! Both steps are pure and preserve byte order: concatenating the output of
//! either step gives the same byte stream.

use super::commands;
use crate::receipt::{ReceiptLine, rule};

/// Encode each receipt line into its own byte segment, in input order.
pub fn encode(lines: &[ReceiptLine]) -> Vec<Vec<u8>> {
    lines.iter().map(encode_line).collect()
}

/// Encode a receipt into one contiguous byte stream.
pub fn to_bytes(lines: &[ReceiptLine]) -> Vec<u8> {
    encode(lines).concat()
}

fn encode_line(line: &ReceiptLine) -> Vec<u8> {
    match line {
        ReceiptLine::Init => commands::init(),
        ReceiptLine::Align(alignment) => commands::align(*alignment),
        ReceiptLine::Bold(true) => commands::bold_on(),
        ReceiptLine::Bold(false) => commands::bold_off(),
        ReceiptLine::Size(size) => commands::print_mode(*size),
        ReceiptLine::Text(text) => text_line(text),
        ReceiptLine::Item(row) => {
            let mut out = Vec::new();
            for line in row.lines() {
                out.extend(text_line(&line));
            }
            out
        }
        ReceiptLine::Rule => text_line(&rule()),
        ReceiptLine::Feed(n) => commands::line_feed().repeat(usize::from(*n)),
        ReceiptLine::Cut => commands::cut_feed(commands::DEFAULT_CUT_FEED),
    }
}

fn text_line(text: &str) -> Vec<u8> {
    let mut out = commands::text(text);
    out.extend(commands::line_feed());
    out
}

/// Regroup segments into write chunks of at most `max` bytes.
///
/// Consecutive small segments are merged to save BLE round trips; segments
/// larger than `max` are split. A `max` of zero is treated as one byte.
pub fn packetize(segments: &[Vec<u8>], max: usize) -> Vec<Vec<u8>> {
    let max = max.max(1);
    let mut chunks = Vec::new();
    let mut current: Vec<u8> = Vec::with_capacity(max);

    for segment in segments {
        let mut rest = segment.as_slice();
        while !rest.is_empty() {
            let room = max - current.len();
            let take = room.min(rest.len());
            current.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if current.len() == max {
                chunks.push(std::mem::replace(&mut current, Vec::with_capacity(max)));
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    debug_assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= max));
    chunks
}
