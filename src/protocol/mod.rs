//! # ESC/POS Protocol Implementation
//!
//! Low-level command builders and the receipt encoder.
//!
//! ## Module Structure
//!
//! - [`commands`]: byte builders (init, alignment, emphasis, size, feed, cut)
//! - [`encode`]: receipt description to byte segments and write chunks
//!
//! ## Usage Example
//!
//! ```
//! use escble::protocol::{commands, encode};
//! use escble::receipt::{Alignment, ReceiptLine};
//!
//! let lines = vec![
//!     ReceiptLine::Init,
//!     ReceiptLine::Align(Alignment::Center),
//!     ReceiptLine::Text("RECEIPT".into()),
//!     ReceiptLine::Cut,
//! ];
//!
//! let bytes = encode::to_bytes(&lines);
//! assert!(bytes.starts_with(&commands::init()));
//!
//! // Split for a printer that accepts 20-byte writes
//! let chunks = encode::packetize(&encode::encode(&lines), 20);
//! assert_eq!(chunks.concat(), bytes);
//! ```

pub mod commands;
pub mod encode;
