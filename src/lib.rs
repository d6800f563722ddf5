//! # escble - BLE Receipt Printing
//!
//! escble prints order receipts on ESC/POS thermal printers over Bluetooth
//! Low Energy. It provides:
//!
//! - **Receipt formatting**: 32-column layout with store header, item table,
//!   totals and footer
//! - **Protocol implementation**: ESC/POS command encoding and packetizing
//! - **Session management**: discovery, connection and disconnect tracking
//!   for one printer, remembered across runs
//! - **Transfer**: paced, strictly ordered chunk writes
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use escble::{
//!     order::{LineItem, OrderRecord},
//!     printer::{ReceiptPrinter, Settings},
//!     store::MemoryStore,
//!     transport::mock::{MockAdapter, MockPrinter},
//! };
//!
//! # async fn demo() -> Result<(), escble::PrintError> {
//! let settings = Settings::default();
//! let adapter = MockAdapter::new(MockPrinter::new("Counter Printer"));
//! let printer = ReceiptPrinter::new(adapter, Arc::new(MemoryStore::new()), &settings);
//!
//! let date = chrono::DateTime::parse_from_rfc3339("2024-03-05T14:07:00+07:00").unwrap();
//! let order = OrderRecord::new("A-1001", date, &[LineItem::new("Latte", 2, 4.5)], 0.0, 9.0);
//!
//! printer.print(Some(&order)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`order`] | Order records and item validation |
//! | [`receipt`] | Receipt model and formatter |
//! | [`protocol`] | ESC/POS command builders and encoder |
//! | [`session`] | Device session manager |
//! | [`transfer`] | Chunked transfer engine |
//! | [`transport`] | BLE capability traits and backends |
//! | [`printer`] | Top-level controller and configuration |
//! | [`store`] | Key-value persistence |
//! | [`notice`] | User-facing notices |
//! | [`error`] | Error types |

pub mod error;
pub mod notice;
pub mod order;
pub mod printer;
pub mod protocol;
pub mod receipt;
pub mod session;
pub mod store;
pub mod transfer;
pub mod transport;

// Re-exports for convenience
pub use error::PrintError;
pub use printer::{PrintOutcome, PrinterConfig, ReceiptPrinter, Settings};
pub use receipt::Receipt;
