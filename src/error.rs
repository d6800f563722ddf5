//! # Error Types
//!
//! This module defines the error taxonomy used throughout the escble library.
//!
//! Errors fall into four categories, each surfaced to the user with exactly
//! one message:
//!
//! | Category | Raised by | BLE touched? |
//! |----------|-----------|--------------|
//! | Validation | [`Formatter`](crate::receipt::format::Formatter) | never |
//! | Connect | [`SessionManager`](crate::session::SessionManager) | discovery / GATT only |
//! | Transport | [`TransferEngine`](crate::transfer::TransferEngine) | yes, paper may be printed |
//! | Internal | storage, configuration, I/O | no |

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Order record rejected before any printer interaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The order has no `items` field at all.
    #[error("order has no items")]
    MissingItems,

    /// The `items` field exists but is not a list.
    #[error("order items are not a list")]
    ItemsNotAList,

    /// Every item was malformed and got filtered out.
    #[error("order has no valid items ({dropped} malformed item(s) dropped)")]
    NoValidItems { dropped: usize },
}

/// Discovery or connection failure. The session manager is back in Idle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// No usable Bluetooth adapter/backend.
    #[error("Bluetooth unavailable: {0}")]
    AdapterUnavailable(String),

    /// No device advertising the printer service was found.
    #[error("no printer found")]
    NotFound,

    /// The user dismissed the device picker.
    #[error("device selection cancelled")]
    Cancelled,

    /// Discovery or GATT connect did not finish in time.
    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },

    /// The GATT link could not be opened.
    #[error("GATT connect failed: {0}")]
    Gatt(String),

    /// The device does not expose the print service.
    #[error("print service {0} not found")]
    ServiceNotFound(Uuid),

    /// The print service has no write characteristic.
    #[error("write characteristic {0} not found")]
    CharacteristicNotFound(Uuid),
}

/// Write failure on a session that was live.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// A chunk write was rejected; chunks before `index` reached the printer.
    #[error("write of chunk {} of {total} failed: {reason}", .index + 1)]
    Write {
        index: usize,
        total: usize,
        reason: String,
    },

    /// The session was already invalidated when the transfer started.
    #[error("printer is not connected")]
    NotConnected,
}

/// Persistence failure in a [`KeyValueStore`](crate::store::KeyValueStore).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage format error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Main error type for escble operations
#[derive(Debug, Error)]
pub enum PrintError {
    #[error("Invalid order: {0}")]
    Validation(#[from] ValidationError),

    #[error("Printer not available: {0}")]
    Connect(#[from] ConnectError),

    #[error("Printing failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error category, one user-facing message each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Connect,
    Transport,
    Internal,
}

impl PrintError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PrintError::Validation(_) => ErrorCategory::Validation,
            PrintError::Connect(_) => ErrorCategory::Connect,
            PrintError::Transport(_) => ErrorCategory::Transport,
            PrintError::Storage(_) | PrintError::Config(_) | PrintError::Io(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// The message shown to the user for this error's category.
    pub fn user_message(&self) -> &'static str {
        self.category().user_message()
    }
}

impl ErrorCategory {
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorCategory::Validation => "Cannot print: the order has no printable items.",
            ErrorCategory::Connect => "Printer not available. Make sure it is on and in range.",
            ErrorCategory::Transport => {
                "Printing failed, check the printer connection. \
                 Part of the receipt may already have been printed."
            }
            ErrorCategory::Internal => "Printing failed due to an internal error.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let e: PrintError = ValidationError::MissingItems.into();
        assert_eq!(e.category(), ErrorCategory::Validation);

        let e: PrintError = ConnectError::Cancelled.into();
        assert_eq!(e.category(), ErrorCategory::Connect);

        let e: PrintError = TransportError::NotConnected.into();
        assert_eq!(e.category(), ErrorCategory::Transport);

        let e = PrintError::Config("bad".into());
        assert_eq!(e.category(), ErrorCategory::Internal);
    }

    #[test]
    fn test_transport_message_mentions_partial_output() {
        let e: PrintError = TransportError::NotConnected.into();
        assert!(e.user_message().contains("may already have been printed"));
    }

    #[test]
    fn test_write_error_is_one_based() {
        let e = TransportError::Write {
            index: 4,
            total: 10,
            reason: "gatt error".into(),
        };
        assert_eq!(e.to_string(), "write of chunk 5 of 10 failed: gatt error");
    }
}
