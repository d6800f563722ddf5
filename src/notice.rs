//! # User Notices
//!
//! Outbound signals from a print job (connected, printing, done, failed).
//! How they reach the user is up to the integration: implement [`Notifier`]
//! for a toast, a channel or a log line.

use std::fmt;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::error::ErrorCategory;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Connected {
        printer: String,
    },
    PrintingStarted {
        printer: String,
        chunks: usize,
    },
    Printed {
        printer: String,
        bytes: usize,
    },
    Failed {
        category: ErrorCategory,
        message: &'static str,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Connected { printer } => write!(f, "Connected to {printer}"),
            Notice::PrintingStarted { printer, .. } => write!(f, "Printing on {printer}..."),
            Notice::Printed { printer, .. } => write!(f, "Receipt printed on {printer}"),
            Notice::Failed { message, .. } => f.write_str(message),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Writes notices to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &Notice) {
        match notice {
            Notice::Failed { category, .. } => warn!(?category, "{notice}"),
            _ => info!("{notice}"),
        }
    }
}

impl Notifier for UnboundedSender<Notice> {
    fn notify(&self, notice: &Notice) {
        // A closed receiver means nobody is listening any more.
        let _ = self.send(notice.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let n = Notice::Connected {
            printer: "Bar".into(),
        };
        assert_eq!(n.to_string(), "Connected to Bar");

        let n = Notice::Failed {
            category: ErrorCategory::Connect,
            message: ErrorCategory::Connect.user_message(),
        };
        assert_eq!(n.to_string(), ErrorCategory::Connect.user_message());
    }

    #[tokio::test]
    async fn test_channel_notifier() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.notify(&Notice::Connected {
            printer: "P".into(),
        });
        assert_eq!(
            rx.recv().await,
            Some(Notice::Connected {
                printer: "P".into()
            })
        );
    }
}
