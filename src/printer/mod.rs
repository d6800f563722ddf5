//! # Printer Controller
//!
//! [`ReceiptPrinter`] ties the pipeline together and is the one object an
//! application creates at startup:
//!
//! ```text
//! OrderRecord ─► Formatter ─► encode/packetize ─┐
//!                                               ├─► TransferEngine ─► printer
//!               SessionManager::ensure_connected┘
//! ```
//!
//! - [`config`]: device settings and the settings file

pub mod config;

use std::sync::Arc;

use tracing::error;

pub use config::{PrinterConfig, Settings};

use crate::error::PrintError;
use crate::notice::{LogNotifier, Notice, Notifier};
use crate::order::OrderRecord;
use crate::protocol::encode;
use crate::receipt::Receipt;
use crate::receipt::format::Formatter;
use crate::session::SessionManager;
use crate::store::KeyValueStore;
use crate::transfer::{TransferEngine, TransferReport};
use crate::transport::{BleAdapter, DeviceInfo};

/// What a successful job did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintOutcome {
    /// Connectivity check only, nothing printed.
    Connected { device: DeviceInfo },
    Printed {
        device: DeviceInfo,
        report: TransferReport,
    },
}

pub struct ReceiptPrinter<A: BleAdapter> {
    sessions: Arc<SessionManager<A>>,
    transfer: TransferEngine<A>,
    formatter: Formatter,
    config: PrinterConfig,
    notifier: Arc<dyn Notifier>,
}

impl<A: BleAdapter> ReceiptPrinter<A> {
    pub fn new(adapter: A, store: Arc<dyn KeyValueStore>, settings: &Settings) -> Self {
        let sessions = Arc::new(SessionManager::new(
            adapter,
            store,
            settings.printer.clone(),
        ));
        Self {
            transfer: TransferEngine::new(sessions.clone(), settings.printer.chunk_delay()),
            sessions,
            formatter: Formatter::new(settings.store.clone()),
            config: settings.printer.clone(),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn sessions(&self) -> &SessionManager<A> {
        &self.sessions
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    /// Encode a receipt into write chunks for this printer.
    pub fn encode(&self, receipt: &Receipt) -> Vec<Vec<u8>> {
        encode::packetize(&encode::encode(receipt.lines()), self.config.chunk_size)
    }

    /// Connectivity check: connect (or reuse the session) without printing.
    pub async fn connect(&self) -> Result<PrintOutcome, PrintError> {
        self.print(None).await
    }

    /// Print an order, or only connect when `order` is `None`.
    ///
    /// The order is validated before the radio is touched. On a transport
    /// error the receipt may be partly on paper already; see
    /// [`transfer`](crate::transfer).
    pub async fn print(&self, order: Option<&OrderRecord>) -> Result<PrintOutcome, PrintError> {
        let chunks = match order {
            Some(order) => Some(self.encode(&self.formatter.format(order)?)),
            None => None,
        };

        let session = self.sessions.ensure_connected().await?;
        let device = session.device().clone();
        self.notifier.notify(&Notice::Connected {
            printer: device.name.clone(),
        });

        let Some(chunks) = chunks else {
            return Ok(PrintOutcome::Connected { device });
        };

        self.notifier.notify(&Notice::PrintingStarted {
            printer: device.name.clone(),
            chunks: chunks.len(),
        });
        let report = self.transfer.transfer(&chunks, &session).await?;
        self.notifier.notify(&Notice::Printed {
            printer: device.name.clone(),
            bytes: report.bytes,
        });

        Ok(PrintOutcome::Printed { device, report })
    }

    /// Top-level entry point for UI actions.
    ///
    /// Never fails: every error is logged and turned into one
    /// [`Notice::Failed`] carrying its category's user message. The returned
    /// notice is the final one of the job.
    pub async fn run_job(&self, order: Option<&OrderRecord>) -> Notice {
        match self.print(order).await {
            Ok(PrintOutcome::Connected { device }) => Notice::Connected {
                printer: device.name,
            },
            Ok(PrintOutcome::Printed { device, report }) => Notice::Printed {
                printer: device.name,
                bytes: report.bytes,
            },
            Err(e) => {
                error!(error = %e, category = ?e.category(), "Print job failed");
                let notice = Notice::Failed {
                    category: e.category(),
                    message: e.user_message(),
                };
                self.notifier.notify(&notice);
                notice
            }
        }
    }

    /// Printer status for display; works without a connection.
    pub async fn status(&self) -> String {
        self.sessions.display_status().await
    }

    pub async fn disconnect(&self) {
        self.sessions.disconnect().await;
    }
}
