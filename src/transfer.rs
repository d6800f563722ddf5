//! # Transfer Engine
//!
//! Streams encoded chunks to the printer's write characteristic.
//!
//! ## Pacing
//!
//! Thermal printers have small receive buffers and BLE has no flow control
//! at this level, so chunks go out strictly one at a time: each write is
//! awaited, then the engine sleeps for the configured delay before the next.
//!
//! ## Partial Output
//!
//! Paper cannot be un-printed. When a write fails mid-stream every chunk
//! before it has already been printed; the engine stops, tears the session
//! down and reports [`TransportError::Write`] with the failing index. There
//! is no resend: the caller decides whether to print the receipt again.
//!
//! ## One Job at a Time
//!
//! Two transfers writing to the same characteristic would interleave on the
//! wire. Transfers queue on a single-slot lock, so a second print waits for
//! the first to finish.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::session::{DeviceSession, SessionManager};
use crate::transport::BleAdapter;

/// Summary of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub chunks: usize,
    pub bytes: usize,
    pub elapsed: Duration,
}

pub struct TransferEngine<A: BleAdapter> {
    sessions: Arc<SessionManager<A>>,
    chunk_delay: Duration,
    in_flight: Mutex<()>,
}

impl<A: BleAdapter> TransferEngine<A> {
    pub fn new(sessions: Arc<SessionManager<A>>, chunk_delay: Duration) -> Self {
        Self {
            sessions,
            chunk_delay,
            in_flight: Mutex::new(()),
        }
    }

    /// Write `chunks` in order to `session`.
    ///
    /// ## Errors
    ///
    /// - [`TransportError::NotConnected`] if the session is already dead;
    ///   nothing is written.
    /// - [`TransportError::Write`] on the first rejected write; the
    ///   remaining chunks are not attempted and the session is invalidated.
    pub async fn transfer(
        &self,
        chunks: &[Vec<u8>],
        session: &DeviceSession<A::Link>,
    ) -> Result<TransferReport, TransportError> {
        let _job = self.in_flight.lock().await;

        if !session.is_connected() {
            self.sessions.invalidate(session).await;
            return Err(TransportError::NotConnected);
        }

        let started = Instant::now();
        let total = chunks.len();
        let mut bytes = 0;

        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 && !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }

            if let Err(e) = session.write(chunk).await {
                warn!(
                    chunk = index + 1,
                    total,
                    bytes_sent = bytes,
                    error = %e,
                    "Write failed, aborting transfer"
                );
                self.sessions.invalidate(session).await;
                return Err(TransportError::Write {
                    index,
                    total,
                    reason: e.to_string(),
                });
            }

            bytes += chunk.len();
            debug!(chunk = index + 1, total, len = chunk.len(), "Chunk written");
        }

        let report = TransferReport {
            chunks: total,
            bytes,
            elapsed: started.elapsed(),
        };
        info!(chunks = report.chunks, bytes = report.bytes, elapsed = ?report.elapsed, "Transfer complete");
        Ok(report)
    }
}
