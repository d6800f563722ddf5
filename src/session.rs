//! # Device Session Manager
//!
//! Owns discovery, connection and the connected/disconnected transition of
//! the one BLE printer a process talks to.
//!
//! ```text
//!            ensure_connected()                resolve service + characteristic
//!   Idle ───────────────────────► Connecting ─────────────────────────────► Connected
//!    ▲                                │  failure / timeout / cancel            │
//!    └────────────────────────────────┘                                        │
//!    └──────────────── disconnect event / write failure / disconnect() ───────┘
//! ```
//!
//! A disconnect is final for that session: nothing reconnects in the
//! background, the next `ensure_connected` runs discovery again. The
//! persisted [`PrinterDescriptor`] survives and only feeds the display
//! status and the picker's preferred device.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::ConnectError;
use crate::printer::config::PrinterConfig;
use crate::store::KeyValueStore;
use crate::transport::{BleAdapter, DeviceInfo, DeviceRequest, GattLink, LinkError};

/// Storage key of the last connected printer.
pub const LAST_PRINTER_KEY: &str = "escble.last_printer";

/// Shown when there is neither a live session nor a remembered printer.
pub const CONNECT_PROMPT: &str = "No printer connected. Connect a printer to print receipts.";

/// The most recently connected printer, persisted across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterDescriptor {
    pub id: String,
    pub name: String,
    pub last_connected: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
}

/// Live handle to a connected printer.
///
/// Clones share the same link. A session never comes back once its link
/// dropped; ask the manager for a new one.
pub struct DeviceSession<L: GattLink> {
    generation: u64,
    device: DeviceInfo,
    link: Arc<L>,
    service: L::Service,
    characteristic: L::Characteristic,
    connected_at: DateTime<Utc>,
}

impl<L: GattLink> Clone for DeviceSession<L> {
    fn clone(&self) -> Self {
        Self {
            generation: self.generation,
            device: self.device.clone(),
            link: self.link.clone(),
            service: self.service.clone(),
            characteristic: self.characteristic.clone(),
            connected_at: self.connected_at,
        }
    }
}

impl<L: GattLink> std::fmt::Debug for DeviceSession<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("generation", &self.generation)
            .field("device", &self.device)
            .field("connected", &self.is_connected())
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

impl<L: GattLink> DeviceSession<L> {
    /// Increases with every successful connect in this process.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    pub fn service(&self) -> &L::Service {
        &self.service
    }

    /// Write one chunk to the print characteristic.
    pub async fn write(&self, data: &[u8]) -> Result<(), LinkError> {
        self.link.write_value(&self.characteristic, data).await
    }
}

enum Slot<L: GattLink> {
    Idle,
    Connected {
        session: DeviceSession<L>,
        watcher: JoinHandle<()>,
    },
}

impl<L: GattLink> Slot<L> {
    fn generation(&self) -> Option<u64> {
        match self {
            Slot::Idle => None,
            Slot::Connected { session, .. } => Some(session.generation),
        }
    }

    /// Move to Idle, unsubscribing from disconnect events.
    fn clear(&mut self) -> Option<DeviceSession<L>> {
        match std::mem::replace(self, Slot::Idle) {
            Slot::Idle => None,
            Slot::Connected { session, watcher } => {
                watcher.abort();
                Some(session)
            }
        }
    }
}

/// Resets the connecting flag even when the connect future is dropped.
struct ConnectingGuard<'a>(&'a AtomicBool);

impl<'a> ConnectingGuard<'a> {
    fn new(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Closes a freshly opened link if `establish` is dropped before the
/// session is stored.
struct PendingLink<L: GattLink>(Option<Arc<L>>);

impl<L: GattLink> PendingLink<L> {
    fn new(link: Arc<L>) -> Self {
        Self(Some(link))
    }

    fn disarm(mut self) {
        self.0 = None;
    }
}

impl<L: GattLink> Drop for PendingLink<L> {
    fn drop(&mut self) {
        let Some(link) = self.0.take() else { return };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                warn!("Connect abandoned, closing printer link");
                runtime.spawn(async move { link.disconnect().await });
            }
            Err(_) => warn!("Connect abandoned outside a runtime, printer link left open"),
        }
    }
}

/// Owns the single printer session of the application.
pub struct SessionManager<A: BleAdapter> {
    adapter: A,
    store: Arc<dyn KeyValueStore>,
    config: PrinterConfig,
    slot: Arc<Mutex<Slot<A::Link>>>,
    connect_lock: Mutex<()>,
    connecting: AtomicBool,
    generations: AtomicU64,
}

impl<A: BleAdapter> SessionManager<A> {
    pub fn new(adapter: A, store: Arc<dyn KeyValueStore>, config: PrinterConfig) -> Self {
        Self {
            adapter,
            store,
            config,
            slot: Arc::new(Mutex::new(Slot::Idle)),
            connect_lock: Mutex::new(()),
            connecting: AtomicBool::new(false),
            generations: AtomicU64::new(0),
        }
    }

    /// Return the live session, connecting first when there is none.
    ///
    /// While connected this performs no discovery or GATT work at all.
    /// Concurrent callers are serialized; the second one reuses the session
    /// the first one established.
    ///
    /// ## Errors
    ///
    /// Any [`ConnectError`]; the manager is back in Idle afterwards.
    pub async fn ensure_connected(&self) -> Result<DeviceSession<A::Link>, ConnectError> {
        let _serial = self.connect_lock.lock().await;

        if let Some(session) = self.live_session().await {
            debug!(device = %session.device.name, "Reusing printer session");
            return Ok(session);
        }

        let _connecting = ConnectingGuard::new(&self.connecting);
        self.establish().await.inspect_err(|e| {
            warn!(error = %e, "Printer connection failed");
        })
    }

    async fn establish(&self) -> Result<DeviceSession<A::Link>, ConnectError> {
        let request = DeviceRequest {
            service: self.config.service_uuid,
            preferred_id: self.last_printer().await.map(|d| d.id),
        };
        info!(service = %request.service, preferred = ?request.preferred_id, "Requesting printer");

        let discovery = self.config.discovery_timeout();
        let device = timeout(discovery, self.adapter.request_device(&request))
            .await
            .map_err(|_| ConnectError::Timeout {
                stage: "device discovery",
                after: discovery,
            })??;

        info!(id = %device.id, name = %device.name, "Connecting to printer");
        let connect = self.config.connect_timeout();
        let link = timeout(connect, self.adapter.connect(&device))
            .await
            .map_err(|_| ConnectError::Timeout {
                stage: "GATT connect",
                after: connect,
            })??;
        let link = Arc::new(link);
        let pending = PendingLink::new(link.clone());

        let (service, characteristic) = match self.resolve(&link).await {
            Ok(endpoints) => endpoints,
            Err(e) => {
                pending.disarm();
                link.disconnect().await;
                return Err(e);
            }
        };

        let session = DeviceSession {
            generation: self.generations.fetch_add(1, Ordering::SeqCst) + 1,
            device,
            link,
            service,
            characteristic,
            connected_at: Utc::now(),
        };

        self.remember(&session).await;

        let watcher = spawn_disconnect_watcher(
            self.slot.clone(),
            session.generation,
            session.link.subscribe_disconnect(),
        );
        *self.slot.lock().await = Slot::Connected {
            session: session.clone(),
            watcher,
        };
        pending.disarm();

        info!(
            id = %session.device.id,
            name = %session.device.name,
            generation = session.generation,
            "Printer connected"
        );
        Ok(session)
    }

    async fn resolve(
        &self,
        link: &A::Link,
    ) -> Result<
        (
            <A::Link as GattLink>::Service,
            <A::Link as GattLink>::Characteristic,
        ),
        ConnectError,
    > {
        let service_uuid = self.config.service_uuid;
        let service = link.service(service_uuid).await.map_err(|e| match e {
            LinkError::NotFound => ConnectError::ServiceNotFound(service_uuid),
            other => ConnectError::Gatt(other.to_string()),
        })?;

        let char_uuid = self.config.characteristic_uuid;
        let characteristic = link
            .characteristic(&service, char_uuid)
            .await
            .map_err(|e| match e {
                LinkError::NotFound => ConnectError::CharacteristicNotFound(char_uuid),
                other => ConnectError::Gatt(other.to_string()),
            })?;

        Ok((service, characteristic))
    }

    /// The current session if its link is still up. A session whose link
    /// dropped is cleared on the spot.
    async fn live_session(&self) -> Option<DeviceSession<A::Link>> {
        let mut slot = self.slot.lock().await;
        match &*slot {
            Slot::Connected { session, .. } if session.is_connected() => {
                return Some(session.clone());
            }
            Slot::Connected { session, .. } => {
                info!(generation = session.generation, "Dropping stale printer session");
            }
            Slot::Idle => return None,
        }
        slot.clear();
        None
    }

    pub async fn state(&self) -> ConnectionState {
        if self.connecting.load(Ordering::SeqCst) {
            return ConnectionState::Connecting;
        }
        match self.live_session().await {
            Some(_) => ConnectionState::Connected,
            None => ConnectionState::Idle,
        }
    }

    /// Tear down `session` if it is still the current one and close its
    /// link. Used after a failed write.
    pub async fn invalidate(&self, session: &DeviceSession<A::Link>) {
        let cleared = {
            let mut slot = self.slot.lock().await;
            if slot.generation() == Some(session.generation) {
                slot.clear()
            } else {
                None
            }
        };
        if cleared.is_some() {
            info!(generation = session.generation, "Printer session invalidated");
        }
        session.link.disconnect().await;
    }

    /// User-initiated disconnect. The remembered printer is kept.
    pub async fn disconnect(&self) {
        let cleared = self.slot.lock().await.clear();
        if let Some(session) = cleared {
            info!(name = %session.device.name, "Disconnecting printer");
            session.link.disconnect().await;
        }
    }

    /// The remembered printer, if any. Unreadable records count as absent.
    pub async fn last_printer(&self) -> Option<PrinterDescriptor> {
        let raw = match self.store.get(LAST_PRINTER_KEY).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Could not read last printer");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                warn!(error = %e, "Ignoring malformed last printer record");
                None
            }
        }
    }

    async fn remember(&self, session: &DeviceSession<A::Link>) {
        let descriptor = PrinterDescriptor {
            id: session.device.id.clone(),
            name: session.device.name.clone(),
            last_connected: session.connected_at,
        };
        let result = match serde_json::to_string(&descriptor) {
            Ok(json) => self
                .store
                .set(LAST_PRINTER_KEY, &json)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = result {
            warn!(error = %e, "Could not persist last printer");
        }
    }

    /// Human-readable printer status. Never touches the radio.
    pub async fn display_status(&self) -> String {
        if let Some(session) = self.live_session().await {
            return format!("{} (connected)", session.device.name);
        }
        match self.last_printer().await {
            Some(last) => format!(
                "{} (last connected {})",
                last.name,
                last.last_connected
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M")
            ),
            None => CONNECT_PROMPT.to_string(),
        }
    }
}

/// Subscribe to the link's disconnect signal and move the slot to Idle when
/// it fires, unless a newer session replaced it meanwhile.
fn spawn_disconnect_watcher<L: GattLink>(
    slot: Arc<Mutex<Slot<L>>>,
    generation: u64,
    mut connected: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        // A dropped sender means the link is gone as well.
        let _ = connected.wait_for(|up| !*up).await;

        let mut slot = slot.lock().await;
        if slot.generation() == Some(generation) {
            info!(generation, "Printer disconnected");
            // Replace without aborting: this task is the watcher being removed.
            *slot = Slot::Idle;
        }
    })
}
