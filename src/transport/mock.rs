//! # In-Memory Printer
//!
//! A scriptable fake BLE printer. [`MockPrinter`] is the test-side handle
//! (script behaviour, inspect writes); [`MockAdapter`] plugs it into the
//! [`BleAdapter`] seam.
//!
//! ```
//! use escble::transport::mock::{MockAdapter, MockPrinter};
//!
//! let printer = MockPrinter::new("Mock Printer");
//! let adapter = MockAdapter::new(printer.clone());
//! printer.fail_write(4); // fifth write will be rejected
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use super::{BleAdapter, DeviceInfo, DeviceRequest, GattLink, LinkError};
use crate::error::ConnectError;

/// What the device picker does on the next request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PickerMode {
    /// Pick the preferred device if advertised, otherwise the first one.
    #[default]
    Auto,
    /// The user dismisses the picker.
    Cancel,
    /// The user never answers.
    Hang,
}

/// One recorded chunk write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub data: Vec<u8>,
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Debug)]
struct State {
    devices: Vec<DeviceInfo>,
    service: Uuid,
    characteristic: Uuid,
    picker: PickerMode,
    connect_failure: Option<String>,
    fail_write_at: Option<usize>,
    write_latency: Duration,
    write_attempts: usize,
    writes: Vec<WriteRecord>,
    in_flight: usize,
    max_in_flight: usize,
    requests: usize,
    connects: usize,
    link: Option<Arc<watch::Sender<bool>>>,
}

/// Test-side handle to the fake printer. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MockPrinter {
    state: Arc<Mutex<State>>,
}

impl MockPrinter {
    /// A printer advertising the default service under the id `mock-0`.
    pub fn new(name: &str) -> Self {
        let state = State {
            devices: vec![DeviceInfo {
                id: "mock-0".into(),
                name: name.into(),
            }],
            service: super::DEFAULT_SERVICE_UUID,
            characteristic: super::DEFAULT_CHARACTERISTIC_UUID,
            picker: PickerMode::Auto,
            connect_failure: None,
            fail_write_at: None,
            write_latency: Duration::ZERO,
            write_attempts: 0,
            writes: Vec::new(),
            in_flight: 0,
            max_in_flight: 0,
            requests: 0,
            connects: 0,
            link: None,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the advertised devices.
    pub fn set_devices(&self, devices: Vec<DeviceInfo>) {
        self.lock().devices = devices;
    }

    pub fn set_picker(&self, mode: PickerMode) {
        self.lock().picker = mode;
    }

    /// Make GATT connects fail (`None` restores success).
    pub fn set_connect_failure(&self, reason: Option<&str>) {
        self.lock().connect_failure = reason.map(str::to_string);
    }

    /// Expose a different service/characteristic pair.
    pub fn set_gatt_layout(&self, service: Uuid, characteristic: Uuid) {
        let mut state = self.lock();
        state.service = service;
        state.characteristic = characteristic;
    }

    /// Reject the write attempt with this zero-based index (counted over
    /// the printer's lifetime). One-shot.
    pub fn fail_write(&self, index: usize) {
        let mut state = self.lock();
        state.fail_write_at = Some(state.write_attempts + index);
    }

    /// Simulated time each write takes.
    pub fn set_write_latency(&self, latency: Duration) {
        self.lock().write_latency = latency;
    }

    /// Drop the current link from the printer side (out of range, power off).
    pub fn drop_link(&self) {
        if let Some(link) = self.lock().link.take() {
            link.send_replace(false);
        }
    }

    /// True while the most recent link is open.
    pub fn link_open(&self) -> bool {
        self.lock().link.as_ref().is_some_and(|link| *link.borrow())
    }

    /// Successfully written chunks, in order.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().writes.clone()
    }

    /// All written bytes concatenated.
    pub fn printed(&self) -> Vec<u8> {
        self.lock().writes.iter().flat_map(|w| w.data.clone()).collect()
    }

    pub fn write_attempts(&self) -> usize {
        self.lock().write_attempts
    }

    /// Highest number of overlapping writes seen.
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    /// Number of device-picker requests.
    pub fn requests(&self) -> usize {
        self.lock().requests
    }

    /// Number of GATT connects.
    pub fn connects(&self) -> usize {
        self.lock().connects
    }
}

/// [`BleAdapter`] backed by a [`MockPrinter`].
#[derive(Debug, Clone)]
pub struct MockAdapter {
    printer: MockPrinter,
}

impl MockAdapter {
    pub fn new(printer: MockPrinter) -> Self {
        Self { printer }
    }
}

#[async_trait]
impl BleAdapter for MockAdapter {
    type Link = MockLink;

    async fn request_device(&self, request: &DeviceRequest) -> Result<DeviceInfo, ConnectError> {
        let picker = {
            let mut state = self.printer.lock();
            state.requests += 1;
            state.picker
        };

        match picker {
            PickerMode::Cancel => return Err(ConnectError::Cancelled),
            PickerMode::Hang => std::future::pending::<()>().await,
            PickerMode::Auto => {}
        }

        let state = self.printer.lock();
        if state.service != request.service {
            return Err(ConnectError::NotFound);
        }
        let preferred = request
            .preferred_id
            .as_ref()
            .and_then(|id| state.devices.iter().find(|d| &d.id == id));
        preferred
            .or_else(|| state.devices.first())
            .cloned()
            .ok_or(ConnectError::NotFound)
    }

    async fn connect(&self, device: &DeviceInfo) -> Result<Self::Link, ConnectError> {
        let mut state = self.printer.lock();
        state.connects += 1;
        if let Some(reason) = &state.connect_failure {
            return Err(ConnectError::Gatt(reason.clone()));
        }

        let (tx, _rx) = watch::channel(true);
        let tx = Arc::new(tx);
        state.link = Some(tx.clone());
        debug!(id = %device.id, "Mock printer connected");

        Ok(MockLink {
            printer: self.printer.clone(),
            connected: tx,
        })
    }
}

/// GATT link to a [`MockPrinter`].
#[derive(Debug)]
pub struct MockLink {
    printer: MockPrinter,
    connected: Arc<watch::Sender<bool>>,
}

#[async_trait]
impl GattLink for MockLink {
    type Service = Uuid;
    type Characteristic = Uuid;

    async fn service(&self, uuid: Uuid) -> Result<Uuid, LinkError> {
        if !self.is_connected() {
            return Err(LinkError::Closed);
        }
        if self.printer.lock().service == uuid {
            Ok(uuid)
        } else {
            Err(LinkError::NotFound)
        }
    }

    async fn characteristic(&self, _service: &Uuid, uuid: Uuid) -> Result<Uuid, LinkError> {
        if !self.is_connected() {
            return Err(LinkError::Closed);
        }
        if self.printer.lock().characteristic == uuid {
            Ok(uuid)
        } else {
            Err(LinkError::NotFound)
        }
    }

    async fn write_value(&self, _characteristic: &Uuid, data: &[u8]) -> Result<(), LinkError> {
        let latency = {
            let mut state = self.printer.lock();
            let attempt = state.write_attempts;
            state.write_attempts += 1;

            if !*self.connected.borrow() {
                return Err(LinkError::Closed);
            }
            if state.fail_write_at == Some(attempt) {
                state.fail_write_at = None;
                return Err(LinkError::Backend("GATT operation failed".into()));
            }

            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.write_latency
        };

        let started = Instant::now();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.printer.lock();
        state.in_flight -= 1;
        state.writes.push(WriteRecord {
            data: data.to_vec(),
            started,
            finished: Instant::now(),
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    fn subscribe_disconnect(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    async fn disconnect(&self) {
        self.connected.send_replace(false);
    }
}
