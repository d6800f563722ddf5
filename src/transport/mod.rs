//! # Printer Transport Layer
//!
//! A small capability interface over BLE GATT, so the session manager and
//! transfer engine never talk to a concrete Bluetooth stack.
//!
//! | Capability | Method |
//! |------------|--------|
//! | device picker | [`BleAdapter::request_device`] |
//! | GATT connect | [`BleAdapter::connect`] |
//! | service lookup | [`GattLink::service`] |
//! | characteristic lookup | [`GattLink::characteristic`] |
//! | write | [`GattLink::write_value`] |
//! | disconnect events | [`GattLink::subscribe_disconnect`] |
//!
//! ## Available Backends
//!
//! - [`mock`]: in-memory printer for tests and `--simulate`
//! - `btleplug`: real BLE via btleplug (feature `ble`)

pub mod mock;

#[cfg(feature = "ble")]
pub mod btleplug;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use uuid::{Uuid, uuid};

use crate::error::ConnectError;

/// Printer service advertised by common BLE ESC/POS printers.
pub const DEFAULT_SERVICE_UUID: Uuid = uuid!("000018f0-0000-1000-8000-00805f9b34fb");

/// Write characteristic under [`DEFAULT_SERVICE_UUID`].
pub const DEFAULT_CHARACTERISTIC_UUID: Uuid = uuid!("00002af1-0000-1000-8000-00805f9b34fb");

/// Identity of a discovered device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
}

/// Filter for the device picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequest {
    /// Only devices advertising this service are offered.
    pub service: Uuid,
    /// Last known printer; offered first when it is in range.
    pub preferred_id: Option<String>,
}

/// Failure reported by a GATT link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("link is closed")]
    Closed,

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Backend(String),
}

/// Entry point of a BLE stack: discovery and connection.
#[async_trait]
pub trait BleAdapter: Send + Sync + 'static {
    type Link: GattLink;

    /// Ask for a device advertising `request.service`.
    ///
    /// This may wait on a human choosing a device; callers bound it with a
    /// timeout.
    async fn request_device(&self, request: &DeviceRequest) -> Result<DeviceInfo, ConnectError>;

    /// Open the GATT link to a device returned by `request_device`.
    async fn connect(&self, device: &DeviceInfo) -> Result<Self::Link, ConnectError>;
}

/// An open GATT connection.
#[async_trait]
pub trait GattLink: Send + Sync + 'static {
    type Service: Clone + Send + Sync + 'static;
    type Characteristic: Clone + Send + Sync + 'static;

    async fn service(&self, uuid: Uuid) -> Result<Self::Service, LinkError>;

    async fn characteristic(
        &self,
        service: &Self::Service,
        uuid: Uuid,
    ) -> Result<Self::Characteristic, LinkError>;

    /// Write one chunk; resolves when the stack accepted it.
    async fn write_value(
        &self,
        characteristic: &Self::Characteristic,
        data: &[u8],
    ) -> Result<(), LinkError>;

    fn is_connected(&self) -> bool;

    /// Connection-state channel: the value flips to `false` once, when the
    /// link drops for any reason.
    fn subscribe_disconnect(&self) -> watch::Receiver<bool>;

    /// Close the link. Idempotent.
    async fn disconnect(&self);
}

/// Placeholder adapter used when no BLE backend is compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unavailable;

#[async_trait]
impl BleAdapter for Unavailable {
    type Link = NoLink;

    async fn request_device(&self, _request: &DeviceRequest) -> Result<DeviceInfo, ConnectError> {
        Err(ConnectError::AdapterUnavailable(
            "no BLE backend compiled in (build with --features ble or use --simulate)".into(),
        ))
    }

    async fn connect(&self, _device: &DeviceInfo) -> Result<Self::Link, ConnectError> {
        Err(ConnectError::AdapterUnavailable(
            "no BLE backend compiled in".into(),
        ))
    }
}

/// Link type of [`Unavailable`]. It has no values, so no link ever exists.
#[derive(Debug)]
pub enum NoLink {}

#[async_trait]
impl GattLink for NoLink {
    type Service = ();
    type Characteristic = ();

    async fn service(&self, _uuid: Uuid) -> Result<(), LinkError> {
        match *self {}
    }

    async fn characteristic(&self, _service: &(), _uuid: Uuid) -> Result<(), LinkError> {
        match *self {}
    }

    async fn write_value(&self, _characteristic: &(), _data: &[u8]) -> Result<(), LinkError> {
        match *self {}
    }

    fn is_connected(&self) -> bool {
        match *self {}
    }

    fn subscribe_disconnect(&self) -> watch::Receiver<bool> {
        match *self {}
    }

    async fn disconnect(&self) {
        match *self {}
    }
}
