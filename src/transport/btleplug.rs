//! # btleplug Backend
//!
//! Real BLE via the platform stack (BlueZ, CoreBluetooth, WinRT).
//!
//! There is no interactive picker on the command line: discovery scans for
//! devices advertising the printer service and picks the remembered printer
//! when it shows up within the scan window, otherwise the first match.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{BleAdapter, DeviceInfo, DeviceRequest, GattLink, LinkError};
use crate::error::ConnectError;

/// How long to keep scanning for the remembered printer.
const SCAN_WINDOW: Duration = Duration::from_secs(10);

pub struct BtleAdapter {
    adapter: Adapter,
    scan_window: Duration,
}

impl BtleAdapter {
    /// Open the first BLE adapter on this machine.
    pub async fn new() -> Result<Self, ConnectError> {
        let manager = Manager::new()
            .await
            .map_err(|e| ConnectError::AdapterUnavailable(e.to_string()))?;

        let adapter = manager
            .adapters()
            .await
            .map_err(|e| ConnectError::AdapterUnavailable(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| ConnectError::AdapterUnavailable("no BLE adapter found".into()))?;

        Ok(Self {
            adapter,
            scan_window: SCAN_WINDOW,
        })
    }

    async fn find_peripheral(&self, id: &str) -> Result<Peripheral, ConnectError> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| ConnectError::Gatt(e.to_string()))?;
        peripherals
            .into_iter()
            .find(|p| p.id().to_string() == id)
            .ok_or(ConnectError::NotFound)
    }

    async fn scan(&self, request: &DeviceRequest) -> Result<Option<DeviceInfo>, ConnectError> {
        let mut events = self
            .adapter
            .events()
            .await
            .map_err(|e| ConnectError::AdapterUnavailable(e.to_string()))?;

        self.adapter
            .start_scan(ScanFilter {
                services: vec![request.service],
            })
            .await
            .map_err(|e| ConnectError::AdapterUnavailable(e.to_string()))?;

        let deadline = tokio::time::sleep(self.scan_window);
        tokio::pin!(deadline);

        let mut first = None;
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                event = events.next() => {
                    let Some(event) = event else { break };
                    let CentralEvent::DeviceDiscovered(id) = event else { continue };
                    let Ok(peripheral) = self.adapter.peripheral(&id).await else { continue };
                    let Ok(Some(props)) = peripheral.properties().await else { continue };
                    if !props.services.contains(&request.service) {
                        continue;
                    }

                    let device = DeviceInfo {
                        id: id.to_string(),
                        name: props.local_name.unwrap_or_else(|| id.to_string()),
                    };
                    debug!(id = %device.id, name = %device.name, "Discovered printer");

                    if request.preferred_id.as_deref() == Some(device.id.as_str()) {
                        first = Some(device);
                        break;
                    }
                    if request.preferred_id.is_none() {
                        first = Some(device);
                        break;
                    }
                    first.get_or_insert(device);
                }
            }
        }

        if let Err(e) = self.adapter.stop_scan().await {
            warn!(error = %e, "Failed to stop BLE scan");
        }
        Ok(first)
    }
}

#[async_trait]
impl BleAdapter for BtleAdapter {
    type Link = BtleLink;

    async fn request_device(&self, request: &DeviceRequest) -> Result<DeviceInfo, ConnectError> {
        info!(service = %request.service, "Scanning for printers");
        self.scan(request).await?.ok_or(ConnectError::NotFound)
    }

    async fn connect(&self, device: &DeviceInfo) -> Result<Self::Link, ConnectError> {
        let peripheral = self.find_peripheral(&device.id).await?;

        peripheral
            .connect()
            .await
            .map_err(|e| ConnectError::Gatt(e.to_string()))?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| ConnectError::Gatt(e.to_string()))?;

        let events = self
            .adapter
            .events()
            .await
            .map_err(|e| ConnectError::Gatt(e.to_string()))?;

        let (tx, _) = watch::channel(true);
        let tx = Arc::new(tx);
        let target = peripheral.id();
        let state = tx.clone();
        let watcher = tokio::spawn(async move {
            let mut events = events;
            while let Some(event) = events.next().await {
                if matches!(event, CentralEvent::DeviceDisconnected(ref id) if *id == target) {
                    break;
                }
            }
            state.send_replace(false);
        });

        Ok(BtleLink {
            peripheral,
            connected: tx,
            watcher,
        })
    }
}

/// Connected btleplug peripheral.
pub struct BtleLink {
    peripheral: Peripheral,
    connected: Arc<watch::Sender<bool>>,
    watcher: JoinHandle<()>,
}

impl Drop for BtleLink {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

#[async_trait]
impl GattLink for BtleLink {
    type Service = Uuid;
    type Characteristic = Characteristic;

    async fn service(&self, uuid: Uuid) -> Result<Self::Service, LinkError> {
        self.peripheral
            .services()
            .iter()
            .find(|s| s.uuid == uuid)
            .map(|s| s.uuid)
            .ok_or(LinkError::NotFound)
    }

    async fn characteristic(
        &self,
        service: &Self::Service,
        uuid: Uuid,
    ) -> Result<Self::Characteristic, LinkError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.service_uuid == *service && c.uuid == uuid)
            .ok_or(LinkError::NotFound)
    }

    async fn write_value(
        &self,
        characteristic: &Self::Characteristic,
        data: &[u8],
    ) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::Closed);
        }
        self.peripheral
            .write(characteristic, data, WriteType::WithoutResponse)
            .await
            .map_err(|e| LinkError::Backend(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    fn subscribe_disconnect(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    async fn disconnect(&self) {
        if !self.connected.send_replace(false) {
            return;
        }
        if let Err(e) = self.peripheral.disconnect().await {
            warn!(error = %e, "BLE disconnect failed");
        }
    }
}
