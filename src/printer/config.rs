//! # Printer Configuration
//!
//! Device-side settings (which GATT endpoints to use, how to pace writes,
//! how long to wait) and the application [`Settings`] file.
//!
//! ## Usage
//!
//! ```
//! use escble::printer::PrinterConfig;
//!
//! let config = PrinterConfig::default();
//! println!("Writing {} byte chunks every {:?}",
//!          config.chunk_size,
//!          config.chunk_delay());
//! ```
//!
//! ## Settings File
//!
//! Every field is optional; missing ones take their defaults.
//!
//! ```json
//! {
//!   "printer": { "chunkSize": 100, "chunkDelayMs": 30 },
//!   "store": { "name": "CORNER CAFE", "currency": { "marker": "Rp", "decimals": 0 } },
//!   "statePath": "escble-state.json"
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PrintError;
use crate::receipt::format::StoreProfile;
use crate::transport::{DEFAULT_CHARACTERISTIC_UUID, DEFAULT_SERVICE_UUID};

/// # Printer Configuration
///
/// ## Bluetooth Tuning
///
/// - **chunk_size**: Maximum bytes per characteristic write. 180 fits the
///   common 185-byte ATT MTU; printers stuck at the default MTU need 20.
/// - **chunk_delay_ms**: Pause between writes so the printer's receive
///   buffer can drain.
///
/// ## Timeouts
///
/// - **discovery_timeout_secs**: How long the device picker may stay open.
/// - **connect_timeout_secs**: How long the GATT connect may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrinterConfig {
    /// Service the printer advertises; discovery is filtered on it.
    pub service_uuid: Uuid,

    /// Write characteristic under `service_uuid`.
    pub characteristic_uuid: Uuid,

    /// Maximum bytes per write.
    pub chunk_size: usize,

    /// Delay between writes (milliseconds).
    pub chunk_delay_ms: u64,

    pub discovery_timeout_secs: u64,

    pub connect_timeout_secs: u64,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            service_uuid: DEFAULT_SERVICE_UUID,
            characteristic_uuid: DEFAULT_CHARACTERISTIC_UUID,
            chunk_size: 180,
            chunk_delay_ms: 20,
            discovery_timeout_secs: 60,
            connect_timeout_secs: 15,
        }
    }
}

impl PrinterConfig {
    #[inline]
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    #[inline]
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Reject values that cannot work on any printer.
    pub fn validate(&self) -> Result<(), PrintError> {
        if self.chunk_size == 0 {
            return Err(PrintError::Config("chunkSize must be at least 1".into()));
        }
        if self.chunk_size > 512 {
            return Err(PrintError::Config(format!(
                "chunkSize {} exceeds the 512-byte GATT attribute limit",
                self.chunk_size
            )));
        }
        if self.discovery_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(PrintError::Config("timeouts must be non-zero".into()));
        }
        Ok(())
    }
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub printer: PrinterConfig,
    pub store: StoreProfile,
    /// File holding the persisted printer record.
    pub state_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            printer: PrinterConfig::default(),
            store: StoreProfile::default(),
            state_path: PathBuf::from("escble-state.json"),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, PrintError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
            .map_err(|e| PrintError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(raw: &str) -> Result<Self, PrintError> {
        let settings: Self =
            serde_json::from_str(raw).map_err(|e| PrintError::Config(e.to_string()))?;
        settings.printer.validate()?;
        Ok(settings)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PrinterConfig::default();
        assert_eq!(config.chunk_size, 180);
        assert_eq!(config.chunk_delay(), Duration::from_millis(20));
        assert_eq!(config.discovery_timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_settings_take_defaults() {
        let settings = Settings::from_json(
            r#"{"printer": {"chunkSize": 20}, "store": {"name": "KOPI"}}"#,
        )
        .unwrap();
        assert_eq!(settings.printer.chunk_size, 20);
        assert_eq!(settings.printer.chunk_delay_ms, 20);
        assert_eq!(settings.store.name, "KOPI");
        assert_eq!(settings.store.currency.marker, "$");
        assert_eq!(settings.state_path, PathBuf::from("escble-state.json"));
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(Settings::from_json("{}").unwrap(), Settings::default());
    }

    #[test]
    fn test_invalid_chunk_size() {
        let err = Settings::from_json(r#"{"printer": {"chunkSize": 0}}"#).unwrap_err();
        assert!(matches!(err, PrintError::Config(_)));

        let config = PrinterConfig {
            chunk_size: 600,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_custom_uuids() {
        let settings = Settings::from_json(
            r#"{"printer": {"serviceUuid": "49535343-fe7d-4ae5-8fa9-9fafd205e455"}}"#,
        )
        .unwrap();
        assert_eq!(
            settings.printer.service_uuid.to_string(),
            "49535343-fe7d-4ae5-8fa9-9fafd205e455"
        );
    }
}
