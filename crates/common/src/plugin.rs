//! Device plugin contract
//!
//! A plugin owns the byte-level link to physical devices (USB, HID, bridge
//! daemon, emulator). It knows nothing about sessions: the transport layers
//! session bookkeeping, framing and cancellation on top of it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A device reported by plugin discovery
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginDevice {
    /// Stable plugin-assigned identifier of one physical device
    pub path: String,
    /// Whether the device exposes a debug link
    pub debug: bool,
}

impl PluginDevice {
    pub fn new(path: impl Into<String>, debug: bool) -> Self {
        Self {
            path: path.into(),
            debug,
        }
    }
}

/// Raw per-path device access
///
/// The `debug` flag on each operation selects the debug link of the device
/// instead of the normal one. One physical device is addressed by one path.
#[async_trait]
pub trait DevicePlugin: Send + Sync {
    /// Plugin name used in logs
    fn name(&self) -> &str;

    /// Informational version string
    fn version(&self) -> &str;

    /// Whether writes and enumeration may be issued concurrently
    ///
    /// The transport only works with plugins that return `true`.
    fn allows_write_and_enumerate(&self) -> bool;

    /// Whether the user must grant access via [`DevicePlugin::request_device`] first
    fn request_needed(&self) -> bool {
        false
    }

    async fn init(&self, debug: bool) -> crate::Result<()>;

    /// List currently attached devices
    async fn enumerate(&self) -> crate::Result<Vec<PluginDevice>>;

    /// Open the device at `path`
    async fn connect(&self, path: &str, debug: bool, exclusive: bool) -> crate::Result<()>;

    /// Close the device at `path`
    async fn disconnect(&self, path: &str, debug: bool, last: bool) -> crate::Result<()>;

    /// Write one report
    async fn send(&self, path: &str, data: &[u8], debug: bool) -> crate::Result<()>;

    /// Read one report, waiting until one arrives
    async fn receive(&self, path: &str, debug: bool) -> crate::Result<Vec<u8>>;

    /// Ask the platform to grant access to a device
    async fn request_device(&self) -> crate::Result<()> {
        Ok(())
    }
}
