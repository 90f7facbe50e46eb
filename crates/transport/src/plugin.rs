//! Plugin adapter
//!
//! Wraps a [`DevicePlugin`] and gives the transport one place where plugin
//! calls are issued, logged and mapped into [`TransportError`].

use crate::error::{Result, TransportError};
use crate::session::SessionClass;
use common::{DevicePlugin, PluginDevice};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Checked handle to the device plugin
#[derive(Clone)]
pub struct PluginAdapter {
    inner: Arc<dyn DevicePlugin>,
}

impl std::fmt::Debug for PluginAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginAdapter")
            .field("name", &self.inner.name())
            .field("version", &self.inner.version())
            .finish()
    }
}

impl PluginAdapter {
    /// Wrap `plugin`, refusing plugins that cannot write while enumerating
    pub fn new(plugin: Arc<dyn DevicePlugin>) -> Result<Self> {
        if !plugin.allows_write_and_enumerate() {
            return Err(TransportError::Setup(format!(
                "Plugin {} with shared connections cannot disallow write and enumerate",
                plugin.name()
            )));
        }
        Ok(Self { inner: plugin })
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn version(&self) -> &str {
        self.inner.version()
    }

    pub fn request_needed(&self) -> bool {
        self.inner.request_needed()
    }

    pub async fn init(&self, debug_link: bool) -> Result<()> {
        debug!("Initializing plugin {} (debug: {})", self.name(), debug_link);
        Ok(self.inner.init(debug_link).await?)
    }

    pub async fn enumerate(&self) -> Result<Vec<PluginDevice>> {
        let devices = self.inner.enumerate().await?;
        trace!("Plugin reported {} devices", devices.len());
        Ok(devices)
    }

    pub async fn connect(&self, path: &str, class: SessionClass) -> Result<()> {
        debug!("Connecting {} ({})", path, class);
        Ok(self.inner.connect(path, class.is_debug(), true).await?)
    }

    /// Disconnect, logging and dropping any failure
    ///
    /// Used after a session is already logically released.
    pub async fn disconnect_quietly(&self, path: &str, class: SessionClass) {
        if let Err(e) = self.inner.disconnect(path, class.is_debug(), true).await {
            warn!("Ignoring disconnect failure on {} ({}): {}", path, class, e);
        }
    }

    pub async fn send(&self, path: &str, data: &[u8], class: SessionClass) -> Result<()> {
        trace!("Sending {} bytes to {} ({})", data.len(), path, class);
        Ok(self.inner.send(path, data, class.is_debug()).await?)
    }

    pub async fn receive(&self, path: &str, class: SessionClass) -> Result<Vec<u8>> {
        let data = self.inner.receive(path, class.is_debug()).await?;
        trace!("Received {} bytes from {} ({})", data.len(), path, class);
        Ok(data)
    }

    pub async fn request_device(&self) -> Result<()> {
        Ok(self.inner.request_device().await?)
    }
}
