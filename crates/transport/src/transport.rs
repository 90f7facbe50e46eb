//! Shared-session transport
//!
//! [`Transport`] turns a single-consumer [`DevicePlugin`] into a multi-session
//! client: normal and debug sessions per device, change-aware discovery, and
//! framed calls that are cancelled when their session goes away.
//!
//! All registry mutation happens under one mutex that is never held across an
//! await point. Enumeration reconciles discovery with the registry inside a
//! single critical section, and acquire re-checks the optimistic lock after the
//! plugin connect, so a session is never bound to a path while that path is
//! being swept.

use crate::config::TransportConfig;
use crate::enumerate::{DeviceDescriptor, reconcile};
use crate::error::{Result, TransportError};
use crate::listen::ChangePoller;
use crate::plugin::PluginAdapter;
use crate::registry::SessionRegistry;
use crate::session::{Session, SessionClass};
use crate::trace::logged;
use common::DevicePlugin;
use protocol::Schema;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, info};

/// Multi-session transport over a device plugin
#[derive(Debug)]
pub struct Transport {
    pub(crate) plugin: PluginAdapter,
    registry: Mutex<SessionRegistry>,
    poller: ChangePoller,
    /// Message definitions installed by `configure`
    pub(crate) schema: RwLock<Option<Arc<Schema>>>,
    verbose: AtomicBool,
    request_needed: AtomicBool,
    stopped: AtomicBool,
}

impl Transport {
    /// Transport name reported to callers
    pub const NAME: &'static str = "SharedSessionTransport";

    /// Create a transport with default settings
    pub fn new(plugin: Arc<dyn DevicePlugin>) -> Result<Self> {
        Self::with_config(plugin, &TransportConfig::default())
    }

    /// Create a transport
    ///
    /// Fails if `config` is invalid or the plugin cannot serve writes while
    /// enumerating. The first transport in the process installs the codec
    /// limits from `config`.
    pub fn with_config(plugin: Arc<dyn DevicePlugin>, config: &TransportConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| TransportError::Config(e.to_string()))?;
        let plugin = PluginAdapter::new(plugin)?;

        if !protocol::codec::install(config.codec.limits()) {
            debug!("Codec limits already installed, keeping existing limits");
        }

        info!(
            "Transport over plugin {} v{} (poll: {} x {:?})",
            plugin.name(),
            plugin.version(),
            config.poll.iter_max,
            config.poll.iter_delay()
        );

        Ok(Self {
            plugin,
            registry: Mutex::new(SessionRegistry::new()),
            poller: ChangePoller::new(config.poll.iter_max, config.poll.iter_delay()),
            schema: RwLock::new(None),
            verbose: AtomicBool::new(config.logging.verbose),
            request_needed: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    pub(crate) fn registry(&self) -> MutexGuard<'_, SessionRegistry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Version string of the underlying plugin
    pub fn version(&self) -> &str {
        self.plugin.version()
    }

    pub fn is_configured(&self) -> bool {
        self.schema
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    /// Whether the plugin needs `request_device` before devices show up
    ///
    /// Copied from the plugin by `init`.
    pub fn request_needed(&self) -> bool {
        self.request_needed.load(Ordering::Relaxed)
    }

    /// A plugin-backed transport has no bridge to go out of date
    pub fn is_outdated(&self) -> bool {
        false
    }

    /// Accepted for interface parity with bridge transports; ignored
    pub fn set_latest_bridge_url(&self, _url: &str) {}

    /// Session currently bound to `path`
    pub fn current_session(&self, path: &str, class: SessionClass) -> Option<Session> {
        self.registry().current(path, class)
    }

    /// List devices, joining in bound sessions
    ///
    /// Sessions on devices that are no longer reported are released before
    /// this returns.
    pub async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        logged(self.verbose(), "enumerate", self.silent_enumerate()).await
    }

    pub(crate) async fn silent_enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        let devices = self.plugin.enumerate().await?;
        Ok(reconcile(&devices, &mut self.registry()))
    }

    /// Wait for the device list to change
    ///
    /// Returns as soon as the `(path, session)` content differs from
    /// `previous` (or from the last snapshot returned, when `previous` is
    /// `None`), or after the poller's round budget is spent.
    pub async fn listen(
        &self,
        previous: Option<&[DeviceDescriptor]>,
    ) -> Result<Vec<DeviceDescriptor>> {
        logged(
            self.verbose(),
            "listen",
            self.poller.listen(previous, || self.silent_enumerate()),
        )
        .await
    }

    /// Open a session on `path`
    ///
    /// `previous` must be the session currently on record for the path in
    /// `class` (`None` if there is none); anything else is a conflict.
    pub async fn acquire(
        &self,
        path: &str,
        previous: Option<Session>,
        class: SessionClass,
    ) -> Result<Session> {
        logged(self.verbose(), "acquire", async {
            self.registry().check_previous(path, previous, class)?;

            self.plugin.connect(path, class).await?;

            // Another acquire may have bound the path while we were connecting
            let mut registry = self.registry();
            registry.check_previous(path, previous, class)?;
            Ok(registry.bind(path, class))
        })
        .await
    }

    /// Close `session`
    ///
    /// In-flight calls on the session fail with `DeviceLost`. The plugin is
    /// disconnected afterwards and disconnect failures are ignored.
    pub async fn release(&self, session: Session, class: SessionClass, on_close: bool) -> Result<()> {
        logged(self.verbose(), "release", async {
            let path = self.registry().release(session, class)?;
            debug!(
                "Disconnecting {} after release of {} (on close: {})",
                path, session, on_close
            );
            self.plugin.disconnect_quietly(&path, class).await;
            Ok(())
        })
        .await
    }

    /// Initialize the plugin; `debug` turns on verbose operation logging
    pub async fn init(&self, debug: bool) -> Result<()> {
        self.verbose.store(debug, Ordering::Relaxed);
        self.request_needed
            .store(self.plugin.request_needed(), Ordering::Relaxed);
        logged(self.verbose(), "init", self.plugin.init(debug)).await
    }

    /// Ask the platform to grant access to a device
    pub async fn request_device(&self) -> Result<()> {
        logged(self.verbose(), "request_device", self.plugin.request_device()).await
    }

    /// Mark the transport stopped
    ///
    /// Operations issued afterwards carry no guarantees.
    pub fn stop(&self) {
        info!("Transport stopped");
        self.stopped.store(true, Ordering::Relaxed);
    }
}
