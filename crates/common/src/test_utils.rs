//! Test utilities for device-transport
//!
//! Provides a scriptable in-memory [`DevicePlugin`] for exercising the
//! transport without hardware.
//!
//! # Example
//!
//! ```ignore
//! use common::test_utils::MockPlugin;
//! use common::{DevicePlugin, PluginDevice};
//!
//! let plugin = MockPlugin::new().with_devices(vec![PluginDevice::new("1", true)]);
//! let devices = plugin.enumerate().await.unwrap();
//! assert_eq!(devices.len(), 1);
//! assert_eq!(plugin.enumerate_calls(), 1);
//! ```

use crate::plugin::{DevicePlugin, PluginDevice};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A recorded `connect` or `disconnect` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCall {
    pub path: String,
    pub debug: bool,
    /// `exclusive` for connect, `last` for disconnect
    pub flag: bool,
}

/// A recorded `send` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReport {
    pub path: String,
    pub debug: bool,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
struct MockState {
    devices: Vec<PluginDevice>,
    scripted: VecDeque<Vec<PluginDevice>>,
    enumerate_calls: usize,
    init_calls: Vec<bool>,
    device_requests: usize,
    connects: Vec<LinkCall>,
    disconnects: Vec<LinkCall>,
    connect_failures: VecDeque<String>,
    fail_disconnect: bool,
    sent: Vec<SentReport>,
    inbox: HashMap<(String, bool), VecDeque<Vec<u8>>>,
}

/// In-memory plugin with scriptable discovery and per-path reply queues
///
/// `receive` waits until a report is queued with [`MockPlugin::queue_reply`],
/// which makes it easy to hold a call in flight.
#[derive(Debug)]
pub struct MockPlugin {
    version: String,
    allows_write_and_enumerate: bool,
    request_needed: bool,
    state: Mutex<MockState>,
    incoming: Notify,
}

impl Default for MockPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlugin {
    pub fn new() -> Self {
        Self {
            version: "mock-1.0.0".to_string(),
            allows_write_and_enumerate: true,
            request_needed: false,
            state: Mutex::new(MockState::default()),
            incoming: Notify::new(),
        }
    }

    pub fn with_devices(self, devices: Vec<PluginDevice>) -> Self {
        self.state().devices = devices;
        self
    }

    /// Plugin that refuses concurrent write and enumerate
    pub fn without_write_and_enumerate(mut self) -> Self {
        self.allows_write_and_enumerate = false;
        self
    }

    pub fn with_request_needed(mut self) -> Self {
        self.request_needed = true;
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the set of attached devices
    pub fn set_devices(&self, devices: Vec<PluginDevice>) {
        self.state().devices = devices;
    }

    /// Queue a one-off enumeration result, used before the standing device set
    pub fn script_enumeration(&self, devices: Vec<PluginDevice>) {
        self.state().scripted.push_back(devices);
    }

    /// Make the next `connect` fail with a device error
    pub fn fail_next_connect(&self, message: &str) {
        self.state().connect_failures.push_back(message.to_string());
    }

    pub fn set_fail_disconnect(&self, fail: bool) {
        self.state().fail_disconnect = fail;
    }

    /// Queue reports to be returned by `receive` on `path`
    pub fn queue_reply(&self, path: &str, debug: bool, reports: Vec<Vec<u8>>) {
        self.state()
            .inbox
            .entry((path.to_string(), debug))
            .or_default()
            .extend(reports);
        self.incoming.notify_waiters();
    }

    pub fn enumerate_calls(&self) -> usize {
        self.state().enumerate_calls
    }

    pub fn init_calls(&self) -> Vec<bool> {
        self.state().init_calls.clone()
    }

    pub fn device_requests(&self) -> usize {
        self.state().device_requests
    }

    pub fn connects(&self) -> Vec<LinkCall> {
        self.state().connects.clone()
    }

    pub fn disconnects(&self) -> Vec<LinkCall> {
        self.state().disconnects.clone()
    }

    pub fn sent(&self) -> Vec<SentReport> {
        self.state().sent.clone()
    }

    fn take_reply(&self, path: &str, debug: bool) -> Option<Vec<u8>> {
        self.state()
            .inbox
            .get_mut(&(path.to_string(), debug))
            .and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl DevicePlugin for MockPlugin {
    fn name(&self) -> &str {
        "mock"
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn allows_write_and_enumerate(&self) -> bool {
        self.allows_write_and_enumerate
    }

    fn request_needed(&self) -> bool {
        self.request_needed
    }

    async fn init(&self, debug: bool) -> Result<()> {
        self.state().init_calls.push(debug);
        Ok(())
    }

    async fn enumerate(&self) -> Result<Vec<PluginDevice>> {
        let mut state = self.state();
        state.enumerate_calls += 1;
        match state.scripted.pop_front() {
            Some(devices) => Ok(devices),
            None => Ok(state.devices.clone()),
        }
    }

    async fn connect(&self, path: &str, debug: bool, exclusive: bool) -> Result<()> {
        let mut state = self.state();
        state.connects.push(LinkCall {
            path: path.to_string(),
            debug,
            flag: exclusive,
        });
        if let Some(message) = state.connect_failures.pop_front() {
            return Err(Error::Device(message));
        }
        if !state.devices.iter().any(|d| d.path == path) {
            return Err(Error::NotFound(path.to_string()));
        }
        Ok(())
    }

    async fn disconnect(&self, path: &str, debug: bool, last: bool) -> Result<()> {
        let mut state = self.state();
        state.disconnects.push(LinkCall {
            path: path.to_string(),
            debug,
            flag: last,
        });
        if state.fail_disconnect {
            return Err(Error::Disconnected(path.to_string()));
        }
        Ok(())
    }

    async fn send(&self, path: &str, data: &[u8], debug: bool) -> Result<()> {
        self.state().sent.push(SentReport {
            path: path.to_string(),
            debug,
            data: data.to_vec(),
        });
        Ok(())
    }

    async fn receive(&self, path: &str, debug: bool) -> Result<Vec<u8>> {
        loop {
            let notified = self.incoming.notified();
            if let Some(report) = self.take_reply(path, debug) {
                return Ok(report);
            }
            notified.await;
        }
    }

    async fn request_device(&self) -> Result<()> {
        self.state().device_requests += 1;
        Ok(())
    }
}

/// Run a future with a timeout, panicking with context if it elapses
pub async fn with_timeout<F, T>(future: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(DEFAULT_TEST_TIMEOUT, future).await {
        Ok(value) => value,
        Err(_) => panic!("operation timed out after {:?}", DEFAULT_TEST_TIMEOUT),
    }
}
