//! Common utilities for device-transport
//!
//! This crate provides what the transport and its plugins share: the device
//! plugin contract, the plugin error type and logging setup.

pub mod error;
pub mod logging;
pub mod plugin;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{Error, Result};
pub use logging::setup_logging;
pub use plugin::{DevicePlugin, PluginDevice};
