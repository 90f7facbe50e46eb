//! Enumeration engine
//!
//! Merges plugin discovery with registry state and detects vanished devices.
//! This is the only place where session loss is noticed: every session bound
//! to a path missing from the discovery result is force-released before the
//! snapshot is handed back.

use crate::registry::SessionRegistry;
use crate::session::{Session, SessionClass};
use common::PluginDevice;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// Externally visible enumeration record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub path: String,
    /// Normal session bound to the path
    pub session: Option<Session>,
    /// Whether the device exposes a debug link
    pub debug: bool,
    /// Debug session bound to the path
    #[serde(rename = "debugSession")]
    pub debug_session: Option<Session>,
}

/// Sort descriptors by path
///
/// Numeric when every path parses cleanly as an integer, lexicographic
/// otherwise. Deciding once per list keeps the ordering total when numeric and
/// non-numeric paths are mixed.
pub fn sort_by_path(descriptors: &mut [DeviceDescriptor]) {
    let numeric = descriptors.iter().all(|d| d.path.parse::<i64>().is_ok());
    if numeric {
        descriptors
            .sort_by_cached_key(|d| (d.path.parse::<i64>().unwrap_or_default(), d.path.clone()));
    } else {
        descriptors.sort_by(|a, b| a.path.cmp(&b.path));
    }
}

/// Build descriptors for `devices` and force-release sessions on vanished paths
///
/// Duplicate paths in the discovery result collapse into one descriptor.
/// Returned descriptors are sorted with [`sort_by_path`].
pub fn reconcile(
    devices: &[PluginDevice],
    registry: &mut SessionRegistry,
) -> Vec<DeviceDescriptor> {
    let mut seen = HashSet::with_capacity(devices.len());
    let mut descriptors: Vec<DeviceDescriptor> = Vec::with_capacity(devices.len());

    for device in devices {
        if !seen.insert(device.path.as_str()) {
            if let Some(existing) = descriptors.iter_mut().find(|d| d.path == device.path) {
                existing.debug |= device.debug;
            }
            continue;
        }
        descriptors.push(DeviceDescriptor {
            path: device.path.clone(),
            session: registry.current(&device.path, SessionClass::Normal),
            debug: device.debug,
            debug_session: registry.current(&device.path, SessionClass::Debug),
        });
    }

    for class in SessionClass::ALL {
        for path in registry.bound_paths(class) {
            if seen.contains(path.as_str()) {
                continue;
            }
            if let Some(session) = registry.forced_release(&path, class) {
                info!(
                    "Device {} disappeared, released {} session {}",
                    path, class, session
                );
            }
        }
    }

    sort_by_path(&mut descriptors);
    descriptors
}
