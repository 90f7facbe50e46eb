//! Change poller
//!
//! Long-poll over the enumeration engine. Instead of relying on device change
//! notifications from the plugin, `listen` enumerates in rounds until the
//! canonical form of the snapshot differs from the caller's baseline or the
//! round budget is spent.
//!
//! Only `(path, session)` pairs take part in the comparison. Debug capability
//! and debug sessions never wake a listener.

use crate::enumerate::DeviceDescriptor;
use crate::error::Result;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tracing::trace;

/// Default number of enumeration rounds per `listen`
pub const ITER_MAX: u32 = 60;

/// Default delay between rounds
pub const ITER_DELAY: Duration = Duration::from_millis(500);

/// Canonical serialization of a snapshot
///
/// `None` serializes as `null`. Object keys are emitted in sorted order, so
/// the result does not depend on field ordering.
pub fn canonical(devices: Option<&[DeviceDescriptor]>) -> String {
    let Some(devices) = devices else {
        return Value::Null.to_string();
    };

    let pure: Vec<Value> = devices
        .iter()
        .map(|device| {
            let mut entry = Map::new();
            entry.insert("path".to_string(), Value::from(device.path.as_str()));
            entry.insert(
                "session".to_string(),
                device
                    .session
                    .map(|s| Value::from(s.to_string()))
                    .unwrap_or(Value::Null),
            );
            Value::Object(entry)
        })
        .collect();

    Value::Array(pure).to_string()
}

/// Bounded long-poll state
#[derive(Debug)]
pub struct ChangePoller {
    iter_max: u32,
    iter_delay: Duration,
    /// Canonical form of the last snapshot handed out
    last: Mutex<String>,
}

impl Default for ChangePoller {
    fn default() -> Self {
        Self::new(ITER_MAX, ITER_DELAY)
    }
}

impl ChangePoller {
    pub fn new(iter_max: u32, iter_delay: Duration) -> Self {
        Self {
            iter_max: iter_max.max(1),
            iter_delay,
            last: Mutex::new(String::new()),
        }
    }

    pub fn iter_max(&self) -> u32 {
        self.iter_max
    }

    pub fn iter_delay(&self) -> Duration {
        self.iter_delay
    }

    fn last(&self) -> String {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn remember(&self, stringified: String) {
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = stringified;
    }

    /// Enumerate until the snapshot changes or the round budget is spent
    ///
    /// Without `previous`, the baseline is the last snapshot this poller
    /// returned. A change on the first round returns without any delay.
    pub async fn listen<F, Fut>(
        &self,
        previous: Option<&[DeviceDescriptor]>,
        mut enumerate: F,
    ) -> Result<Vec<DeviceDescriptor>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Vec<DeviceDescriptor>>>,
    {
        let mut baseline = match previous {
            Some(devices) => canonical(Some(devices)),
            None => self.last(),
        };

        let mut round = 1;
        loop {
            let devices = enumerate().await?;
            let stringified = canonical(Some(&devices));

            if stringified != baseline || round >= self.iter_max {
                trace!(round, changed = stringified != baseline, "listen finished");
                self.remember(stringified);
                return Ok(devices);
            }

            tokio::time::sleep(self.iter_delay).await;
            baseline = stringified;
            round += 1;
        }
    }
}
