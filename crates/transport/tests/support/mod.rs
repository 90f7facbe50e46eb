//! Shared fixtures for transport integration tests

#![allow(dead_code)]

use common::PluginDevice;
use common::test_utils::MockPlugin;
use protocol::integrity::seal;
use protocol::{Schema, parse_configure};
use serde_json::{Value, json};
use std::sync::Arc;
use transport::Transport;

pub fn schema_body() -> Value {
    json!({
        "version": { "major": 1, "minor": 0 },
        "messages": [
            { "name": "Initialize", "id": 0 },
            { "name": "Ping", "id": 1, "fields": [
                { "name": "message", "kind": "string", "optional": true }
            ]},
            { "name": "Success", "id": 2, "fields": [
                { "name": "message", "kind": "string", "optional": true }
            ]},
            { "name": "ButtonRequest", "id": 26, "fields": [
                { "name": "code", "kind": "uint32", "optional": true }
            ]},
            { "name": "ButtonAck", "id": 27 },
            { "name": "DebugLinkDecision", "id": 100, "fields": [
                { "name": "yes_no", "kind": "bool" }
            ]}
        ]
    })
}

/// Configuration blob accepted by `Transport::configure`
pub fn config_blob() -> String {
    seal(&schema_body().to_string())
}

pub fn schema() -> Schema {
    parse_configure(&config_blob()).expect("fixture schema parses")
}

/// Reports a device would send back for `name` with `payload`
pub fn device_reply(name: &str, payload: Value) -> Vec<Vec<u8>> {
    protocol::build_reports(&schema(), name, &payload).expect("fixture reply encodes")
}

pub fn devices(paths: &[(&str, bool)]) -> Vec<PluginDevice> {
    paths
        .iter()
        .map(|(path, debug)| PluginDevice::new(*path, *debug))
        .collect()
}

pub fn setup(paths: &[(&str, bool)]) -> (Arc<MockPlugin>, Arc<Transport>) {
    let plugin = Arc::new(MockPlugin::new().with_devices(devices(paths)));
    let transport = Arc::new(Transport::new(plugin.clone()).expect("transport builds"));
    (plugin, transport)
}

/// Yield until the mock has recorded `count` sent reports
pub async fn wait_for_sent(plugin: &MockPlugin, count: usize) {
    common::test_utils::with_timeout(async {
        while plugin.sent().len() < count {
            tokio::task::yield_now().await;
        }
    })
    .await;
}
