//! Decoded device messages

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message received from the device, decoded against the active schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageFromDevice {
    /// Schema name of the message
    #[serde(rename = "type")]
    pub type_name: String,
    /// Decoded fields
    pub message: Value,
}
