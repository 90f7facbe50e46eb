//! Protocol error types

use thiserror::Error;

/// Protocol-level errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Serialization error from postcard
    #[error("Serialization error: {0}")]
    Serialization(#[from] postcard::Error),

    /// Configuration body is not valid JSON for a schema document
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration checksum did not match its body
    #[error("Configuration checksum mismatch: expected {expected:08x}, computed {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// Incompatible schema version detected
    #[error(
        "Incompatible protocol version: {major}.{minor} (expected {expected_major}.{expected_minor})"
    )]
    IncompatibleVersion {
        major: u8,
        minor: u8,
        expected_major: u8,
        expected_minor: u8,
    },

    /// Message name not present in the schema
    #[error("Unknown message type: {0}")]
    UnknownMessage(String),

    /// Message id not present in the schema
    #[error("Unknown message id: {0}")]
    UnknownMessageId(u16),

    /// Payload carries a field the message does not define
    #[error("Unknown field {field} in message {message}")]
    UnknownField { message: String, field: String },

    /// Payload lacks a required field
    #[error("Missing field {field} in message {message}")]
    MissingField { message: String, field: String },

    /// Payload value does not match the declared field kind
    #[error("Invalid value for field {field} in message {message}: expected {expected}")]
    InvalidField {
        message: String,
        field: String,
        expected: &'static str,
    },

    /// Payload is not a JSON object
    #[error("Payload for message {0} must be an object")]
    PayloadNotObject(String),

    /// Decoded payload had bytes left over
    #[error("Trailing bytes after message {message}: {remaining}")]
    TrailingBytes { message: String, remaining: usize },

    /// Report does not carry the expected magic header
    #[error("Malformed frame: {0}")]
    MalformedFrame(&'static str),

    /// Message length exceeds maximum allowed size
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Transport used before `configure`
    #[error("Transport not configured")]
    NotConfigured,
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
