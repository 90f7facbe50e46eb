//! Common error types

use thiserror::Error;

/// Errors raised by device plugins
#[derive(Debug, Error)]
pub enum Error {
    #[error("Device error: {0}")]
    Device(String),

    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Device disconnected: {0}")]
    Disconnected(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
