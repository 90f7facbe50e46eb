//! Transport error types

use crate::session::Session;
use protocol::ProtocolError;
use thiserror::Error;

/// Session bookkeeping failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Trying to double release session {0}")]
    DoubleRelease(Session),

    #[error("Session {0} not available")]
    NotAvailable(Session),
}

/// Errors surfaced by [`crate::Transport`] operations
#[derive(Debug, Error)]
pub enum TransportError {
    /// Acquire presented a session that is not the one on record
    #[error("Wrong previous session for {path}: presented {presented:?}, current {current:?}")]
    Conflict {
        path: String,
        presented: Option<Session>,
        current: Option<Session>,
    },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The session was released while the operation was in flight
    #[error("Device released or disconnected (session {session})")]
    DeviceLost { session: Session },

    #[error("Plugin error: {0}")]
    Plugin(#[from] common::Error),

    /// The plugin cannot back this transport
    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
