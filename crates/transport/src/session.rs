//! Session tokens, session classes and release signals

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use tokio::sync::watch;

/// Opaque exclusive-access token for one (path, class) pair
///
/// Tokens come from a single process-wide counter and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Session(pub u64);

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Session {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Session)
    }
}

impl From<Session> for String {
    fn from(session: Session) -> Self {
        session.to_string()
    }
}

impl TryFrom<String> for Session {
    type Error = ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Independent session namespaces per device path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionClass {
    Normal,
    Debug,
}

impl SessionClass {
    pub const ALL: [SessionClass; 2] = [SessionClass::Normal, SessionClass::Debug];

    pub fn from_debug(debug: bool) -> Self {
        if debug {
            SessionClass::Debug
        } else {
            SessionClass::Normal
        }
    }

    pub fn is_debug(self) -> bool {
        self == SessionClass::Debug
    }
}

impl fmt::Display for SessionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionClass::Normal => write!(f, "normal"),
            SessionClass::Debug => write!(f, "debug"),
        }
    }
}

/// One-shot release notification owned by the registry
#[derive(Debug)]
pub(crate) struct ReleaseSignal {
    tx: watch::Sender<bool>,
}

impl ReleaseSignal {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Fire the signal. Returns `false` if it had already fired.
    pub(crate) fn fire(&self) -> bool {
        self.tx.send_if_modified(|fired| !std::mem::replace(fired, true))
    }

    pub(crate) fn subscribe(&self) -> ReleaseWatch {
        ReleaseWatch {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observer side of a [`ReleaseSignal`]
#[derive(Debug, Clone)]
pub struct ReleaseWatch {
    rx: watch::Receiver<bool>,
}

impl ReleaseWatch {
    /// Resolves once the session is released
    ///
    /// A dropped signal counts as released.
    pub async fn released(&mut self) {
        let _ = self.rx.wait_for(|fired| *fired).await;
    }

    pub fn is_released(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }
}
