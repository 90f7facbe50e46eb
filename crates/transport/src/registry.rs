//! Session registry
//!
//! Tracks which session holds which device path, per session class:
//! - Minting session tokens from a single process-wide counter
//! - Optimistic-lock checks on the previously recorded session
//! - Owning the release signal of every bound session
//! - Telling released tokens apart from tokens never issued
//!
//! The registry is plain synchronous state. The transport keeps it behind a
//! mutex that is never held across an await point, so every method here runs
//! atomically with respect to other transport operations.

use crate::error::{Result, SessionError, TransportError};
use crate::session::{ReleaseSignal, ReleaseWatch, Session, SessionClass};
use std::collections::HashMap;
use tracing::debug;

/// Bindings of one session class
#[derive(Debug, Default)]
struct ClassTable {
    /// Bound sessions: path -> session
    bindings: HashMap<String, Session>,
    /// Release signal of every bound session
    signals: HashMap<Session, ReleaseSignal>,
}

impl ClassTable {
    /// Reverse lookup. Device counts are small, a scan is fine.
    fn path_of(&self, session: Session) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(_, s)| **s == session)
            .map(|(path, _)| path.as_str())
    }

    fn retire(&mut self, path: &str, session: Session) {
        self.bindings.remove(path);
        if let Some(signal) = self.signals.remove(&session) {
            signal.fire();
        }
    }
}

/// Result of resolving a session for a call
#[derive(Debug)]
pub(crate) enum Lookup {
    /// Session is bound to `path`
    Bound { path: String, watch: ReleaseWatch },
    /// Session was issued and is no longer bound in this class
    Released,
    /// Session was never issued
    Unknown,
}

/// Path to session bindings for both session classes
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Next session token to mint
    next_session: u64,
    normal: ClassTable,
    debug: ClassTable,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, class: SessionClass) -> &ClassTable {
        match class {
            SessionClass::Normal => &self.normal,
            SessionClass::Debug => &self.debug,
        }
    }

    fn table_mut(&mut self, class: SessionClass) -> &mut ClassTable {
        match class {
            SessionClass::Normal => &mut self.normal,
            SessionClass::Debug => &mut self.debug,
        }
    }

    /// Session currently recorded for `path`
    pub fn current(&self, path: &str, class: SessionClass) -> Option<Session> {
        self.table(class).bindings.get(path).copied()
    }

    /// Path bound to `session`, if any
    pub fn path_of(&self, session: Session, class: SessionClass) -> Option<&str> {
        self.table(class).path_of(session)
    }

    /// Paths with a bound session
    pub fn bound_paths(&self, class: SessionClass) -> Vec<String> {
        self.table(class).bindings.keys().cloned().collect()
    }

    /// Number of bound sessions in `class`
    pub fn bound_count(&self, class: SessionClass) -> usize {
        self.table(class).bindings.len()
    }

    /// Fail with a conflict unless `presented` is the session on record
    pub fn check_previous(
        &self,
        path: &str,
        presented: Option<Session>,
        class: SessionClass,
    ) -> Result<()> {
        let current = self.current(path, class);
        if current != presented {
            return Err(TransportError::Conflict {
                path: path.to_string(),
                presented,
                current,
            });
        }
        Ok(())
    }

    /// Mint a session for `path` and bind it
    ///
    /// A session still recorded for the path is superseded: its signal fires
    /// and the token is retired.
    pub fn bind(&mut self, path: &str, class: SessionClass) -> Session {
        let session = Session(self.next_session);
        self.next_session += 1;

        let table = self.table_mut(class);
        if let Some(previous) = table.bindings.get(path).copied() {
            debug!(
                "Session {} on {} ({}) superseded by {}",
                previous, path, class, session
            );
            table.retire(path, previous);
        }

        table.bindings.insert(path.to_string(), session);
        table.signals.insert(session, ReleaseSignal::new());

        debug!("Bound session {} to {} ({})", session, path, class);
        session
    }

    /// Explicitly release `session`, returning the path it was bound to
    pub fn release(&mut self, session: Session, class: SessionClass) -> Result<String> {
        let table = self.table_mut(class);
        let path = table
            .path_of(session)
            .map(str::to_string)
            .ok_or(SessionError::DoubleRelease(session))?;

        table.retire(&path, session);
        debug!("Released session {} from {} ({})", session, path, class);
        Ok(path)
    }

    /// Release whatever is bound to `path` because the device is gone
    ///
    /// No-op when nothing is bound.
    pub fn forced_release(&mut self, path: &str, class: SessionClass) -> Option<Session> {
        let table = self.table_mut(class);
        let session = table.bindings.get(path).copied()?;
        table.retire(path, session);
        debug!(
            "Forced release of session {} on vanished {} ({})",
            session, path, class
        );
        Some(session)
    }

    /// Whether `session` was ever minted by this registry
    pub fn was_issued(&self, session: Session) -> bool {
        session.0 < self.next_session
    }

    /// Resolve `session` and subscribe to its release signal
    ///
    /// Tokens are minted in increasing order and never reused, so any issued
    /// token that is not bound in `class` counts as released.
    pub(crate) fn lookup(&self, session: Session, class: SessionClass) -> Lookup {
        let table = self.table(class);
        match (table.path_of(session), table.signals.get(&session)) {
            (Some(path), Some(signal)) => Lookup::Bound {
                path: path.to_string(),
                watch: signal.subscribe(),
            },
            _ if self.was_issued(session) => Lookup::Released,
            _ => Lookup::Unknown,
        }
    }
}
