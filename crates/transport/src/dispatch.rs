//! Call dispatcher
//!
//! Resolves a session to its path, frames messages with the active schema and
//! moves reports through the plugin. Every exchange is raced against the
//! session's release signal; if the signal wins, the caller gets `DeviceLost`
//! and whatever the plugin eventually returns is dropped.

use crate::error::{Result, SessionError, TransportError};
use crate::registry::Lookup;
use crate::session::{ReleaseWatch, Session, SessionClass};
use crate::trace::logged;
use crate::transport::Transport;
use protocol::{FrameAssembler, MessageFromDevice, ProtocolError, Schema};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

impl Transport {
    /// Install message definitions from a configuration blob
    ///
    /// Replaces any previous schema. Bound sessions are unaffected.
    pub async fn configure(&self, signed_config: &str) -> Result<()> {
        logged(self.verbose(), "configure", async {
            let schema = protocol::parse_configure(signed_config)?;
            info!("Configured {} message types", schema.len());
            *self.schema.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(schema));
            Ok(())
        })
        .await
    }

    /// Send `name` with `payload` and wait for the device's response
    pub async fn call(
        &self,
        session: Session,
        name: &str,
        payload: &Value,
        class: SessionClass,
    ) -> Result<MessageFromDevice> {
        logged(self.verbose(), "call", async {
            let schema = self.active_schema()?;
            let (path, watch) = self.resolve(session, class)?;
            race(session, watch, async {
                self.send_message(&path, class, &schema, name, payload).await?;
                self.receive_message(&path, class, &schema).await
            })
            .await
        })
        .await
    }

    /// Send `name` with `payload` without waiting for a response
    pub async fn post(
        &self,
        session: Session,
        name: &str,
        payload: &Value,
        class: SessionClass,
    ) -> Result<()> {
        logged(self.verbose(), "post", async {
            let schema = self.active_schema()?;
            let (path, watch) = self.resolve(session, class)?;
            race(
                session,
                watch,
                self.send_message(&path, class, &schema, name, payload),
            )
            .await
        })
        .await
    }

    /// Wait for the next message from the device
    pub async fn read(&self, session: Session, class: SessionClass) -> Result<MessageFromDevice> {
        logged(self.verbose(), "read", async {
            let schema = self.active_schema()?;
            let (path, watch) = self.resolve(session, class)?;
            race(session, watch, self.receive_message(&path, class, &schema)).await
        })
        .await
    }

    fn active_schema(&self) -> Result<Arc<Schema>> {
        self.schema
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| ProtocolError::NotConfigured.into())
    }

    fn resolve(&self, session: Session, class: SessionClass) -> Result<(String, ReleaseWatch)> {
        match self.registry().lookup(session, class) {
            Lookup::Bound { path, watch } => Ok((path, watch)),
            Lookup::Released => Err(TransportError::DeviceLost { session }),
            Lookup::Unknown => Err(SessionError::NotAvailable(session).into()),
        }
    }

    async fn send_message(
        &self,
        path: &str,
        class: SessionClass,
        schema: &Schema,
        name: &str,
        payload: &Value,
    ) -> Result<()> {
        let reports = protocol::build_reports(schema, name, payload)?;
        debug!("Sending {} in {} reports to {}", name, reports.len(), path);
        for report in &reports {
            self.plugin.send(path, report, class).await?;
        }
        Ok(())
    }

    async fn receive_message(
        &self,
        path: &str,
        class: SessionClass,
        schema: &Schema,
    ) -> Result<MessageFromDevice> {
        let mut assembler = FrameAssembler::new();
        loop {
            let report = self.plugin.receive(path, class).await?;
            if let Some((id, body)) = assembler.push(&report)? {
                let message = protocol::decode_message(schema, id, &body)?;
                debug!("Received {} from {}", message.type_name, path);
                return Ok(message);
            }
        }
    }
}

/// Run `op` unless the session is released first
async fn race<T>(
    session: Session,
    mut watch: ReleaseWatch,
    op: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = watch.released() => Err(TransportError::DeviceLost { session }),
        result = op => result,
    }
}
