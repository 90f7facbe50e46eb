//! Multi-session device transport
//!
//! Layers session management on top of a raw device plugin:
//! - Normal and debug sessions per device path, acquired with optimistic
//!   locking on the previously recorded session
//! - Enumeration that releases sessions of vanished devices
//! - A bounded long-poll (`listen`) for device list changes
//! - Framed `call`/`post`/`read` that fail with `DeviceLost` when their session
//!   is released mid-flight
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use transport::{SessionClass, Transport, TransportConfig};
//!
//! # async fn run(plugin: Arc<dyn common::DevicePlugin>, config: &str) -> transport::Result<()> {
//! let settings = TransportConfig::load_or_default();
//! let _ = settings.init_logging();
//!
//! let transport = Transport::with_config(plugin, &settings)?;
//! transport.init(false).await?;
//! transport.configure(config).await?;
//!
//! let devices = transport.enumerate().await?;
//! let device = &devices[0];
//! let session = transport
//!     .acquire(&device.path, device.session, SessionClass::Normal)
//!     .await?;
//!
//! let features = transport
//!     .call(session, "Initialize", &serde_json::json!({}), SessionClass::Normal)
//!     .await?;
//! println!("{}", features.type_name);
//!
//! transport.release(session, SessionClass::Normal, false).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
mod dispatch;
pub mod enumerate;
pub mod error;
pub mod listen;
pub mod plugin;
pub mod registry;
pub mod session;
mod trace;
mod transport;

pub use config::TransportConfig;
pub use enumerate::DeviceDescriptor;
pub use error::{Result, SessionError, TransportError};
pub use listen::{ITER_DELAY, ITER_MAX};
pub use session::{ReleaseWatch, Session, SessionClass};
pub use transport::Transport;
