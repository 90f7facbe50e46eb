//! Wire protocol for device transports
//!
//! This crate defines the message schema activated by `configure`, the payload
//! codec that serializes JSON payloads against that schema using postcard, and
//! the fixed-size report framing used on the device link.
//!
//! # Example
//!
//! ```
//! use protocol::integrity::seal;
//! use protocol::{FrameAssembler, build_reports, decode_message, parse_configure};
//!
//! let config = seal(r#"{"messages":[{"name":"Ping","id":1,"fields":[{"name":"message","kind":"string"}]}]}"#);
//! let schema = parse_configure(&config).unwrap();
//!
//! let reports = build_reports(&schema, "Ping", &serde_json::json!({"message": "hello"})).unwrap();
//!
//! let mut assembler = FrameAssembler::new();
//! let (id, body) = reports
//!     .iter()
//!     .find_map(|r| assembler.push(r).unwrap())
//!     .unwrap();
//! let decoded = decode_message(&schema, id, &body).unwrap();
//! assert_eq!(decoded.type_name, "Ping");
//! ```

pub mod codec;
pub mod error;
pub mod integrity;
pub mod messages;
pub mod schema;
pub mod version;

pub use codec::{
    CodecLimits, FrameAssembler, REPORT_SIZE, build_reports, decode_message, decode_payload,
    encode_payload,
};
pub use error::{ProtocolError, Result};
pub use messages::MessageFromDevice;
pub use schema::{
    FieldDef, FieldKind, MessageDef, Schema, SchemaDocument, parse_configure, validate_version,
};
pub use version::{CURRENT_VERSION, ProtocolVersion};
