//! Payload serialization and report framing
//!
//! Payloads are JSON objects checked against a [`MessageDef`] and serialized
//! field by field with postcard, in schema order. Optional fields carry a
//! presence flag ahead of the value.
//!
//! # Frame Format
//!
//! Devices exchange fixed size reports of [`REPORT_SIZE`] bytes. A message is
//! split across as many reports as needed:
//! ```text
//! first:        ['?']['#']['#'][id: u16 BE][length: u32 BE][payload ...]
//! continuation: ['?'][payload ...]
//! ```
//! The last report is zero padded.

use crate::error::{ProtocolError, Result};
use crate::messages::MessageFromDevice;
use crate::schema::{FieldDef, FieldKind, MessageDef, Schema};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Size of a single device report
pub const REPORT_SIZE: usize = 64;

/// Marker byte opening every report
pub const REPORT_MARKER: u8 = b'?';

/// Magic bytes opening the first report of a message
pub const MESSAGE_MAGIC: [u8; 2] = *b"##";

/// Length of the first report's header (marker, magic, id, length)
pub const HEADER_SIZE: usize = 1 + 2 + 2 + 4;

/// Default cap on a single message payload (1 MiB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Largest payload the u32 length header can describe
pub const MAX_FRAME_LENGTH: usize = u32::MAX as usize;

/// Process-wide codec limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecLimits {
    pub max_message_size: usize,
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

static LIMITS: OnceLock<CodecLimits> = OnceLock::new();

/// Install codec limits for the lifetime of the process
///
/// Only the first call takes effect. Returns `true` if this call installed
/// the limits.
pub fn install(limits: CodecLimits) -> bool {
    LIMITS.set(limits).is_ok()
}

/// Active codec limits (defaults if none were installed)
pub fn limits() -> CodecLimits {
    *LIMITS.get_or_init(CodecLimits::default)
}

/// Serialize a JSON payload against a message definition
pub fn encode_payload(def: &MessageDef, payload: &Value) -> Result<Vec<u8>> {
    let empty = Map::new();
    let object = match payload {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => return Err(ProtocolError::PayloadNotObject(def.name.clone())),
    };

    if let Some(unknown) = object.keys().find(|k| def.field(k).is_none()) {
        return Err(ProtocolError::UnknownField {
            message: def.name.clone(),
            field: unknown.clone(),
        });
    }

    let mut out = Vec::new();
    for field in &def.fields {
        let value = object.get(&field.name).filter(|v| !v.is_null());
        match (value, field.optional) {
            (None, false) => {
                return Err(ProtocolError::MissingField {
                    message: def.name.clone(),
                    field: field.name.clone(),
                });
            }
            (None, true) => out.extend(postcard::to_allocvec(&false)?),
            (Some(value), optional) => {
                if optional {
                    out.extend(postcard::to_allocvec(&true)?);
                }
                encode_field(def, field, value, &mut out)?;
            }
        }
    }

    Ok(out)
}

fn encode_field(def: &MessageDef, field: &FieldDef, value: &Value, out: &mut Vec<u8>) -> Result<()> {
    let invalid = || ProtocolError::InvalidField {
        message: def.name.clone(),
        field: field.name.clone(),
        expected: field.kind.as_str(),
    };

    let bytes = match field.kind {
        FieldKind::Uint32 => {
            let v = value
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(invalid)?;
            postcard::to_allocvec(&v)?
        }
        FieldKind::Uint64 => postcard::to_allocvec(&value.as_u64().ok_or_else(invalid)?)?,
        FieldKind::Sint64 => postcard::to_allocvec(&value.as_i64().ok_or_else(invalid)?)?,
        FieldKind::Bool => postcard::to_allocvec(&value.as_bool().ok_or_else(invalid)?)?,
        FieldKind::String => postcard::to_allocvec(value.as_str().ok_or_else(invalid)?)?,
        FieldKind::Bytes => {
            let raw = value
                .as_str()
                .and_then(|s| BASE64.decode(s).ok())
                .ok_or_else(invalid)?;
            postcard::to_allocvec(&raw)?
        }
    };

    out.extend(bytes);
    Ok(())
}

/// Deserialize a payload produced by [`encode_payload`]
pub fn decode_payload(def: &MessageDef, bytes: &[u8]) -> Result<Value> {
    let mut rest = bytes;
    let mut object = Map::new();

    for field in &def.fields {
        if field.optional {
            let (present, tail) = postcard::take_from_bytes::<bool>(rest)?;
            rest = tail;
            if !present {
                continue;
            }
        }

        let (value, tail) = decode_field(field.kind, rest)?;
        rest = tail;
        object.insert(field.name.clone(), value);
    }

    if !rest.is_empty() {
        return Err(ProtocolError::TrailingBytes {
            message: def.name.clone(),
            remaining: rest.len(),
        });
    }

    Ok(Value::Object(object))
}

fn decode_field(kind: FieldKind, input: &[u8]) -> Result<(Value, &[u8])> {
    Ok(match kind {
        FieldKind::Uint32 => {
            let (v, rest) = postcard::take_from_bytes::<u32>(input)?;
            (Value::from(v), rest)
        }
        FieldKind::Uint64 => {
            let (v, rest) = postcard::take_from_bytes::<u64>(input)?;
            (Value::from(v), rest)
        }
        FieldKind::Sint64 => {
            let (v, rest) = postcard::take_from_bytes::<i64>(input)?;
            (Value::from(v), rest)
        }
        FieldKind::Bool => {
            let (v, rest) = postcard::take_from_bytes::<bool>(input)?;
            (Value::from(v), rest)
        }
        FieldKind::String => {
            let (v, rest) = postcard::take_from_bytes::<String>(input)?;
            (Value::from(v), rest)
        }
        FieldKind::Bytes => {
            let (v, rest) = postcard::take_from_bytes::<Vec<u8>>(input)?;
            (Value::from(BASE64.encode(v)), rest)
        }
    })
}

/// Build the reports carrying `name` with `payload`
///
/// # Example
/// ```
/// use protocol::integrity::seal;
/// use protocol::{REPORT_SIZE, build_reports, parse_configure};
///
/// let schema = parse_configure(&seal(r#"{"messages":[{"name":"Initialize","id":0}]}"#)).unwrap();
/// let reports = build_reports(&schema, "Initialize", &serde_json::json!({})).unwrap();
/// assert_eq!(reports.len(), 1);
/// assert_eq!(reports[0].len(), REPORT_SIZE);
/// ```
pub fn build_reports(schema: &Schema, name: &str, payload: &Value) -> Result<Vec<Vec<u8>>> {
    let def = schema.by_name(name)?;
    let body = encode_payload(def, payload)?;

    let max = limits().max_message_size.min(MAX_FRAME_LENGTH);
    let length = u32::try_from(body.len())
        .ok()
        .filter(|_| body.len() <= max)
        .ok_or(ProtocolError::MessageTooLarge {
            size: body.len(),
            max,
        })?;

    let mut reports = Vec::with_capacity(1 + body.len() / (REPORT_SIZE - 1));

    let mut first = Vec::with_capacity(REPORT_SIZE);
    first.push(REPORT_MARKER);
    first.extend_from_slice(&MESSAGE_MAGIC);
    first.extend_from_slice(&def.id.to_be_bytes());
    first.extend_from_slice(&length.to_be_bytes());

    let head = body.len().min(REPORT_SIZE - HEADER_SIZE);
    first.extend_from_slice(&body[..head]);
    first.resize(REPORT_SIZE, 0);
    reports.push(first);

    for chunk in body[head..].chunks(REPORT_SIZE - 1) {
        let mut report = Vec::with_capacity(REPORT_SIZE);
        report.push(REPORT_MARKER);
        report.extend_from_slice(chunk);
        report.resize(REPORT_SIZE, 0);
        reports.push(report);
    }

    Ok(reports)
}

/// Reassembles a message from reports received one at a time
#[derive(Debug)]
pub struct FrameAssembler {
    max_message_size: usize,
    pending: Option<Pending>,
}

#[derive(Debug)]
struct Pending {
    id: u16,
    length: usize,
    body: Vec<u8>,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            max_message_size: limits().max_message_size,
            pending: None,
        }
    }

    /// Feed one report
    ///
    /// Returns the message id and payload once the final report has arrived.
    pub fn push(&mut self, report: &[u8]) -> Result<Option<(u16, Vec<u8>)>> {
        if report.first() != Some(&REPORT_MARKER) {
            return Err(ProtocolError::MalformedFrame("missing report marker"));
        }

        let data = if self.pending.is_none() {
            if report.len() < HEADER_SIZE || report[1..3] != MESSAGE_MAGIC {
                return Err(ProtocolError::MalformedFrame("missing message header"));
            }
            let id = u16::from_be_bytes([report[3], report[4]]);
            let length = u32::from_be_bytes([report[5], report[6], report[7], report[8]]) as usize;
            if length > self.max_message_size {
                return Err(ProtocolError::MessageTooLarge {
                    size: length,
                    max: self.max_message_size,
                });
            }
            self.pending = Some(Pending {
                id,
                length,
                body: Vec::with_capacity(length),
            });
            &report[HEADER_SIZE..]
        } else {
            &report[1..]
        };

        let Some(pending) = self.pending.as_mut() else {
            return Ok(None);
        };
        let wanted = pending.length - pending.body.len();
        pending
            .body
            .extend_from_slice(&data[..wanted.min(data.len())]);

        if pending.body.len() < pending.length {
            return Ok(None);
        }

        Ok(self.pending.take().map(|p| (p.id, p.body)))
    }

    /// Whether a message is partially assembled
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Decode an assembled message against the schema
pub fn decode_message(schema: &Schema, id: u16, body: &[u8]) -> Result<MessageFromDevice> {
    let def = schema.by_id(id)?;
    let message = decode_payload(def, body)?;
    Ok(MessageFromDevice {
        type_name: def.name.clone(),
        message,
    })
}
