//! Message schema definitions
//!
//! A [`Schema`] is produced by [`parse_configure`] from a configuration blob and
//! describes every message the device understands: its wire id and its fields in
//! wire order. The transport refuses framed calls until a schema is installed.

use crate::error::{ProtocolError, Result};
use crate::integrity;
use crate::version::{CURRENT_VERSION, ProtocolVersion};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of a single message field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Uint32,
    Uint64,
    Sint64,
    Bool,
    String,
    /// Raw bytes, carried as base64 in JSON payloads
    Bytes,
}

impl FieldKind {
    /// Human readable name used in error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Uint32 => "uint32",
            FieldKind::Uint64 => "uint64",
            FieldKind::Sint64 => "sint64",
            FieldKind::Bool => "bool",
            FieldKind::String => "string",
            FieldKind::Bytes => "bytes",
        }
    }
}

/// Definition of a message field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub optional: bool,
}

/// Definition of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDef {
    pub name: String,
    pub id: u16,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl MessageDef {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Serialized form of a schema, as carried in the configuration body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub version: ProtocolVersion,
    pub messages: Vec<MessageDef>,
}

/// Parsed and indexed message definitions
#[derive(Debug, Clone)]
pub struct Schema {
    version: ProtocolVersion,
    messages: Vec<MessageDef>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<u16, usize>,
}

impl Schema {
    /// Build a schema from a document, rejecting duplicate names or ids
    pub fn from_document(document: SchemaDocument) -> Result<Self> {
        validate_version(&document.version)?;

        let mut by_name = HashMap::with_capacity(document.messages.len());
        let mut by_id = HashMap::with_capacity(document.messages.len());

        for (index, message) in document.messages.iter().enumerate() {
            if by_name.insert(message.name.clone(), index).is_some() {
                return Err(ProtocolError::InvalidConfig(format!(
                    "duplicate message name {}",
                    message.name
                )));
            }
            if by_id.insert(message.id, index).is_some() {
                return Err(ProtocolError::InvalidConfig(format!(
                    "duplicate message id {}",
                    message.id
                )));
            }

            let mut seen = std::collections::HashSet::new();
            for field in &message.fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(ProtocolError::InvalidConfig(format!(
                        "duplicate field {} in message {}",
                        field.name, message.name
                    )));
                }
            }
        }

        Ok(Self {
            version: document.version,
            messages: document.messages,
            by_name,
            by_id,
        })
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Look up a message by name
    pub fn by_name(&self, name: &str) -> Result<&MessageDef> {
        self.by_name
            .get(name)
            .map(|&i| &self.messages[i])
            .ok_or_else(|| ProtocolError::UnknownMessage(name.to_string()))
    }

    /// Look up a message by wire id
    pub fn by_id(&self, id: u16) -> Result<&MessageDef> {
        self.by_id
            .get(&id)
            .map(|&i| &self.messages[i])
            .ok_or(ProtocolError::UnknownMessageId(id))
    }
}

/// Validate schema version compatibility
///
/// Compatible if major versions match. Minor version differences are allowed.
pub fn validate_version(version: &ProtocolVersion) -> Result<()> {
    if !version.is_compatible_with(&CURRENT_VERSION) {
        return Err(ProtocolError::IncompatibleVersion {
            major: version.major,
            minor: version.minor,
            expected_major: CURRENT_VERSION.major,
            expected_minor: CURRENT_VERSION.minor,
        });
    }
    Ok(())
}

/// Parse a configuration blob into a schema
///
/// # Example
/// ```
/// use protocol::integrity::seal;
/// use protocol::parse_configure;
///
/// let body = r#"{"messages":[{"name":"Initialize","id":0}]}"#;
/// let schema = parse_configure(&seal(body)).unwrap();
/// assert_eq!(schema.by_name("Initialize").unwrap().id, 0);
/// ```
pub fn parse_configure(signed: &str) -> Result<Schema> {
    let body = integrity::open(signed)?;
    let document: SchemaDocument =
        serde_json::from_str(body).map_err(|e| ProtocolError::InvalidConfig(e.to_string()))?;
    Schema::from_document(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::seal;

    fn document(messages: serde_json::Value) -> String {
        seal(&serde_json::json!({ "messages": messages }).to_string())
    }

    #[test]
    fn test_parse_indexes_by_name_and_id() {
        let schema = parse_configure(&document(serde_json::json!([
            { "name": "Initialize", "id": 0 },
            { "name": "Features", "id": 17, "fields": [
                { "name": "vendor", "kind": "string", "optional": true }
            ]}
        ])))
        .unwrap();

        assert_eq!(schema.len(), 2);
        assert_eq!(schema.by_id(17).unwrap().name, "Features");
        let features = schema.by_name("Features").unwrap();
        assert_eq!(features.field("vendor").unwrap().kind, FieldKind::String);
        assert!(features.field("vendor").unwrap().optional);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = parse_configure(&document(serde_json::json!([
            { "name": "A", "id": 1 },
            { "name": "B", "id": 1 }
        ])))
        .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidConfig(_)));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = parse_configure(&document(serde_json::json!([
            { "name": "A", "id": 1, "fields": [
                { "name": "x", "kind": "bool" },
                { "name": "x", "kind": "uint32" }
            ]}
        ])))
        .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidConfig(_)));
    }

    #[test]
    fn test_major_version_mismatch_rejected() {
        let body = serde_json::json!({
            "version": { "major": 2, "minor": 0 },
            "messages": []
        });
        let err = parse_configure(&seal(&body.to_string())).unwrap_err();
        assert!(matches!(err, ProtocolError::IncompatibleVersion { major: 2, .. }));
    }

    #[test]
    fn test_newer_minor_version_accepted() {
        let body = serde_json::json!({
            "version": { "major": CURRENT_VERSION.major, "minor": CURRENT_VERSION.minor + 3 },
            "messages": []
        });
        assert!(parse_configure(&seal(&body.to_string())).is_ok());
        assert!(validate_version(&CURRENT_VERSION).is_ok());
    }

    #[test]
    fn test_unknown_lookups() {
        let schema = parse_configure(&document(serde_json::json!([]))).unwrap();
        assert!(schema.is_empty());
        assert!(matches!(
            schema.by_name("Nope"),
            Err(ProtocolError::UnknownMessage(_))
        ));
        assert!(matches!(
            schema.by_id(9),
            Err(ProtocolError::UnknownMessageId(9))
        ));
    }
}
