//! Integration tests for schema configuration, payload encoding and framing
//!
//! Exercises the path a transport takes: configure from a sealed blob, build
//! reports for an outgoing message, reassemble incoming reports and decode.

use protocol::codec::{HEADER_SIZE, MESSAGE_MAGIC, REPORT_MARKER};
use protocol::integrity::seal;
use protocol::{
    FrameAssembler, ProtocolError, REPORT_SIZE, Schema, build_reports, decode_message,
    parse_configure,
};
use serde_json::json;

fn device_schema() -> Schema {
    let body = json!({
        "version": { "major": 1, "minor": 3 },
        "messages": [
            { "name": "Initialize", "id": 0, "fields": [
                { "name": "session_id", "kind": "bytes", "optional": true }
            ]},
            { "name": "Success", "id": 2, "fields": [
                { "name": "message", "kind": "string", "optional": true }
            ]},
            { "name": "Failure", "id": 3, "fields": [
                { "name": "code", "kind": "uint32", "optional": true },
                { "name": "message", "kind": "string", "optional": true }
            ]},
            { "name": "Features", "id": 17, "fields": [
                { "name": "vendor", "kind": "string" },
                { "name": "major_version", "kind": "uint32" },
                { "name": "initialized", "kind": "bool" }
            ]},
            { "name": "SignMessage", "id": 38, "fields": [
                { "name": "message", "kind": "string" }
            ]}
        ]
    });
    parse_configure(&seal(&body.to_string())).expect("schema should parse")
}

fn assemble(reports: &[Vec<u8>]) -> (u16, Vec<u8>) {
    let mut assembler = FrameAssembler::new();
    for report in reports {
        if let Some(done) = assembler.push(report).expect("report should be accepted") {
            return done;
        }
    }
    panic!("message did not complete");
}

mod configure {
    use super::*;

    #[test]
    fn test_minor_version_newer_is_accepted() {
        let schema = device_schema();
        assert_eq!(schema.version().minor, 3);
        assert_eq!(schema.len(), 5);
    }

    #[test]
    fn test_tampered_blob_is_rejected() {
        let sealed = seal(r#"{"messages":[]}"#);
        let tampered = sealed.replace("[]", "[ ]");
        assert!(matches!(
            parse_configure(&tampered),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(matches!(
            parse_configure(&seal("{not json")),
            Err(ProtocolError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unknown_field_kind_is_rejected() {
        let body = r#"{"messages":[{"name":"A","id":1,"fields":[{"name":"x","kind":"float"}]}]}"#;
        assert!(matches!(
            parse_configure(&seal(body)),
            Err(ProtocolError::InvalidConfig(_))
        ));
    }
}

mod framing {
    use super::*;

    #[test]
    fn test_first_report_header_layout() {
        let schema = device_schema();
        let reports = build_reports(&schema, "SignMessage", &json!({ "message": "abc" })).unwrap();
        assert_eq!(reports.len(), 1);

        let report = &reports[0];
        assert_eq!(report[0], REPORT_MARKER);
        assert_eq!(report[1..3], MESSAGE_MAGIC);
        assert_eq!(u16::from_be_bytes([report[3], report[4]]), 38);
        // postcard string: varint length (1 byte) + 3 bytes
        assert_eq!(
            u32::from_be_bytes([report[5], report[6], report[7], report[8]]),
            4
        );
        assert!(report[HEADER_SIZE + 4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_payload_filling_first_report_exactly() {
        let schema = device_schema();
        // 1 varint byte + 54 chars = 55 bytes = REPORT_SIZE - HEADER_SIZE
        let message = "x".repeat(REPORT_SIZE - HEADER_SIZE - 1);
        let reports = build_reports(&schema, "SignMessage", &json!({ "message": message })).unwrap();
        assert_eq!(reports.len(), 1);

        let message = "x".repeat(REPORT_SIZE - HEADER_SIZE);
        let reports = build_reports(&schema, "SignMessage", &json!({ "message": message })).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1][0], REPORT_MARKER);
    }

    #[test]
    fn test_long_message_survives_reassembly() {
        let schema = device_schema();
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        let reports = build_reports(&schema, "SignMessage", &json!({ "message": text })).unwrap();

        let (id, body) = assemble(&reports);
        let decoded = decode_message(&schema, id, &body).unwrap();
        assert_eq!(decoded.type_name, "SignMessage");
        assert_eq!(decoded.message["message"], json!(text));
    }

    #[test]
    fn test_empty_payload_message() {
        let schema = device_schema();
        let reports = build_reports(&schema, "Initialize", &json!({})).unwrap();
        let (id, body) = assemble(&reports);
        assert_eq!(id, 0);
        let decoded = decode_message(&schema, id, &body).unwrap();
        assert_eq!(decoded.message, json!({}));
    }

    #[test]
    fn test_continuation_without_marker_is_rejected() {
        let schema = device_schema();
        let text = "y".repeat(200);
        let mut reports = build_reports(&schema, "SignMessage", &json!({ "message": text })).unwrap();
        reports[1][0] = 0;

        let mut assembler = FrameAssembler::new();
        assert!(assembler.push(&reports[0]).unwrap().is_none());
        assert!(matches!(
            assembler.push(&reports[1]),
            Err(ProtocolError::MalformedFrame(_))
        ));
    }
}

mod messages {
    use super::*;

    #[test]
    fn test_features_response_decodes() {
        let schema = device_schema();
        let payload = json!({ "vendor": "example.com", "major_version": 2, "initialized": true });
        let reports = build_reports(&schema, "Features", &payload).unwrap();

        let (id, body) = assemble(&reports);
        let decoded = decode_message(&schema, id, &body).unwrap();
        assert_eq!(decoded.type_name, "Features");
        assert_eq!(decoded.message, payload);
    }

    #[test]
    fn test_unknown_message_name_is_protocol_error() {
        let schema = device_schema();
        assert!(matches!(
            build_reports(&schema, "WipeDevice", &json!({})),
            Err(ProtocolError::UnknownMessage(name)) if name == "WipeDevice"
        ));
    }

    #[test]
    fn test_wrong_type_is_protocol_error() {
        let schema = device_schema();
        let payload = json!({ "vendor": 5, "major_version": 2, "initialized": true });
        assert!(matches!(
            build_reports(&schema, "Features", &payload),
            Err(ProtocolError::InvalidField { expected: "string", .. })
        ));
    }
}
