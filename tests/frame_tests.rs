//! Integration tests for the ECHONET Lite frame codec: field layout,
//! truncation stages and the combined-service Get group.

use echonet_audit::echonet::frame::{pack_frame, parse_frame, Frame, ObjectCode, PropertyData};
use echonet_audit::error::{DecodeStage, EchonetError};

const CONTROLLER: ObjectCode = ObjectCode::new(0x05, 0xFF, 0x01);
const AIRCON: ObjectCode = ObjectCode::new(0x01, 0x30, 0x01);

fn get_operation_status() -> Frame {
    Frame::new(
        0x0001,
        CONTROLLER,
        AIRCON,
        0x62,
        vec![PropertyData::request(0x80)],
    )
}

fn stage_of(bytes: &[u8]) -> DecodeStage {
    match parse_frame(bytes) {
        Err(EchonetError::TruncatedFrame { stage }) => stage,
        other => panic!("expected a truncated frame, got {other:?}"),
    }
}

/// Tests that a Get request is laid out field by field, big-endian.
#[test]
fn test_encode_get_request() {
    let bytes = pack_frame(&get_operation_status());
    assert_eq!(
        bytes,
        vec![0x10, 0x81, 0x00, 0x01, 0x05, 0xFF, 0x01, 0x01, 0x30, 0x01, 0x62, 0x01, 0x80, 0x00]
    );
}

/// Tests that EDT bytes are written after their PDC and omitted when PDC is zero.
#[test]
fn test_encode_omits_empty_edt() {
    let frame = Frame::new(
        0x1234,
        CONTROLLER,
        AIRCON,
        0x61,
        vec![
            PropertyData::new(0x80, vec![0x30]),
            PropertyData::request(0xB0),
            PropertyData::new(0xB3, vec![0x1A]),
        ],
    );
    let bytes = frame.encode();
    assert_eq!(&bytes[2..4], &[0x12, 0x34]);
    assert_eq!(bytes[11], 3);
    assert_eq!(&bytes[12..], &[0x80, 0x01, 0x30, 0xB0, 0x00, 0xB3, 0x01, 0x1A]);
}

/// Tests that decoding reproduces every field of an encoded frame.
#[test]
fn test_decode_round_trip() {
    let frame = Frame::new(
        0xBEEF,
        CONTROLLER,
        AIRCON,
        0x72,
        vec![
            PropertyData::new(0x80, vec![0x30]),
            PropertyData::new(0xE0, vec![0x01, 0x02, 0x03, 0x04]),
        ],
    );
    let decoded = Frame::decode(&frame.encode()).unwrap();
    assert_eq!(decoded, frame);
    assert_eq!(decoded.operation_count_get, None);
    assert!(decoded.properties_get.is_empty());
}

/// Tests that removing trailing bytes fails at the field being read.
#[test]
fn test_truncation_stages() {
    let frame = Frame::new(
        7,
        CONTROLLER,
        AIRCON,
        0x61,
        vec![PropertyData::new(0x80, vec![0x30, 0x31])],
    );
    let bytes = frame.encode();
    assert_eq!(bytes.len(), 16);

    let expected = [
        (0, DecodeStage::Ehd1),
        (1, DecodeStage::Ehd2),
        (2, DecodeStage::Tid),
        (3, DecodeStage::Tid),
        (4, DecodeStage::Seoj),
        (6, DecodeStage::Seoj),
        (7, DecodeStage::Deoj),
        (10, DecodeStage::Esv),
        (11, DecodeStage::Opc),
        (12, DecodeStage::Epc),
        (13, DecodeStage::Pdc),
        (14, DecodeStage::Edt),
        (15, DecodeStage::Edt),
    ];
    for (len, stage) in expected {
        assert_eq!(stage_of(&bytes[..len]), stage, "truncated to {len} bytes");
    }
    assert!(parse_frame(&bytes).is_ok());
}

/// Tests that a frame announcing more units than it carries is rejected.
#[test]
fn test_missing_property_unit() {
    let mut bytes = get_operation_status().encode();
    bytes[11] = 2;
    assert_eq!(stage_of(&bytes), DecodeStage::Epc);
}

/// Tests that the Get group of a combined frame is decoded from remaining bytes.
#[test]
fn test_decode_get_group() {
    let mut bytes = vec![0x10, 0x81, 0x00, 0x09, 0x05, 0xFF, 0x01, 0x01, 0x30, 0x01, 0x6E];
    bytes.extend_from_slice(&[0x01, 0x80, 0x01, 0x30]);
    bytes.extend_from_slice(&[0x02, 0xB0, 0x00, 0xB3, 0x00]);

    let frame = parse_frame(&bytes).unwrap();
    assert_eq!(frame.operation_count, 1);
    assert_eq!(frame.operation_count_get, Some(2));
    assert_eq!(frame.properties_get.len(), 2);
    assert_eq!(frame.properties_get[1].epc, 0xB3);
    assert_eq!(frame.total_operation_count(), 3);
}

/// Tests that combined frames encode their Get group symmetrically.
#[test]
fn test_get_group_round_trip() {
    let frame = Frame::new(
        9,
        CONTROLLER,
        AIRCON,
        0x6E,
        vec![PropertyData::new(0x80, vec![0x30])],
    )
    .with_get_group(vec![PropertyData::request(0xB0), PropertyData::request(0xBB)]);

    let bytes = frame.encode();
    assert_eq!(&bytes[15..], &[0x02, 0xB0, 0x00, 0xBB, 0x00]);
    assert_eq!(parse_frame(&bytes).unwrap(), frame);
}

/// Tests that a truncated Get group fails at the Get group stage.
#[test]
fn test_truncated_get_group() {
    let frame = Frame::new(9, CONTROLLER, AIRCON, 0x7E, vec![PropertyData::request(0x80)])
        .with_get_group(vec![PropertyData::new(0xB0, vec![0x42])]);
    let bytes = frame.encode();
    assert_eq!(stage_of(&bytes[..bytes.len() - 1]), DecodeStage::Edt);
}

/// Tests that bytes after the last group are ignored.
#[test]
fn test_trailing_bytes_after_get_group() {
    let mut bytes = Frame::new(3, CONTROLLER, AIRCON, 0x62, vec![])
        .with_get_group(vec![])
        .encode();
    bytes.push(0xFF);
    let frame = parse_frame(&bytes).unwrap();
    assert_eq!(frame.operation_count_get, Some(0));
}

/// Tests the header predicate for ECHONET Lite frames.
#[test]
fn test_is_echonet_lite() {
    let mut frame = get_operation_status();
    assert!(frame.is_echonet_lite());
    frame.ehd2 = 0x82;
    assert!(frame.is_echonet_lite());
    frame.ehd1 = 0x11;
    assert!(!frame.is_echonet_lite());
}

/// Tests that PDC follows the EDT length and long EDTs are cut to 255 bytes.
#[test]
fn test_property_data_length() {
    assert_eq!(PropertyData::new(0x80, vec![1, 2, 3]).pdc, 3);
    let long = PropertyData::new(0xE0, vec![0; 300]);
    assert_eq!(long.pdc, 255);
    assert_eq!(long.edt.len(), 255);
}

/// Tests the multi-line dump.
#[test]
fn test_display_names_service() {
    let text = get_operation_status().to_string();
    assert!(text.contains("TID:  0x0001"));
    assert!(text.contains("SEOJ: 0x05FF01  DEOJ: 0x013001"));
    assert!(text.contains("0x62 (Get)"));
    assert!(text.contains("EPC: 0x80"));
}
