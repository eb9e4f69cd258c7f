//! Unit tests for the `EchonetError` enum and its `Display` implementation.

use echonet_audit::echonet::frame::ObjectCode;
use echonet_audit::error::{DecodeStage, EchonetError};
use echonet_audit::util::hex::HexError;
use std::error::Error;
use std::time::Duration;

/// Tests that the `TruncatedFrame` variant names the field.
#[test]
fn test_truncated_frame_error() {
    let err = EchonetError::TruncatedFrame {
        stage: DecodeStage::OpcGet,
    };
    assert_eq!(err.to_string(), "Truncated frame: failed to read OPCGet");
}

/// Tests that the `NotEchonet` variant shows both header bytes.
#[test]
fn test_not_echonet_error() {
    let err = EchonetError::NotEchonet { ehd1: 0x20, ehd2: 0x01 };
    assert_eq!(
        err.to_string(),
        "Not an ECHONET Lite frame (EHD1 0x20, EHD2 0x01)"
    );
}

/// Tests that the `InvalidPropertyMap` variant is correctly formatted.
#[test]
fn test_invalid_property_map_error() {
    let err = EchonetError::InvalidPropertyMap {
        declared: 16,
        decoded: 15,
    };
    assert_eq!(
        err.to_string(),
        "Invalid property map: declared 16 properties, decoded 15"
    );
}

/// Tests that the `UnknownInstance` variant prints the object code.
#[test]
fn test_unknown_instance_error() {
    let err = EchonetError::UnknownInstance(ObjectCode::new(0x02, 0x88, 0x01));
    assert_eq!(err.to_string(), "Unknown instance 0x028801");
}

/// Tests that the `Timeout` variant is detected directly and inside context.
#[test]
fn test_timeout_error() {
    let err = EchonetError::Timeout(Duration::from_secs(15));
    assert_eq!(err.to_string(), "Receive timed out after 15s");
    assert!(err.is_timeout());
    assert!(err.within("instance list").is_timeout());
    assert!(!EchonetError::Transport("reset".into()).is_timeout());
}

/// Tests that context wrapping keeps the source chain.
#[test]
fn test_context_error() {
    let err = EchonetError::SchemaMismatch("unsupported date-time size 5".into())
        .within("object element 'stamp'");
    assert_eq!(
        err.to_string(),
        "object element 'stamp': Schema mismatch: unsupported date-time size 5"
    );
    assert!(err.source().is_some());
}

/// Tests that `FuzzAborted` reports the round count and cause.
#[test]
fn test_fuzz_aborted_error() {
    let err = EchonetError::FuzzAborted {
        rounds: 12,
        source: Box::new(EchonetError::Transport("host down".into())),
    };
    assert_eq!(
        err.to_string(),
        "Fuzz run aborted after 12 rounds: Transport error: host down"
    );
}

/// Tests the conversions from foreign error types.
#[test]
fn test_error_conversions() {
    let hex: EchonetError = HexError::InvalidCharacter('g').into();
    assert_eq!(hex.to_string(), "Hex error: Invalid hex character: g");

    let io: EchonetError = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use").into();
    assert!(matches!(io, EchonetError::Transport(_)));

    let json: EchonetError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
    assert!(matches!(json, EchonetError::Schema(_)));
}

/// Tests the remaining plain message variants.
#[test]
fn test_message_errors() {
    assert_eq!(
        EchonetError::Config("no target IP configured".into()).to_string(),
        "Configuration error: no target IP configured"
    );
    assert_eq!(
        EchonetError::Output("write results".into()).to_string(),
        "Output error: write results"
    );
    assert_eq!(
        EchonetError::Schema("missing 'devices' object".into()).to_string(),
        "Schema error: missing 'devices' object"
    );
}
