//! Integration tests for request/response flow validation.

use echonet_audit::echonet::flow::{check_flow, FlowViolation};
use echonet_audit::echonet::frame::{Frame, ObjectCode, PropertyData};

const CONTROLLER: ObjectCode = ObjectCode::new(0x05, 0xFF, 0x01);
const AIRCON: ObjectCode = ObjectCode::new(0x01, 0x30, 0x01);

fn get_request() -> Frame {
    Frame::new(0x0042, CONTROLLER, AIRCON, 0x62, vec![PropertyData::request(0x80)])
}

fn get_response() -> Frame {
    Frame::new(
        0x0042,
        AIRCON,
        CONTROLLER,
        0x72,
        vec![PropertyData::new(0x80, vec![0x30])],
    )
}

/// Tests that a conforming Get exchange reports nothing.
#[test]
fn test_conforming_get() {
    let report = check_flow(&get_request(), &get_response());
    assert!(report.is_clean(), "{:?}", report);
}

/// Tests that a Get_SNA reply carrying data is flagged as the wrong family.
#[test]
fn test_get_sna_with_data() {
    let mut received = get_response();
    received.service = 0x52;
    let report = check_flow(&get_request(), &received);
    assert!(report.contains(&FlowViolation::ServiceCodeFamily {
        sent: 0x62,
        received: 0x52
    }));
}

/// Tests that a proper Get_SNA reply passes the family rule.
#[test]
fn test_get_sna_without_data() {
    let received = Frame::new(0x0042, AIRCON, CONTROLLER, 0x52, vec![PropertyData::request(0x80)]);
    let report = check_flow(&get_request(), &received);
    assert!(report.is_clean(), "{:?}", report);
}

/// Tests that dropping the requested EPC is reported as missing.
#[test]
fn test_missing_epc() {
    let mut received = get_response();
    received.properties.clear();
    let report = check_flow(&get_request(), &received);
    assert!(report.contains(&FlowViolation::MissingProperty { epc: 0x80 }));
    assert!(report.contains(&FlowViolation::OperationCountMismatch {
        declared: 1,
        present: 0
    }));
}

/// Tests the header rules: TID, object swap and low nibble.
#[test]
fn test_header_rules() {
    let mut received = get_response();
    received.transaction_id = 0x0043;
    received.destination = AIRCON;
    received.service = 0x71;

    let report = check_flow(&get_request(), &received);
    assert!(report.contains(&FlowViolation::TransactionIdMismatch {
        sent: 0x0042,
        received: 0x0043
    }));
    assert!(report.contains(&FlowViolation::ServiceCodeFamily {
        sent: 0x62,
        received: 0x71
    }));
    assert!(report
        .all()
        .any(|v| matches!(v, FlowViolation::ObjectCodesNotSwapped { .. })));
}

/// Tests that every rule is evaluated even after the first violation.
#[test]
fn test_violations_accumulate() {
    let mut received = get_response();
    received.transaction_id = 1;
    received.service = 0x90;
    received.properties = vec![PropertyData::new(0x81, vec![0x00])];

    let report = check_flow(&get_request(), &received);
    assert!(report.violations.len() >= 4);
    assert!(report.contains(&FlowViolation::ServiceCodeOutOfRange { received: 0x90 }));
    assert!(report.contains(&FlowViolation::UnexpectedProperty { epc: 0x81 }));
    assert!(report.contains(&FlowViolation::MissingProperty { epc: 0x80 }));
}

/// Tests the operation count rules of positive responses.
#[test]
fn test_operation_counts() {
    let sent = Frame::new(
        5,
        CONTROLLER,
        AIRCON,
        0x62,
        vec![PropertyData::request(0x80), PropertyData::request(0xB0)],
    );
    let received = Frame::new(
        5,
        AIRCON,
        CONTROLLER,
        0x72,
        vec![PropertyData::new(0x80, vec![0x30])],
    );
    let report = check_flow(&sent, &received);
    assert!(report.contains(&FlowViolation::IncompleteResponse { sent: 2, received: 1 }));
    assert!(report.contains(&FlowViolation::MissingProperty { epc: 0xB0 }));

    let mut too_many = get_response();
    too_many.properties.push(PropertyData::new(0x80, vec![0x31]));
    too_many.operation_count = 2;
    let report = check_flow(&get_request(), &too_many);
    assert!(report.contains(&FlowViolation::TooManyOperations { sent: 1, received: 2 }));
}

/// Tests data rules of write and read responses.
#[test]
fn test_data_rules() {
    let set = Frame::new(6, CONTROLLER, AIRCON, 0x61, vec![PropertyData::new(0x80, vec![0x30])]);
    let ok = Frame::new(6, AIRCON, CONTROLLER, 0x71, vec![PropertyData::request(0x80)]);
    assert!(check_flow(&set, &ok).is_clean());

    let mut empty_read = get_response();
    empty_read.properties = vec![PropertyData::request(0x80)];
    let report = check_flow(&get_request(), &empty_read);
    assert!(report.contains(&FlowViolation::MissingData { epc: 0x80 }));
}

/// Tests that an INFC reply is exempt from the low-nibble rule.
#[test]
fn test_infc_exemption() {
    let mut received = get_response();
    received.service = 0x74;
    let report = check_flow(&get_request(), &received);
    assert!(!report
        .all()
        .any(|v| matches!(v, FlowViolation::ServiceCodeFamily { .. })));
}

/// Tests the combined exchange: Set group counts and the Get group pass.
#[test]
fn test_combined_exchange() {
    let sent = Frame::new(8, CONTROLLER, AIRCON, 0x6E, vec![PropertyData::new(0x80, vec![0x30])])
        .with_get_group(vec![PropertyData::request(0xB3)]);

    // OPC counts the Set side; the literal rule subtracts OPCGet from it.
    let mut received = Frame::new(8, AIRCON, CONTROLLER, 0x7E, vec![PropertyData::request(0x80)])
        .with_get_group(vec![PropertyData::new(0xB3, vec![0x1A])]);
    received.operation_count = 2;

    let report = check_flow(&sent, &received);
    assert!(report.get_group_violations.is_empty(), "{:?}", report);
    assert!(!report
        .violations
        .iter()
        .any(|v| matches!(v, FlowViolation::OperationCountMismatch { .. })));

    let empty_get = Frame::new(8, AIRCON, CONTROLLER, 0x7E, vec![PropertyData::request(0x80)])
        .with_get_group(vec![PropertyData::request(0xB3)]);
    let report = check_flow(&sent, &empty_get);
    assert!(report
        .get_group_violations
        .contains(&FlowViolation::MissingData { epc: 0xB3 }));
}

/// Tests that violations serialize for result files.
#[test]
fn test_report_serializes() {
    let mut received = get_response();
    received.service = 0x52;
    let report = check_flow(&get_request(), &received);
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("ServiceCodeFamily"));
}
