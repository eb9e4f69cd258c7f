//! Integration tests for discovery and the audit drivers against a mock node.

use echonet_audit::audit::epc_fuzz::{unused_epcs, INVALID_OPERATION_STATUS, FUZZED_SERVICES};
use echonet_audit::audit::opc_fuzz::MAX_OPERATIONS;
use echonet_audit::audit::{check_transcript, exchange, AuditKind, Exchange, Transcript, ValueFinding};
use echonet_audit::audit::{epc_fuzz, opc_fuzz};
use echonet_audit::constants::{ESV_GET, ESV_SETC, ESV_SETI};
use echonet_audit::echonet::property_map::encode_property_map;
use echonet_audit::echonet::transport_mock::{MockReply, MockTransport};
use echonet_audit::error::EchonetError;
use echonet_audit::{Frame, Instance, Node, ObjectCode, PropertyData, SchemaRegistry, ValueGenerator};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

const AIRCON: ObjectCode = ObjectCode::new(0x01, 0x30, 0x01);
const TIMEOUT: Duration = Duration::from_millis(20);

const DOCUMENT: &str = r##"{
  "definitions": {
    "state_ON-OFF_3031": {
      "type": "state",
      "size": 1,
      "enum": [{"edt": "0x30", "name": "true"}, {"edt": "0x31", "name": "false"}]
    }
  },
  "devices": {
    "0x0000": {
      "className": {"en": "Super class"},
      "elProperties": {
        "0x80": {
          "propertyName": {"en": "Operation status"},
          "accessRule": {"get": "required", "set": "optional", "inf": "required"},
          "data": {"$ref": "#/definitions/state_ON-OFF_3031"}
        },
        "0x9F": {
          "propertyName": {"en": "Get property map"},
          "accessRule": {"get": "required", "set": "notApplicable", "inf": "notApplicable"},
          "data": {"type": "raw", "minSize": 1, "maxSize": 17}
        }
      }
    },
    "0x0130": {
      "className": {"en": "Home air conditioner"},
      "elProperties": {
        "0xB0": {
          "propertyName": {"en": "Operation mode setting"},
          "accessRule": {"get": "required", "set": "required", "inf": "required"},
          "data": {"type": "state", "enum": [{"edt": "0x41", "name": "auto"}, {"edt": "0x42", "name": "cooling"}]}
        },
        "0xB3": {
          "propertyName": {"en": "Temperature setting"},
          "accessRule": {"get": "required", "set": "required", "inf": "optional"},
          "data": {"type": "number", "format": "uint8", "minimum": 0, "maximum": 50}
        }
      }
    },
    "0x0EF0": {
      "className": {"en": "Node profile"},
      "elProperties": {
        "0xD6": {
          "propertyName": {"en": "Self-node instance list S"},
          "accessRule": {"get": "required", "set": "notApplicable", "inf": "notApplicable"},
          "data": {"type": "raw", "minSize": 4, "maxSize": 253}
        }
      }
    }
  }
}"##;

fn registry() -> SchemaRegistry {
    SchemaRegistry::from_json_str(DOCUMENT).unwrap()
}

fn generator() -> ValueGenerator<StdRng> {
    ValueGenerator::new(StdRng::seed_from_u64(0x3610))
}

fn aircon() -> Instance {
    registry().instance(AIRCON, "M").unwrap()
}

fn reply(request: &Frame, service: u8, properties: Vec<PropertyData>) -> Frame {
    Frame::new(
        request.transaction_id,
        request.destination,
        request.source,
        service,
        properties,
    )
}

/// A well-behaved node hosting one air conditioner and an unknown meter.
fn conforming_node(request: &Frame) -> Option<Frame> {
    let first = request.properties.first()?;
    match request.service {
        ESV_GET => {
            let edt = match first.epc {
                0xD6 => vec![0x02, 0x01, 0x30, 0x01, 0x02, 0x88, 0x01],
                0x9E => encode_property_map(&[0x80, 0xB0, 0xB3]),
                0x9F => encode_property_map(&[0x80, 0x9D, 0x9E, 0x9F, 0xB0, 0xB3]),
                0x9D => encode_property_map(&[0x80, 0xB0]),
                0x80 => vec![0x30],
                0xB3 => vec![0x1A],
                _ => {
                    let rejected = request
                        .properties
                        .iter()
                        .map(|p| PropertyData::request(p.epc))
                        .collect();
                    return Some(reply(request, 0x52, rejected));
                }
            };
            Some(reply(request, 0x72, vec![PropertyData::new(first.epc, edt)]))
        }
        ESV_SETC => {
            let known = request.properties.iter().all(|p| match p.epc {
                0x80 => matches!(p.edt.as_slice(), [0x30] | [0x31]),
                0xB0 | 0xB3 => true,
                _ => false,
            });
            if known {
                let accepted = request
                    .properties
                    .iter()
                    .map(|p| PropertyData::request(p.epc))
                    .collect();
                Some(reply(request, 0x71, accepted))
            } else {
                Some(reply(request, 0x51, request.properties.clone()))
            }
        }
        _ => None,
    }
}

/// Tests discovery of the node profile and a known device class.
#[tokio::test]
async fn test_discover_builds_instances() {
    let mut mock = MockTransport::with_responder(conforming_node);
    let node = Node::discover(&mut mock, &registry(), "M", TIMEOUT).await.unwrap();

    let codes: Vec<ObjectCode> = node.instances.iter().map(|i| i.object_code).collect();
    assert_eq!(codes, vec![ObjectCode::NODE_PROFILE, AIRCON]);

    let aircon = node.instance(AIRCON).unwrap();
    let mode = aircon.property(0xB0).unwrap();
    assert!(mode.implements_get && mode.implements_set && mode.implements_inf);
    let temperature = aircon.property(0xB3).unwrap();
    assert!(temperature.implements_set);
    assert!(!temperature.implements_inf);

    let sent = mock.sent_frames();
    assert_eq!(sent.len(), 7);
    assert_eq!(sent[0].destination, ObjectCode::NODE_PROFILE);
    assert_eq!(sent[0].properties[0].epc, 0xD6);
    let tids: Vec<u16> = sent.iter().map(|f| f.transaction_id).collect();
    assert_eq!(tids, (1..=7).collect::<Vec<u16>>());
    let aircon_maps: Vec<u8> = sent[4..].iter().map(|f| f.properties[0].epc).collect();
    assert_eq!(aircon_maps, vec![0x9E, 0x9F, 0x9D]);
}

/// Tests the fallback to the transmission-only node profile.
#[tokio::test]
async fn test_discover_send_only_fallback() {
    let mut mock = MockTransport::with_responder(conforming_node);
    mock.fail_next_send("network unreachable");
    let node = Node::discover(&mut mock, &registry(), "M", TIMEOUT).await.unwrap();

    let send_only = ObjectCode::new(0x0E, 0xF0, 0x02);
    assert_eq!(node.instances[0].object_code, send_only);
    assert_eq!(mock.sent_frames()[0].destination, send_only);
}

/// Tests that missing property maps leave the flags unset.
#[tokio::test]
async fn test_discover_without_property_maps() {
    let mut mock = MockTransport::new();
    let request = Frame::new(1, ObjectCode::NODE_PROFILE, ObjectCode::NODE_PROFILE, ESV_GET, vec![]);
    mock.queue_frame(reply(
        &request,
        0x72,
        vec![PropertyData::new(0xD6, vec![0x01, 0x01, 0x30, 0x01])],
    ));

    let node = Node::discover(&mut mock, &registry(), "M", TIMEOUT).await.unwrap();
    let aircon = node.instance(AIRCON).unwrap();
    assert!(aircon
        .properties
        .iter()
        .all(|p| !p.implements_get && !p.implements_set && !p.implements_inf));
}

/// Tests that a transport failure while reading property maps aborts discovery.
#[tokio::test]
async fn test_discover_transport_error() {
    let mut mock = MockTransport::new();
    let request = Frame::new(1, ObjectCode::NODE_PROFILE, ObjectCode::NODE_PROFILE, ESV_GET, vec![]);
    mock.queue_frame(reply(&request, 0x72, vec![PropertyData::new(0xD6, vec![0x00])]));
    mock.queue_reply(MockReply::Error("connection reset".into()));

    let result = Node::discover(&mut mock, &registry(), "M", TIMEOUT).await;
    assert!(matches!(result, Err(EchonetError::Transport(_))));
}

/// Tests that a silent node fails discovery with a timeout.
#[tokio::test]
async fn test_discover_silent_node() {
    let mut mock = MockTransport::new();
    let result = Node::discover(&mut mock, &registry(), "M", TIMEOUT).await;
    assert!(result.unwrap_err().is_timeout());
}

/// Tests the OPC fuzz: 255 SetC rounds with one more unit each.
#[tokio::test]
async fn test_opc_fuzz_rounds() {
    let mut mock = MockTransport::with_responder(conforming_node);
    let instance = aircon();
    let transcript = opc_fuzz(&mut mock, &instance, &mut generator(), TIMEOUT)
        .await
        .unwrap();

    assert_eq!(transcript.kind, AuditKind::OpcFuzz);
    assert_eq!(transcript.exchanges.len(), MAX_OPERATIONS as usize);
    for (round, exchange) in transcript.exchanges.iter().enumerate() {
        assert_eq!(exchange.sent.service, ESV_SETC);
        assert_eq!(exchange.sent.operation_count as usize, round + 1);
        assert_eq!(exchange.sent.properties.len(), round + 1);
        for unit in &exchange.sent.properties {
            assert!(instance.validate_value(unit.epc, &unit.edt).unwrap());
        }
    }
    // every round repeats the units of the previous one
    let last = &transcript.exchanges[254].sent.properties;
    assert_eq!(&last[..254], &transcript.exchanges[253].sent.properties[..]);

    let report = check_transcript(&[instance], &transcript);
    assert!(report.is_clean(), "{report}");
}

/// Tests that missing replies are recorded and the run continues.
#[tokio::test]
async fn test_opc_fuzz_silent_device() {
    let mut mock = MockTransport::new();
    let instance = aircon();
    let transcript = opc_fuzz(&mut mock, &instance, &mut generator(), TIMEOUT)
        .await
        .unwrap();

    assert_eq!(transcript.unanswered(), MAX_OPERATIONS as usize);
    let report = check_transcript(&[instance], &transcript);
    assert_eq!(report.no_response_count(), MAX_OPERATIONS as usize);
    assert!(!report.is_clean());
}

/// Tests that a send failure aborts the run with the number of rounds done.
#[tokio::test]
async fn test_opc_fuzz_aborts_on_send_failure() {
    let mut mock = MockTransport::with_responder(conforming_node);
    mock.fail_next_send("host down");
    let err = opc_fuzz(&mut mock, &aircon(), &mut generator(), TIMEOUT)
        .await
        .unwrap_err();
    match err {
        EchonetError::FuzzAborted { rounds, source } => {
            assert_eq!(rounds, 0);
            assert!(matches!(*source, EchonetError::Transport(_)));
        }
        other => panic!("expected FuzzAborted, got {other:?}"),
    }
}

/// Tests that an instance without settable properties yields no exchanges.
#[tokio::test]
async fn test_opc_fuzz_nothing_settable() {
    let mut mock = MockTransport::with_responder(conforming_node);
    let profile = registry().instance(ObjectCode::NODE_PROFILE, "M").unwrap();
    let transcript = opc_fuzz(&mut mock, &profile, &mut generator(), TIMEOUT)
        .await
        .unwrap();
    assert!(transcript.exchanges.is_empty());
    assert!(mock.sent_frames().is_empty());
}

/// Tests the EPC fuzz: SetI, SetC and Get rounds with undefined EPCs, then
/// the same services with an invalid operation status.
#[tokio::test]
async fn test_epc_fuzz_rounds() {
    let mut mock = MockTransport::with_responder(conforming_node);
    let instance = aircon();
    let transcript = epc_fuzz(&mut mock, &instance, &mut generator(), TIMEOUT)
        .await
        .unwrap();

    assert_eq!(transcript.exchanges.len(), 6);
    assert_eq!(mock.sent_frames().len(), 6);
    let services: Vec<u8> = transcript.exchanges.iter().map(|e| e.sent.service).collect();
    assert_eq!(services, [FUZZED_SERVICES, FUZZED_SERVICES].concat());

    let unused = unused_epcs(&instance);
    for exchange in &transcript.exchanges[..3] {
        let unit = &exchange.sent.properties[0];
        assert!(unused.contains(&unit.epc));
        assert_eq!(unit.edt.len(), 1);
    }
    for exchange in &transcript.exchanges[3..] {
        let unit = &exchange.sent.properties[0];
        assert_eq!(unit.epc, 0x80);
        assert_eq!(unit.edt, vec![INVALID_OPERATION_STATUS]);
    }

    let report = check_transcript(&[instance], &transcript);
    // SetI: silent
    assert!(report.exchanges[0].no_response);
    // SetC: rejected, echoing the unknown EPC with its data
    assert!(report.exchanges[1].flow.is_clean());
    assert!(matches!(
        report.exchanges[1].findings[0],
        ValueFinding::UnknownProperty { .. }
    ));
    // Get: rejected without data
    assert!(report.exchanges[2].is_clean());

    assert!(report.exchanges[3].no_response);
    // SetC of 0x11: rejected, the echoed value is out of range
    let rejected = transcript.exchanges[4].received.as_ref().unwrap();
    assert_eq!(rejected.service, 0x51);
    assert!(report.exchanges[4].flow.is_clean());
    assert_eq!(
        report.exchanges[4].findings,
        vec![ValueFinding::OutOfRange {
            epc: 0x80,
            edt: vec![INVALID_OPERATION_STATUS]
        }]
    );
    // Get: answered with the current status
    assert!(report.exchanges[5].is_clean());
}

/// Tests that a class defining every EPC still gets the invalid-value rounds.
#[tokio::test]
async fn test_epc_fuzz_without_unused_epcs() {
    let mut mock = MockTransport::with_responder(conforming_node);
    let mut instance = aircon();
    let template = instance.property(0x80).unwrap().clone();
    for epc in unused_epcs(&instance) {
        let mut descriptor = template.clone();
        descriptor.epc = epc;
        instance.properties.push(descriptor);
    }
    assert!(unused_epcs(&instance).is_empty());

    let transcript = epc_fuzz(&mut mock, &instance, &mut generator(), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(transcript.exchanges.len(), 3);
    assert!(transcript
        .exchanges
        .iter()
        .all(|e| e.sent.properties[0].epc == 0x80));
}

/// Tests the unused EPC range of an instance.
#[test]
fn test_unused_epcs() {
    let unused = unused_epcs(&aircon());
    assert_eq!(unused.len(), 128 - 4);
    assert!(!unused.contains(&0x80));
    assert!(!unused.contains(&0xB3));
    assert!(unused.contains(&0x81));
    assert!(unused.contains(&0xFF));
}

/// Tests value findings of the post-run check.
#[test]
fn test_check_value_findings() {
    let instance = aircon();
    let request = Frame::new(
        9,
        ObjectCode::NODE_PROFILE,
        AIRCON,
        ESV_GET,
        vec![PropertyData::request(0xB3), PropertyData::request(0xB0)],
    );
    let mut transcript = Transcript::new(AuditKind::Manual, AIRCON);
    transcript.exchanges.push(Exchange {
        received: Some(reply(
            &request,
            0x72,
            vec![PropertyData::new(0xB3, vec![60]), PropertyData::new(0xB0, vec![0x42])],
        )),
        sent: request.clone(),
    });

    let mut stranger = reply(&request, 0x72, vec![PropertyData::new(0xB3, vec![20])]);
    stranger.source = ObjectCode::new(0x02, 0x88, 0x01);
    transcript.exchanges.push(Exchange {
        sent: request,
        received: Some(stranger),
    });

    let report = check_transcript(&[instance], &transcript);
    assert_eq!(
        report.exchanges[0].findings,
        vec![ValueFinding::OutOfRange { epc: 0xB3, edt: vec![60] }]
    );
    assert!(report.exchanges[1]
        .findings
        .contains(&ValueFinding::UnknownInstance {
            object: ObjectCode::new(0x02, 0x88, 0x01)
        }));
    assert_eq!(report.finding_count(), 2);
    assert!(report.to_string().starts_with("0x013001: 2 exchanges"));
}

/// Tests manual Get and Set exchanges.
#[test]
fn test_manual_exchange() {
    tokio_test::block_on(async {
        let instance = aircon();
        let mut mock = MockTransport::with_responder(conforming_node);
        let mut generator = generator();

        let get = exchange(&mut mock, &instance, ESV_GET, &[0x80], None, &mut generator, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(get.sent.properties, vec![PropertyData::request(0x80)]);
        assert_eq!(get.received.unwrap().properties[0].edt, vec![0x30]);

        let set = exchange(&mut mock, &instance, ESV_SETC, &[0xB3], Some(&[0x14][..]), &mut generator, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(set.sent.properties[0].edt, vec![0x14]);
        assert_eq!(set.received.unwrap().service, 0x71);

        let generated = exchange(&mut mock, &instance, ESV_SETI, &[0xB0, 0xB3], None, &mut generator, TIMEOUT)
            .await
            .unwrap();
        assert!(generated.received.is_none());
        for unit in &generated.sent.properties {
            assert!(instance.validate_value(unit.epc, &unit.edt).unwrap());
        }
    });
}

/// Tests requests the manual exchange refuses to build.
#[tokio::test]
async fn test_manual_exchange_errors() {
    let instance = aircon();
    let mut mock = MockTransport::new();
    let mut generator = generator();

    for (service, epcs) in [(ESV_SETC, &[0xEE][..]), (0x6E, &[0x80][..]), (ESV_GET, &[][..])] {
        let result = exchange(&mut mock, &instance, service, epcs, None, &mut generator, TIMEOUT).await;
        assert!(matches!(result, Err(EchonetError::SchemaMismatch(_))), "ESV 0x{service:02X}");
    }
    assert!(mock.sent_frames().is_empty());
}

/// Tests that reports serialize for result files.
#[tokio::test]
async fn test_transcript_serializes() {
    let mut mock = MockTransport::with_responder(conforming_node);
    let instance = aircon();
    let transcript = epc_fuzz(&mut mock, &instance, &mut generator(), TIMEOUT)
        .await
        .unwrap();
    let report = check_transcript(&[instance], &transcript);

    let dir = tempfile::tempdir().unwrap();
    let path = echonet_audit::audit::write_results(
        dir.path(),
        "epc-fuzz_013001",
        &serde_json::json!({"transcript": transcript, "report": report}),
    )
    .unwrap();
    let body = std::fs::read_to_string(path).unwrap();
    assert!(body.contains("\"UnknownProperty\""));
    assert!(body.contains("\"no_response\": true"));
}
