//! # Request/Response Flow Validation
//!
//! Cross-checks a sent frame against the frame received in reply. The check
//! is stateless: every rule is evaluated independently and each failure is
//! logged and collected, so one exchange can report several violations.
//!
//! Combined write & read exchanges (ESV 0x6E) get one additional pass over
//! their Get group, checked as a plain Get (0x62) / Get_Res (0x72) pair.

use crate::constants::{
    ESV_FAMILY_NOT_ACCEPTED, ESV_FAMILY_RESPONSE, ESV_GET, ESV_GET_RES, ESV_GET_SNA, ESV_INFC,
    ESV_INF_SNA, ESV_SETC_SNA, ESV_SETGET, ESV_SETGET_RES, ESV_SETI_SNA, ESV_SET_RES,
};
use crate::echonet::frame::{Frame, ObjectCode};
use serde::Serialize;
use std::fmt;

/// Log target of flow violations.
pub const FLOW_LOG_TARGET: &str = "echonet_audit::flow";

/// One protocol-level inconsistency between a request and its reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FlowViolation {
    TransactionIdMismatch { sent: u16, received: u16 },
    /// The reply's service code is not a response to the request: the low
    /// nibble differs (and the reply is not INFC), or a not-accepted reply
    /// names no rejected property.
    ServiceCodeFamily { sent: u8, received: u8 },
    ObjectCodesNotSwapped {
        sent_source: ObjectCode,
        sent_destination: ObjectCode,
        received_source: ObjectCode,
        received_destination: ObjectCode,
    },
    OperationCountMismatch { declared: u8, present: usize },
    ServiceCodeOutOfRange { received: u8 },
    TooManyOperations { sent: u8, received: u8 },
    /// A positive response must answer every requested property.
    IncompleteResponse { sent: u8, received: u8 },
    /// Received EPC that was never requested.
    UnexpectedProperty { epc: u8 },
    /// Requested EPC absent from the reply.
    MissingProperty { epc: u8 },
    /// Write responses must not carry data.
    UnexpectedData { epc: u8, pdc: u8 },
    /// Read responses must carry data.
    MissingData { epc: u8 },
}

impl fmt::Display for FlowViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowViolation::TransactionIdMismatch { sent, received } => write!(
                f,
                "transaction id mismatch (sent 0x{sent:04X}, received 0x{received:04X})"
            ),
            FlowViolation::ServiceCodeFamily { sent, received } => write!(
                f,
                "service code 0x{received:02X} does not answer 0x{sent:02X}"
            ),
            FlowViolation::ObjectCodesNotSwapped {
                sent_source,
                sent_destination,
                received_source,
                received_destination,
            } => write!(
                f,
                "object codes not swapped (sent {sent_source}->{sent_destination}, received {received_source}->{received_destination})"
            ),
            FlowViolation::OperationCountMismatch { declared, present } => write!(
                f,
                "OPC {declared} but {present} property units present"
            ),
            FlowViolation::ServiceCodeOutOfRange { received } => {
                write!(f, "service code 0x{received:02X} is not a response code")
            }
            FlowViolation::TooManyOperations { sent, received } => {
                write!(f, "received OPC {received} exceeds sent OPC {sent}")
            }
            FlowViolation::IncompleteResponse { sent, received } => write!(
                f,
                "positive response answers {received} of {sent} properties"
            ),
            FlowViolation::UnexpectedProperty { epc } => {
                write!(f, "EPC 0x{epc:02X} received but not requested")
            }
            FlowViolation::MissingProperty { epc } => {
                write!(f, "EPC 0x{epc:02X} requested but absent from the reply")
            }
            FlowViolation::UnexpectedData { epc, pdc } => {
                write!(f, "EPC 0x{epc:02X} carries {pdc} data bytes in a write response")
            }
            FlowViolation::MissingData { epc } => {
                write!(f, "EPC 0x{epc:02X} carries no data in a read response")
            }
        }
    }
}

/// Violations found for one exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlowReport {
    pub violations: Vec<FlowViolation>,
    /// Violations of the Get group of a combined exchange.
    pub get_group_violations: Vec<FlowViolation>,
}

impl FlowReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.get_group_violations.is_empty()
    }

    /// Iterates over both groups' violations.
    pub fn all(&self) -> impl Iterator<Item = &FlowViolation> {
        self.violations.iter().chain(self.get_group_violations.iter())
    }

    pub fn contains(&self, violation: &FlowViolation) -> bool {
        self.all().any(|v| v == violation)
    }
}

/// Checks `received` against `sent`, logging every violation found.
pub fn check_flow(sent: &Frame, received: &Frame) -> FlowReport {
    let violations = collect_violations(sent, received);
    for violation in &violations {
        log::error!(
            target: FLOW_LOG_TARGET,
            "TID 0x{:04X}: {}",
            sent.transaction_id,
            violation
        );
    }

    let get_group_violations = if sent.service == ESV_SETGET {
        let (sent_get, received_get) = get_group_pair(sent, received);
        let nested = collect_violations(&sent_get, &received_get);
        for violation in &nested {
            log::error!(
                target: FLOW_LOG_TARGET,
                "TID 0x{:04X} (Get group): {}",
                sent.transaction_id,
                violation
            );
        }
        nested
    } else {
        Vec::new()
    };

    FlowReport {
        violations,
        get_group_violations,
    }
}

/// Rewrites a combined exchange into the Get/Get_Res pair of its Get group.
fn get_group_pair(sent: &Frame, received: &Frame) -> (Frame, Frame) {
    let as_get = |frame: &Frame, service: u8| Frame {
        service,
        operation_count: frame.operation_count_get.unwrap_or(0),
        properties: frame.properties_get.clone(),
        operation_count_get: None,
        properties_get: Vec::new(),
        ..frame.clone()
    };
    (as_get(sent, ESV_GET), as_get(received, ESV_GET_RES))
}

fn response_family_consistent(sent: &Frame, received: &Frame) -> bool {
    if received.service == ESV_INFC {
        return true;
    }
    if sent.service & 0x0F != received.service & 0x0F {
        return false;
    }
    match received.service {
        // A rejected read lists the unreadable properties without data.
        ESV_GET_SNA | ESV_INF_SNA => received.properties.iter().any(|p| p.pdc == 0),
        // A rejected write echoes the refused properties with their data.
        ESV_SETI_SNA | ESV_SETC_SNA => received.properties.iter().any(|p| p.pdc != 0),
        _ => true,
    }
}

fn collect_violations(sent: &Frame, received: &Frame) -> Vec<FlowViolation> {
    let mut violations = Vec::new();

    if sent.transaction_id != received.transaction_id {
        violations.push(FlowViolation::TransactionIdMismatch {
            sent: sent.transaction_id,
            received: received.transaction_id,
        });
    }

    if !response_family_consistent(sent, received) {
        violations.push(FlowViolation::ServiceCodeFamily {
            sent: sent.service,
            received: received.service,
        });
    }

    if sent.source != received.destination || sent.destination != received.source {
        violations.push(FlowViolation::ObjectCodesNotSwapped {
            sent_source: sent.source,
            sent_destination: sent.destination,
            received_source: received.source,
            received_destination: received.destination,
        });
    }

    let present = received.properties.len();
    let declared = if sent.service == ESV_SETGET {
        received
            .operation_count
            .wrapping_sub(received.operation_count_get.unwrap_or(0))
    } else {
        received.operation_count
    };
    if declared as usize != present {
        violations.push(FlowViolation::OperationCountMismatch { declared, present });
    }

    let family = received.service & 0xF0;
    if family != ESV_FAMILY_NOT_ACCEPTED && family != ESV_FAMILY_RESPONSE {
        violations.push(FlowViolation::ServiceCodeOutOfRange {
            received: received.service,
        });
    }

    if received.operation_count > sent.operation_count {
        violations.push(FlowViolation::TooManyOperations {
            sent: sent.operation_count,
            received: received.operation_count,
        });
    }

    if family == ESV_FAMILY_RESPONSE && received.operation_count != sent.operation_count {
        violations.push(FlowViolation::IncompleteResponse {
            sent: sent.operation_count,
            received: received.operation_count,
        });
    }

    for property in &received.properties {
        if sent.property(property.epc).is_none() {
            violations.push(FlowViolation::UnexpectedProperty { epc: property.epc });
        }
    }
    for property in &sent.properties {
        if received.property(property.epc).is_none() {
            violations.push(FlowViolation::MissingProperty { epc: property.epc });
        }
    }

    match received.service {
        ESV_SET_RES | ESV_SETGET_RES => {
            for property in &received.properties {
                if property.pdc != 0 || !property.edt.is_empty() {
                    violations.push(FlowViolation::UnexpectedData {
                        epc: property.epc,
                        pdc: property.pdc,
                    });
                }
            }
        }
        ESV_GET_RES => {
            for property in &received.properties {
                if property.pdc == 0 {
                    violations.push(FlowViolation::MissingData { epc: property.epc });
                }
            }
        }
        _ => {}
    }

    violations
}
