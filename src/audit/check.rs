//! Post-run checking of recorded exchanges.
//!
//! Each exchange gets a flow check; every received property unit with data
//! is then validated against the schema of the instance that sent it.
//! Problems are collected per property and never stop the check.

use super::{Exchange, Transcript};
use crate::device::{find_instance, Instance};
use crate::echonet::flow::{check_flow, FlowReport, FLOW_LOG_TARGET};
use crate::echonet::frame::{Frame, ObjectCode, PropertyData};
use crate::payload::validate::validate;
use crate::util::hex::format_hex_compact;
use serde::Serialize;
use std::fmt;

/// Outcome of validating one received value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValueFinding {
    /// The value matches no alternative of the property schema.
    OutOfRange { epc: u8, edt: Vec<u8> },
    /// The instance schema does not define this EPC.
    UnknownProperty { epc: u8 },
    /// The reply names an object that was not discovered.
    UnknownInstance { object: ObjectCode },
    /// The schema could not interpret the value.
    SchemaError { epc: u8, message: String },
}

impl fmt::Display for ValueFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueFinding::OutOfRange { epc, edt } => write!(
                f,
                "EPC 0x{epc:02X} value {} is out of range",
                format_hex_compact(edt)
            ),
            ValueFinding::UnknownProperty { epc } => {
                write!(f, "EPC 0x{epc:02X} is not defined for this class")
            }
            ValueFinding::UnknownInstance { object } => {
                write!(f, "reply from undiscovered object {object}")
            }
            ValueFinding::SchemaError { epc, message } => {
                write!(f, "EPC 0x{epc:02X}: {message}")
            }
        }
    }
}

/// Check result of one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeCheck {
    pub transaction_id: u16,
    pub service: u8,
    pub no_response: bool,
    pub flow: FlowReport,
    pub findings: Vec<ValueFinding>,
}

impl ExchangeCheck {
    pub fn is_clean(&self) -> bool {
        !self.no_response && self.flow.is_clean() && self.findings.is_empty()
    }
}

/// Check results of a whole transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub target: ObjectCode,
    pub exchanges: Vec<ExchangeCheck>,
}

impl CheckReport {
    pub fn no_response_count(&self) -> usize {
        self.exchanges.iter().filter(|e| e.no_response).count()
    }

    pub fn flow_violation_count(&self) -> usize {
        self.exchanges.iter().map(|e| e.flow.all().count()).sum()
    }

    pub fn finding_count(&self) -> usize {
        self.exchanges.iter().map(|e| e.findings.len()).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.exchanges.iter().all(ExchangeCheck::is_clean)
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} exchanges, {} without response, {} flow violations, {} value findings",
            self.target,
            self.exchanges.len(),
            self.no_response_count(),
            self.flow_violation_count(),
            self.finding_count()
        )
    }
}

/// Checks one exchange against the discovered `instances`.
pub fn check_exchange(instances: &[Instance], exchange: &Exchange) -> ExchangeCheck {
    let sent = &exchange.sent;
    let Some(received) = &exchange.received else {
        log::error!(
            target: FLOW_LOG_TARGET,
            "TID 0x{:04X}: no response to ESV 0x{:02X}",
            sent.transaction_id,
            sent.service
        );
        return ExchangeCheck {
            transaction_id: sent.transaction_id,
            service: sent.service,
            no_response: true,
            flow: FlowReport::default(),
            findings: Vec::new(),
        };
    };

    ExchangeCheck {
        transaction_id: sent.transaction_id,
        service: sent.service,
        no_response: false,
        flow: check_flow(sent, received),
        findings: check_values(instances, received),
    }
}

/// Checks every exchange of `transcript`.
pub fn check_transcript(instances: &[Instance], transcript: &Transcript) -> CheckReport {
    CheckReport {
        target: transcript.target,
        exchanges: transcript
            .exchanges
            .iter()
            .map(|exchange| check_exchange(instances, exchange))
            .collect(),
    }
}

fn check_values(instances: &[Instance], received: &Frame) -> Vec<ValueFinding> {
    let units: Vec<&PropertyData> = received
        .properties
        .iter()
        .chain(received.properties_get.iter())
        .filter(|unit| !unit.edt.is_empty())
        .collect();
    if units.is_empty() {
        return Vec::new();
    }

    let Some(instance) = find_instance(instances, received.source) else {
        return vec![ValueFinding::UnknownInstance {
            object: received.source,
        }];
    };

    let mut findings = Vec::new();
    for unit in units {
        let Some(descriptor) = instance.property(unit.epc) else {
            findings.push(ValueFinding::UnknownProperty { epc: unit.epc });
            continue;
        };
        match validate(&descriptor.schema, &unit.edt) {
            Ok(true) => {}
            Ok(false) => {
                log::error!(
                    "{} EPC 0x{:02X} ({}): value {} out of range",
                    instance.object_code,
                    unit.epc,
                    descriptor.name,
                    format_hex_compact(&unit.edt)
                );
                findings.push(ValueFinding::OutOfRange {
                    epc: unit.epc,
                    edt: unit.edt.clone(),
                });
            }
            Err(e) => {
                log::error!("{} EPC 0x{:02X}: {e}", instance.object_code, unit.epc);
                findings.push(ValueFinding::SchemaError {
                    epc: unit.epc,
                    message: e.to_string(),
                });
            }
        }
    }
    findings
}
