//! # Conformance Audit
//!
//! Drivers that exercise one device instance and record what happened:
//!
//! - [`opc_fuzz`](opc_fuzz::opc_fuzz): SetC requests with 1 to 255 property units
//! - [`epc_fuzz`](epc_fuzz::epc_fuzz): undefined property codes, then an invalid operation status
//! - [`exchange`]: one manual Get/Set style request
//!
//! Every driver produces [`Exchange`]s; [`check`] then runs the flow
//! validator and the value validator over them.

pub mod check;
pub mod epc_fuzz;
pub mod opc_fuzz;

pub use check::{check_exchange, check_transcript, CheckReport, ExchangeCheck, ValueFinding};
pub use epc_fuzz::epc_fuzz;
pub use opc_fuzz::opc_fuzz;

use crate::constants::{ESV_GET, ESV_INF_REQ, ESV_SETC, ESV_SETI};
use crate::device::Instance;
use crate::echonet::frame::{Frame, ObjectCode, PropertyData};
use crate::echonet::transport::EchonetTransport;
use crate::error::EchonetError;
use crate::payload::generate::ValueGenerator;
use crate::util::logging::log_frame_summary;
use chrono::Local;
use rand::Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A request and the reply it drew, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exchange {
    pub sent: Frame,
    pub received: Option<Frame>,
}

/// Which driver produced a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditKind {
    OpcFuzz,
    EpcFuzz,
    Manual,
}

impl AuditKind {
    pub fn name(self) -> &'static str {
        match self {
            AuditKind::OpcFuzz => "opc-fuzz",
            AuditKind::EpcFuzz => "epc-fuzz",
            AuditKind::Manual => "exchange",
        }
    }
}

/// Ordered exchanges of one audit run against one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transcript {
    pub kind: AuditKind,
    pub target: ObjectCode,
    pub exchanges: Vec<Exchange>,
}

impl Transcript {
    pub fn new(kind: AuditKind, target: ObjectCode) -> Self {
        Transcript {
            kind,
            target,
            exchanges: Vec::new(),
        }
    }

    /// Number of requests that drew no reply.
    pub fn unanswered(&self) -> usize {
        self.exchanges.iter().filter(|e| e.received.is_none()).count()
    }
}

/// Sends `frame` and waits for one reply; a timeout yields `None`.
pub(crate) async fn send_and_collect<T>(
    transport: &mut T,
    frame: Frame,
    timeout: Duration,
) -> Result<Exchange, EchonetError>
where
    T: EchonetTransport + ?Sized,
{
    log_frame_summary("sent", &frame);
    transport.send(&frame).await?;
    let received = match transport.receive(timeout).await {
        Ok(reply) => {
            log_frame_summary("received", &reply);
            Some(reply)
        }
        Err(e) if e.is_timeout() => {
            log::warn!(
                "TID 0x{:04X}: no reply from {} within {:?}",
                frame.transaction_id,
                transport.peer(),
                timeout
            );
            None
        }
        Err(e) => return Err(e),
    };
    Ok(Exchange {
        sent: frame,
        received,
    })
}

/// Performs one manual request on `instance`.
///
/// Get and INF_REQ send empty units. Set services send `edt` when given,
/// otherwise a value generated from each property's schema.
pub async fn exchange<T, R>(
    transport: &mut T,
    instance: &Instance,
    service: u8,
    epcs: &[u8],
    edt: Option<&[u8]>,
    generator: &mut ValueGenerator<R>,
    timeout: Duration,
) -> Result<Exchange, EchonetError>
where
    T: EchonetTransport + ?Sized,
    R: Rng + Send,
{
    if epcs.is_empty() {
        return Err(EchonetError::SchemaMismatch("no EPC to request".to_string()));
    }

    let mut properties = Vec::with_capacity(epcs.len());
    for &epc in epcs {
        let unit = match service {
            ESV_GET | ESV_INF_REQ => PropertyData::request(epc),
            ESV_SETI | ESV_SETC => match edt {
                Some(edt) => PropertyData::new(epc, edt.to_vec()),
                None => {
                    let descriptor = instance.property(epc).ok_or_else(|| {
                        EchonetError::SchemaMismatch(format!(
                            "{} defines no property 0x{epc:02X}; pass an EDT",
                            instance.object_code
                        ))
                    })?;
                    let value = generator
                        .generate(&descriptor.schema)
                        .map_err(|e| e.within(format!("EPC 0x{epc:02X}")))?;
                    PropertyData::new(epc, value)
                }
            },
            other => {
                return Err(EchonetError::SchemaMismatch(format!(
                    "service 0x{other:02X} is not supported for manual exchanges"
                )))
            }
        };
        properties.push(unit);
    }

    let tid = generator.rng_mut().gen();
    let frame = Frame::new(
        tid,
        ObjectCode::NODE_PROFILE,
        instance.object_code,
        service,
        properties,
    );
    send_and_collect(transport, frame, timeout).await
}

/// Serializes `value` as pretty JSON into `dir`, named after `label` and
/// the current local time. Returns the path written.
pub fn write_results<S: Serialize>(dir: &Path, label: &str, value: &S) -> Result<PathBuf, EchonetError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| EchonetError::Output(format!("create {}: {e}", dir.display())))?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{label}_{stamp}.json"));
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| EchonetError::Output(format!("serialize {label}: {e}")))?;
    std::fs::write(&path, json)
        .map_err(|e| EchonetError::Output(format!("write {}: {e}", path.display())))?;

    log::info!("results written to {}", path.display());
    Ok(path)
}
