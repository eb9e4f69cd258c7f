//! OPC fuzzing: SetC requests carrying 1 to 255 property units.
//!
//! Round `n` sends the `n` units of round `n - 1` plus one more, chosen at
//! random among the instance's settable properties with a freshly generated
//! value. Every round uses a new random TID.

use super::{send_and_collect, AuditKind, Transcript};
use crate::constants::ESV_SETC;
use crate::device::{Instance, PropertyDescriptor};
use crate::echonet::frame::{Frame, ObjectCode, PropertyData};
use crate::echonet::transport::EchonetTransport;
use crate::error::EchonetError;
use crate::payload::generate::ValueGenerator;
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;

/// Largest OPC a frame can declare.
pub const MAX_OPERATIONS: u8 = u8::MAX;

/// Runs the OPC fuzz against `instance`.
///
/// A missing reply is recorded and the run continues; any other transport
/// or generation error aborts with [`EchonetError::FuzzAborted`].
pub async fn opc_fuzz<T, R>(
    transport: &mut T,
    instance: &Instance,
    generator: &mut ValueGenerator<R>,
    timeout: Duration,
) -> Result<Transcript, EchonetError>
where
    T: EchonetTransport + ?Sized,
    R: Rng + Send,
{
    let mut transcript = Transcript::new(AuditKind::OpcFuzz, instance.object_code);
    let settable: Vec<&PropertyDescriptor> = instance.settable().collect();
    if settable.is_empty() {
        log::warn!(
            "{} ({}) has no settable properties, nothing to fuzz",
            instance.object_code,
            instance.class_name
        );
        return Ok(transcript);
    }

    let mut properties: Vec<PropertyData> = Vec::with_capacity(MAX_OPERATIONS as usize);
    for opc in 1..=MAX_OPERATIONS {
        let rounds = transcript.exchanges.len();
        let abort = |source: EchonetError| EchonetError::FuzzAborted {
            rounds,
            source: Box::new(source),
        };

        let Some(descriptor) = settable.choose(generator.rng_mut()).copied() else {
            break;
        };
        let edt = generator
            .generate(&descriptor.schema)
            .map_err(|e| abort(e.within(format!("EPC 0x{:02X}", descriptor.epc))))?;
        properties.push(PropertyData::new(descriptor.epc, edt));

        let tid = generator.rng_mut().gen();
        let frame = Frame::new(
            tid,
            ObjectCode::NODE_PROFILE,
            instance.object_code,
            ESV_SETC,
            properties.clone(),
        );
        log::debug!("OPC {opc}: TID 0x{tid:04X} to {}", instance.object_code);

        let exchange = send_and_collect(transport, frame, timeout)
            .await
            .map_err(abort)?;
        transcript.exchanges.push(exchange);
    }

    log::info!(
        "OPC fuzz of {}: {} rounds, {} unanswered",
        instance.object_code,
        transcript.exchanges.len(),
        transcript.unanswered()
    );
    Ok(transcript)
}
