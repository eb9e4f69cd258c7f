//! EPC fuzzing: requests a conforming device has to turn down.
//!
//! The first phase names property codes the class does not define; the
//! second names the operation status (0x80) with a value outside its state
//! set. A conforming device rejects both with a not-accepted (0x5X) reply,
//! or stays silent for SetI.

use super::{send_and_collect, AuditKind, Transcript};
use crate::constants::{EPC_OPERATION_STATUS, ESV_GET, ESV_SETC, ESV_SETI};
use crate::device::Instance;
use crate::echonet::frame::{Frame, ObjectCode, PropertyData};
use crate::echonet::transport::EchonetTransport;
use crate::error::EchonetError;
use crate::payload::generate::ValueGenerator;
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;

/// Services sent, one round each per phase.
pub const FUZZED_SERVICES: [u8; 3] = [ESV_SETI, ESV_SETC, ESV_GET];

/// EDT sent with the operation status in the second phase.
pub const INVALID_OPERATION_STATUS: u8 = 0x11;

/// Property codes in 0x80..=0xFF that `instance` does not define.
pub fn unused_epcs(instance: &Instance) -> Vec<u8> {
    (0x80..=0xFF)
        .filter(|&epc| instance.property(epc).is_none())
        .collect()
}

/// Runs the undefined-EPC phase followed by the invalid-value phase against
/// `instance`. Each phase sends one SetI, SetC and Get round.
///
/// The first phase is skipped when the class defines every EPC.
pub async fn epc_fuzz<T, R>(
    transport: &mut T,
    instance: &Instance,
    generator: &mut ValueGenerator<R>,
    timeout: Duration,
) -> Result<Transcript, EchonetError>
where
    T: EchonetTransport + ?Sized,
    R: Rng + Send,
{
    let mut transcript = Transcript::new(AuditKind::EpcFuzz, instance.object_code);
    let unused = unused_epcs(instance);
    if unused.is_empty() {
        log::warn!("{} defines every EPC, skipping undefined EPCs", instance.object_code);
    } else {
        for service in FUZZED_SERVICES {
            let rng = generator.rng_mut();
            let Some(&epc) = unused.choose(rng) else {
                break;
            };
            let unit = PropertyData::new(epc, vec![rng.gen::<u8>()]);
            send_round(transport, instance, generator, service, unit, timeout, &mut transcript).await?;
        }
    }

    for service in FUZZED_SERVICES {
        let unit = PropertyData::new(EPC_OPERATION_STATUS, vec![INVALID_OPERATION_STATUS]);
        send_round(transport, instance, generator, service, unit, timeout, &mut transcript).await?;
    }

    Ok(transcript)
}

async fn send_round<T, R>(
    transport: &mut T,
    instance: &Instance,
    generator: &mut ValueGenerator<R>,
    service: u8,
    unit: PropertyData,
    timeout: Duration,
    transcript: &mut Transcript,
) -> Result<(), EchonetError>
where
    T: EchonetTransport + ?Sized,
    R: Rng + Send,
{
    log::debug!(
        "EPC fuzz: ESV 0x{service:02X} EPC 0x{:02X} to {}",
        unit.epc,
        instance.object_code
    );
    let frame = Frame::new(
        generator.rng_mut().gen(),
        ObjectCode::NODE_PROFILE,
        instance.object_code,
        service,
        vec![unit],
    );

    let rounds = transcript.exchanges.len();
    let exchange = send_and_collect(transport, frame, timeout)
        .await
        .map_err(|source| EchonetError::FuzzAborted {
            rounds,
            source: Box::new(source),
        })?;
    transcript.exchanges.push(exchange);
    Ok(())
}
