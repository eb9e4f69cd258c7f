//! # Devices, Instances and Discovery
//!
//! An [`Instance`] is one ECHONET object on a peer node: its class, the
//! properties the schema defines for that class, and which of them the
//! device reports as implemented in its Get/Set/Inf property maps. A
//! [`Node`] groups the instances found on one peer.
//!
//! Discovery reads the node profile's self-node instance list (EPC 0xD6)
//! and then the three property maps of every listed object.

use crate::constants::{
    ESV_FAMILY_RESPONSE, ESV_GET, ESV_GET_RES, EPC_GET_PROPERTY_MAP, EPC_INF_PROPERTY_MAP,
    EPC_SELF_NODE_INSTANCE_LIST, EPC_SET_PROPERTY_MAP, EOJ_NODE_PROFILE_SEND_ONLY,
};
use crate::echonet::frame::{Frame, ObjectCode, PropertyData};
use crate::echonet::property_map::decode_property_map;
use crate::echonet::transport::EchonetTransport;
use crate::error::EchonetError;
use crate::payload::validate::validate;
use crate::schema::{Alternatives, SchemaRegistry};
use serde::Serialize;
use std::net::IpAddr;
use std::time::Duration;

/// Access rule of a property for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessRule {
    Required,
    Optional,
    NotApplicable,
}

impl AccessRule {
    /// Parses the rule names of schema documents.
    pub fn from_name(name: &str) -> Result<Self, EchonetError> {
        match name {
            "required" | "required_c" => Ok(AccessRule::Required),
            "optional" => Ok(AccessRule::Optional),
            "notApplicable" => Ok(AccessRule::NotApplicable),
            other => Err(EchonetError::Schema(format!("unknown access rule '{other}'"))),
        }
    }

    /// Required or optional.
    pub fn is_available(self) -> bool {
        !matches!(self, AccessRule::NotApplicable)
    }
}

/// The three property map kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Get,
    Set,
    Inf,
}

impl AccessKind {
    /// EPC of the property map listing the properties of this kind.
    pub fn property_map_epc(self) -> u8 {
        match self {
            AccessKind::Get => EPC_GET_PROPERTY_MAP,
            AccessKind::Set => EPC_SET_PROPERTY_MAP,
            AccessKind::Inf => EPC_INF_PROPERTY_MAP,
        }
    }
}

/// Schema-side description of one property plus what the device implements.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyDescriptor {
    pub epc: u8,
    pub name: String,
    pub get: AccessRule,
    pub set: AccessRule,
    pub inf: AccessRule,
    pub implements_get: bool,
    pub implements_set: bool,
    pub implements_inf: bool,
    pub note: String,
    #[serde(skip)]
    pub schema: Alternatives,
}

/// One ECHONET object on a peer node.
#[derive(Debug, Clone, Serialize)]
pub struct Instance {
    pub object_code: ObjectCode,
    pub class_name: String,
    pub properties: Vec<PropertyDescriptor>,
}

impl Instance {
    pub fn property(&self, epc: u8) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.epc == epc)
    }

    /// Properties whose Set rule is required or optional.
    pub fn settable(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| p.set.is_available())
    }

    /// Properties whose Get rule is required or optional.
    pub fn gettable(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| p.get.is_available())
    }

    /// Records which properties a property map lists as implemented.
    pub fn mark_implemented(&mut self, kind: AccessKind, codes: &[u8]) {
        for property in &mut self.properties {
            let listed = codes.contains(&property.epc);
            match kind {
                AccessKind::Get => property.implements_get = listed,
                AccessKind::Set => property.implements_set = listed,
                AccessKind::Inf => property.implements_inf = listed,
            }
        }
    }

    /// Validates `edt` against the schema of property `epc`.
    pub fn validate_value(&self, epc: u8, edt: &[u8]) -> Result<bool, EchonetError> {
        let property = self.property(epc).ok_or_else(|| {
            EchonetError::SchemaMismatch(format!(
                "{} defines no property 0x{epc:02X}",
                self.object_code
            ))
        })?;
        validate(&property.schema, edt)
            .map_err(|e| e.within(format!("{} EPC 0x{epc:02X}", self.object_code)))
    }
}

/// Finds the instance with `code`, falling back to any instance of its class.
pub fn find_instance(instances: &[Instance], code: ObjectCode) -> Option<&Instance> {
    instances
        .iter()
        .find(|i| i.object_code == code)
        .or_else(|| {
            instances
                .iter()
                .find(|i| i.object_code.class_key() == code.class_key())
        })
}

/// A peer node and the instances discovered on it.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub address: IpAddr,
    pub instances: Vec<Instance>,
}

impl Node {
    pub fn instance(&self, code: ObjectCode) -> Option<&Instance> {
        find_instance(&self.instances, code)
    }

    /// Discovers the instances of the peer behind `transport` and builds
    /// them from `registry` for the given appendix release.
    ///
    /// Objects whose class the registry does not know are skipped; a
    /// property map that cannot be read leaves its flags unset.
    pub async fn discover<T>(
        transport: &mut T,
        registry: &SchemaRegistry,
        release: &str,
        timeout: Duration,
    ) -> Result<Node, EchonetError>
    where
        T: EchonetTransport + ?Sized,
    {
        let address = transport.peer().ip();
        let mut tid: u16 = 1;

        let codes = query_instance_list(transport, tid, timeout).await?;
        log::info!("{address}: {} objects listed", codes.len());

        let mut instances = Vec::with_capacity(codes.len());
        for code in codes {
            let mut instance = match registry.instance(code, release) {
                Ok(instance) => instance,
                Err(e) => {
                    log::warn!("{address}: skipping {code}: {e}");
                    continue;
                }
            };

            for kind in [AccessKind::Set, AccessKind::Get, AccessKind::Inf] {
                tid = tid.wrapping_add(1);
                match query_property_map(transport, code, kind.property_map_epc(), tid, timeout).await {
                    Ok(map) => instance.mark_implemented(kind, &map),
                    Err(EchonetError::Transport(message)) => {
                        return Err(EchonetError::Transport(message))
                    }
                    Err(e) => log::warn!(
                        "{address}: {code} property map 0x{:02X} unavailable: {e}",
                        kind.property_map_epc()
                    ),
                }
            }

            log::info!("{address}: built {} ({})", code, instance.class_name);
            instances.push(instance);
        }

        Ok(Node { address, instances })
    }
}

/// Parses the EDT of EPC 0xD6: a count followed by 3-byte object codes.
pub fn parse_instance_list(edt: &[u8]) -> Result<Vec<ObjectCode>, EchonetError> {
    let (&count, body) = edt
        .split_first()
        .ok_or_else(|| EchonetError::SchemaMismatch("empty instance list".to_string()))?;
    let count = count as usize;
    if body.len() < count * 3 {
        return Err(EchonetError::SchemaMismatch(format!(
            "instance list announces {count} objects but carries {} bytes",
            body.len()
        )));
    }
    Ok(body
        .chunks_exact(3)
        .take(count)
        .map(|c| ObjectCode([c[0], c[1], c[2]]))
        .collect())
}

fn get_request(tid: u16, destination: ObjectCode, epc: u8) -> Frame {
    Frame::new(
        tid,
        ObjectCode::NODE_PROFILE,
        destination,
        ESV_GET,
        vec![PropertyData::request(epc)],
    )
}

/// Reads the self-node instance list; the node profile itself comes first.
///
/// The request goes to the general node profile and falls back to the
/// transmission-only profile when sending fails.
pub async fn query_instance_list<T>(
    transport: &mut T,
    tid: u16,
    timeout: Duration,
) -> Result<Vec<ObjectCode>, EchonetError>
where
    T: EchonetTransport + ?Sized,
{
    let mut profile = ObjectCode::NODE_PROFILE;
    let request = get_request(tid, profile, EPC_SELF_NODE_INSTANCE_LIST);
    if let Err(e) = transport.send(&request).await {
        log::warn!("instance list request to {profile} failed: {e}");
        profile = ObjectCode(EOJ_NODE_PROFILE_SEND_ONLY);
        transport
            .send(&get_request(tid, profile, EPC_SELF_NODE_INSTANCE_LIST))
            .await?;
    }

    let reply = transport.receive(timeout).await?;
    if reply.service & ESV_FAMILY_RESPONSE != ESV_FAMILY_RESPONSE {
        return Err(EchonetError::SchemaMismatch(format!(
            "instance list request answered with ESV 0x{:02X}",
            reply.service
        )));
    }
    let edt = reply
        .property(EPC_SELF_NODE_INSTANCE_LIST)
        .map(|p| p.edt.as_slice())
        .ok_or_else(|| EchonetError::SchemaMismatch("reply lacks EPC 0xD6".to_string()))?;

    let mut codes = vec![profile];
    codes.extend(parse_instance_list(edt)?);
    Ok(codes)
}

/// Reads and decodes one property map of `object`.
pub async fn query_property_map<T>(
    transport: &mut T,
    object: ObjectCode,
    map_epc: u8,
    tid: u16,
    timeout: Duration,
) -> Result<Vec<u8>, EchonetError>
where
    T: EchonetTransport + ?Sized,
{
    let reply = transport
        .request(&get_request(tid, object, map_epc), timeout)
        .await?;
    if reply.service != ESV_GET_RES {
        return Err(EchonetError::SchemaMismatch(format!(
            "property map 0x{map_epc:02X} answered with ESV 0x{:02X}",
            reply.service
        )));
    }
    let property = reply.property(map_epc).ok_or_else(|| {
        EchonetError::SchemaMismatch(format!("reply lacks EPC 0x{map_epc:02X}"))
    })?;
    decode_property_map(&property.edt)
}
