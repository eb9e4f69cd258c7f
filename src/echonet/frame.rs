//! # ECHONET Lite Frame Codec
//!
//! Decodes and encodes ECHONET Lite frames (specified message format,
//! EHD2 = 0x81) using the `nom` crate for the binary parsing.
//!
//! ```text
//! EHD1 EHD2 TID(2) SEOJ(3) DEOJ(3) ESV OPC { EPC PDC EDT[PDC] } * OPC
//!                                          [ OPCGet { EPC PDC EDT[PDC] } * OPCGet ]
//! ```
//!
//! The second (Get) group is decoded whenever bytes remain after the
//! primary group, independent of the service code. It is encoded whenever
//! `operation_count_get` is present, so `parse_frame(&pack_frame(&f))`
//! reproduces `f` for every well-formed frame, combined ones included.
//!
//! ## Usage
//!
//! ```rust
//! use echonet_audit::echonet::frame::{parse_frame, pack_frame, Frame, ObjectCode, PropertyData};
//!
//! let request = Frame::new(
//!     0x0001,
//!     ObjectCode::NODE_PROFILE,
//!     ObjectCode::new(0x01, 0x30, 0x01),
//!     0x62,
//!     vec![PropertyData::request(0x80)],
//! );
//! let bytes = pack_frame(&request);
//! assert_eq!(bytes, [0x10, 0x81, 0x00, 0x01, 0x0E, 0xF0, 0x01, 0x01, 0x30, 0x01, 0x62, 0x01, 0x80, 0x00]);
//! assert_eq!(parse_frame(&bytes).unwrap(), request);
//! ```

use crate::constants::{service_name, EHD1_ECHONET_LITE, EHD2_FORMAT1, EHD2_FORMAT_MASK, EOJ_NODE_PROFILE};
use crate::error::{DecodeStage, EchonetError};
use crate::util::hex::{format_hex_compact, parse_hex_literal};
use bytes::{BufMut, BytesMut};
use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 3-byte ECHONET object code: class group, class, instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectCode(pub [u8; 3]);

impl ObjectCode {
    /// Node profile object (0x0EF001)
    pub const NODE_PROFILE: ObjectCode = ObjectCode(EOJ_NODE_PROFILE);

    pub const fn new(class_group: u8, class: u8, instance: u8) -> Self {
        ObjectCode([class_group, class, instance])
    }

    pub fn class_group(&self) -> u8 {
        self.0[0]
    }

    pub fn class(&self) -> u8 {
        self.0[1]
    }

    pub fn instance(&self) -> u8 {
        self.0[2]
    }

    /// Class group and class combined, the key used by schema documents.
    pub fn class_key(&self) -> u16 {
        u16::from_be_bytes([self.0[0], self.0[1]])
    }

    /// Same class with a different instance number.
    pub fn with_instance(&self, instance: u8) -> Self {
        ObjectCode([self.0[0], self.0[1], instance])
    }
}

impl From<[u8; 3]> for ObjectCode {
    fn from(code: [u8; 3]) -> Self {
        ObjectCode(code)
    }
}

impl fmt::Display for ObjectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}{:02X}{:02X}", self.0[0], self.0[1], self.0[2])
    }
}

impl FromStr for ObjectCode {
    type Err = EchonetError;

    /// Parses `0x013001` style literals.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = parse_hex_literal(s)?;
        if value > 0x00FF_FFFF {
            return Err(EchonetError::SchemaMismatch(format!(
                "object code {s} does not fit in 3 bytes"
            )));
        }
        let [_, a, b, c] = (value as u32).to_be_bytes();
        Ok(ObjectCode([a, b, c]))
    }
}

/// One property unit: EPC, PDC and EDT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyData {
    pub epc: u8,
    pub pdc: u8,
    pub edt: Vec<u8>,
}

impl PropertyData {
    /// Property unit carrying `edt`; PDC is derived from its length.
    ///
    /// EDT longer than 255 bytes cannot be framed and is cut to 255.
    pub fn new(epc: u8, mut edt: Vec<u8>) -> Self {
        if edt.len() > u8::MAX as usize {
            log::warn!(
                "EPC 0x{epc:02X}: EDT of {} bytes cut to {}",
                edt.len(),
                u8::MAX
            );
            edt.truncate(u8::MAX as usize);
        }
        PropertyData {
            epc,
            pdc: edt.len() as u8,
            edt,
        }
    }

    /// Property unit without data, as used in Get requests.
    pub fn request(epc: u8) -> Self {
        PropertyData {
            epc,
            pdc: 0,
            edt: Vec::new(),
        }
    }
}

/// A decoded ECHONET Lite frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub ehd1: u8,
    pub ehd2: u8,
    pub transaction_id: u16,
    pub source: ObjectCode,
    pub destination: ObjectCode,
    pub service: u8,
    /// OPC; the Set-side count for combined services.
    pub operation_count: u8,
    pub properties: Vec<PropertyData>,
    /// OPCGet, present only when a second group followed the first.
    pub operation_count_get: Option<u8>,
    pub properties_get: Vec<PropertyData>,
}

impl Frame {
    /// Builds a format-1 frame whose OPC matches `properties`.
    pub fn new(
        transaction_id: u16,
        source: ObjectCode,
        destination: ObjectCode,
        service: u8,
        properties: Vec<PropertyData>,
    ) -> Self {
        Frame {
            ehd1: EHD1_ECHONET_LITE,
            ehd2: EHD2_FORMAT1,
            transaction_id,
            source,
            destination,
            service,
            operation_count: properties.len().min(u8::MAX as usize) as u8,
            properties,
            operation_count_get: None,
            properties_get: Vec::new(),
        }
    }

    /// Attaches the Get group of a combined (SetGet) frame.
    pub fn with_get_group(mut self, properties_get: Vec<PropertyData>) -> Self {
        self.operation_count_get = Some(properties_get.len().min(u8::MAX as usize) as u8);
        self.properties_get = properties_get;
        self
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, EchonetError> {
        parse_frame(bytes)
    }

    pub fn encode(&self) -> Vec<u8> {
        pack_frame(self)
    }

    /// True when the headers identify an ECHONET Lite frame.
    pub fn is_echonet_lite(&self) -> bool {
        self.ehd1 == EHD1_ECHONET_LITE && self.ehd2 & EHD2_FORMAT_MASK == EHD2_FORMAT_MASK
    }

    /// First property unit with the given EPC in the primary group.
    pub fn property(&self, epc: u8) -> Option<&PropertyData> {
        self.properties.iter().find(|p| p.epc == epc)
    }

    /// Set-side plus Get-side operation count.
    pub fn total_operation_count(&self) -> usize {
        self.operation_count as usize + self.operation_count_get.unwrap_or(0) as usize
    }
}

fn read<'a, O>(
    input: &'a [u8],
    stage: DecodeStage,
    mut parser: impl FnMut(&'a [u8]) -> IResult<&'a [u8], O>,
) -> Result<(&'a [u8], O), EchonetError> {
    parser(input).map_err(|_| EchonetError::TruncatedFrame { stage })
}

fn parse_object_code(input: &[u8], stage: DecodeStage) -> Result<(&[u8], ObjectCode), EchonetError> {
    let (input, raw) = read(input, stage, take(3usize))?;
    Ok((input, ObjectCode([raw[0], raw[1], raw[2]])))
}

fn parse_property(input: &[u8]) -> Result<(&[u8], PropertyData), EchonetError> {
    let (input, epc) = read(input, DecodeStage::Epc, be_u8)?;
    let (input, pdc) = read(input, DecodeStage::Pdc, be_u8)?;
    let (input, edt) = read(input, DecodeStage::Edt, take(pdc as usize))?;
    Ok((
        input,
        PropertyData {
            epc,
            pdc,
            edt: edt.to_vec(),
        },
    ))
}

fn parse_properties(
    mut input: &[u8],
    count: u8,
) -> Result<(&[u8], Vec<PropertyData>), EchonetError> {
    let mut properties = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (rest, property) = parse_property(input)?;
        properties.push(property);
        input = rest;
    }
    Ok((input, properties))
}

/// Decodes one frame. Bytes after the Get group are ignored.
pub fn parse_frame(input: &[u8]) -> Result<Frame, EchonetError> {
    let (input, ehd1) = read(input, DecodeStage::Ehd1, be_u8)?;
    let (input, ehd2) = read(input, DecodeStage::Ehd2, be_u8)?;
    let (input, transaction_id) = read(input, DecodeStage::Tid, be_u16)?;
    let (input, source) = parse_object_code(input, DecodeStage::Seoj)?;
    let (input, destination) = parse_object_code(input, DecodeStage::Deoj)?;
    let (input, service) = read(input, DecodeStage::Esv, be_u8)?;
    let (input, operation_count) = read(input, DecodeStage::Opc, be_u8)?;
    let (input, properties) = parse_properties(input, operation_count)?;

    let (operation_count_get, properties_get) = if input.is_empty() {
        (None, Vec::new())
    } else {
        let (input, count) = read(input, DecodeStage::OpcGet, be_u8)?;
        let (_, group) = parse_properties(input, count)?;
        (Some(count), group)
    };

    Ok(Frame {
        ehd1,
        ehd2,
        transaction_id,
        source,
        destination,
        service,
        operation_count,
        properties,
        operation_count_get,
        properties_get,
    })
}

fn put_properties(buf: &mut BytesMut, properties: &[PropertyData]) {
    for property in properties {
        buf.put_u8(property.epc);
        buf.put_u8(property.pdc);
        if property.pdc != 0 {
            buf.put_slice(&property.edt);
        }
    }
}

/// Encodes a frame. EDT bytes are omitted for units whose PDC is zero.
pub fn pack_frame(frame: &Frame) -> Vec<u8> {
    let data_len: usize = frame
        .properties
        .iter()
        .chain(frame.properties_get.iter())
        .map(|p| 2 + p.edt.len())
        .sum();
    let mut buf = BytesMut::with_capacity(13 + data_len);

    buf.put_u8(frame.ehd1);
    buf.put_u8(frame.ehd2);
    buf.put_u16(frame.transaction_id);
    buf.put_slice(&frame.source.0);
    buf.put_slice(&frame.destination.0);
    buf.put_u8(frame.service);
    buf.put_u8(frame.operation_count);
    put_properties(&mut buf, &frame.properties);

    if let Some(count) = frame.operation_count_get {
        buf.put_u8(count);
        put_properties(&mut buf, &frame.properties_get);
    }

    buf.to_vec()
}

fn fmt_group(f: &mut fmt::Formatter<'_>, properties: &[PropertyData]) -> fmt::Result {
    for property in properties {
        writeln!(
            f,
            "    EPC: 0x{:02X}  PDC: 0x{:02X}  EDT: [{}]",
            property.epc,
            property.pdc,
            format_hex_compact(&property.edt)
        )?;
    }
    Ok(())
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "EHD1: 0x{:02X}  EHD2: 0x{:02X}", self.ehd1, self.ehd2)?;
        writeln!(f, "TID:  0x{:04X}", self.transaction_id)?;
        writeln!(f, "SEOJ: {}  DEOJ: {}", self.source, self.destination)?;
        writeln!(f, "ESV:  0x{:02X} ({})", self.service, service_name(self.service))?;
        writeln!(f, "OPC:  {}", self.operation_count)?;
        fmt_group(f, &self.properties)?;
        if let Some(count) = self.operation_count_get {
            writeln!(f, "OPCGet: {count}")?;
            fmt_group(f, &self.properties_get)?;
        }
        Ok(())
    }
}
