//! # ECHONET Lite Error Handling
//!
//! This module defines the EchonetError enum, which represents the different error
//! types that can occur in the echonet-audit crate.
//!
//! Protocol flow violations are deliberately absent: they are collected as
//! [`FlowViolation`](crate::echonet::flow::FlowViolation) values and logged, never
//! propagated as errors.

use crate::echonet::frame::ObjectCode;
use crate::util::hex::HexError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Field of an ECHONET Lite frame at which decoding ran out of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    Ehd1,
    Ehd2,
    Tid,
    Seoj,
    Deoj,
    Esv,
    Opc,
    Epc,
    Pdc,
    Edt,
    OpcGet,
}

impl fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecodeStage::Ehd1 => "EHD1",
            DecodeStage::Ehd2 => "EHD2",
            DecodeStage::Tid => "TID",
            DecodeStage::Seoj => "SEOJ",
            DecodeStage::Deoj => "DEOJ",
            DecodeStage::Esv => "ESV",
            DecodeStage::Opc => "OPC",
            DecodeStage::Epc => "EPC",
            DecodeStage::Pdc => "PDC",
            DecodeStage::Edt => "EDT",
            DecodeStage::OpcGet => "OPCGet",
        };
        f.write_str(name)
    }
}

/// Represents the different error types that can occur in the crate.
#[derive(Debug, Error)]
pub enum EchonetError {
    /// Decoding ran out of bytes while reading the given field.
    #[error("Truncated frame: failed to read {stage}")]
    TruncatedFrame { stage: DecodeStage },

    /// A received datagram does not carry the ECHONET Lite headers.
    #[error("Not an ECHONET Lite frame (EHD1 0x{ehd1:02X}, EHD2 0x{ehd2:02X})")]
    NotEchonet { ehd1: u8, ehd2: u8 },

    /// A schema node cannot interpret (or produce) the given payload shape.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The schema document is malformed or lacks the requested class/release.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A property map EDT disagrees with its own count byte.
    #[error("Invalid property map: declared {declared} properties, decoded {decoded}")]
    InvalidPropertyMap { declared: usize, decoded: usize },

    /// Send or receive failed at the socket level.
    #[error("Transport error: {0}")]
    Transport(String),

    /// No reply arrived within the receive timeout.
    #[error("Receive timed out after {0:?}")]
    Timeout(Duration),

    /// No instance with the given object code is known for the node.
    #[error("Unknown instance {0}")]
    UnknownInstance(ObjectCode),

    /// Configuration file missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Writing a results file failed.
    #[error("Output error: {0}")]
    Output(String),

    /// Invalid hexadecimal input.
    #[error("Hex error: {0}")]
    Hex(#[from] HexError),

    /// A fuzz run was aborted by a non-timeout error.
    #[error("Fuzz run aborted after {rounds} rounds: {source}")]
    FuzzAborted {
        rounds: usize,
        #[source]
        source: Box<EchonetError>,
    },

    /// Wraps another error with the element or field it originated from.
    #[error("{context}: {source}")]
    InContext {
        context: String,
        #[source]
        source: Box<EchonetError>,
    },
}

impl EchonetError {
    /// Attaches the name of the originating schema element or field.
    pub fn within(self, context: impl Into<String>) -> Self {
        EchonetError::InContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns true for a receive timeout, including one wrapped in context.
    pub fn is_timeout(&self) -> bool {
        match self {
            EchonetError::Timeout(_) => true,
            EchonetError::InContext { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

impl From<std::io::Error> for EchonetError {
    fn from(err: std::io::Error) -> Self {
        EchonetError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for EchonetError {
    fn from(err: serde_json::Error) -> Self {
        EchonetError::Schema(err.to_string())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, EchonetError>;
