//! # echonet-audit - Conformance Auditing for ECHONET Lite Devices
//!
//! The echonet-audit crate drives ECHONET Lite home appliances over UDP and
//! checks what they send back, both at the protocol level (transaction IDs,
//! service codes, object codes, operation counts) and at the value level
//! (every property value against the machine-readable appendix schema).
//!
//! ## Features
//!
//! - Encode and decode ECHONET Lite format-1 frames, including the combined
//!   write & read (0x6E) Get group
//! - Load class and property schemas from the appendix JSON document for a
//!   chosen release
//! - Discover the instances of a node and the property maps they implement
//! - Generate random schema-valid values and validate observed ones
//! - Fuzz operation counts and undefined property codes, then check the
//!   replies
//! - Serialize transcripts and check reports as JSON
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! echonet-audit = "0.1.0"
//! ```
//!
//! ```rust
//! use echonet_audit::{decode_frame_hex, ObjectCode};
//!
//! let frame = decode_frame_hex("1081 0001 05FF01 013001 62 01 80 00").unwrap();
//! assert_eq!(frame.destination, ObjectCode::new(0x01, 0x30, 0x01));
//! assert_eq!(frame.properties[0].epc, 0x80);
//! ```

pub mod audit;
pub mod config;
pub mod constants;
pub mod device;
pub mod echonet;
pub mod error;
pub mod logging;
pub mod payload;
pub mod schema;
pub mod util;

pub use crate::error::{DecodeStage, EchonetError};
pub use crate::logging::{init_logger, init_logger_with_file, log_info};

// Protocol types
pub use echonet::{
    check_flow, pack_frame, parse_frame, EchonetTransport, FlowReport, FlowViolation, Frame,
    MockTransport, ObjectCode, PropertyData, UdpTransport,
};

// Schema, devices and audit drivers
pub use audit::{check_transcript, epc_fuzz, opc_fuzz, CheckReport, Exchange, Transcript};
pub use config::{Config, EchonetLiteConfig};
pub use device::{AccessRule, Instance, Node, PropertyDescriptor};
pub use payload::{validate, ValueGenerator};
pub use schema::{SchemaNode, SchemaRegistry};

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;

/// Decode a frame written as hex text (whitespace and `0x` allowed).
pub fn decode_frame_hex(text: &str) -> Result<Frame, EchonetError> {
    let bytes = util::hex::decode_hex(text)?;
    parse_frame(&bytes)
}

/// Bind the UDP socket shared by all node transports.
pub async fn bind_socket(local: SocketAddr) -> Result<Arc<UdpSocket>, EchonetError> {
    let socket = UdpSocket::bind(local)
        .await
        .map_err(|e| EchonetError::Transport(format!("bind {local}: {e}")))?;
    Ok(Arc::new(socket))
}

/// Discover every configured node over `socket`.
///
/// Nodes that fail discovery are logged and left out.
pub async fn discover_nodes(
    socket: &Arc<UdpSocket>,
    config: &Config,
    registry: &SchemaRegistry,
) -> Vec<Node> {
    let settings = &config.echonet_lite;
    let mut nodes = Vec::new();
    for &ip in &settings.ip {
        match discover_node(socket, ip, settings, registry).await {
            Ok(node) => nodes.push(node),
            Err(e) => log::error!("{ip}: discovery failed: {e}"),
        }
    }
    nodes
}

/// Discover the node at `ip`.
pub async fn discover_node(
    socket: &Arc<UdpSocket>,
    ip: IpAddr,
    settings: &EchonetLiteConfig,
    registry: &SchemaRegistry,
) -> Result<Node, EchonetError> {
    let mut transport = UdpTransport::with_socket(Arc::clone(socket), ip);
    Node::discover(
        &mut transport,
        registry,
        &settings.release,
        settings.receive_timeout(),
    )
    .await
}
