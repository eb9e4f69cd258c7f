//! # ECHONET Lite Protocol
//!
//! Frame codec, property map codec, request/response flow validation and
//! the transport abstraction used to reach peer nodes.

pub mod flow;
pub mod frame;
pub mod property_map;
pub mod transport;
pub mod transport_mock;

pub use flow::{check_flow, FlowReport, FlowViolation};
pub use frame::{pack_frame, parse_frame, Frame, ObjectCode, PropertyData};
pub use property_map::{decode_property_map, encode_property_map};
pub use transport::{EchonetTransport, UdpTransport};
pub use transport_mock::{MockReply, MockTransport};
