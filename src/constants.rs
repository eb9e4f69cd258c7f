//! ECHONET Lite Protocol Constants
//!
//! This module defines constants used in the ECHONET Lite implementation,
//! based on the ECHONET Lite Specification Part II and the APPENDIX
//! "Detailed Requirements for ECHONET Device Objects".

use std::time::Duration;

/// ECHONET Lite header byte 1
pub const EHD1_ECHONET_LITE: u8 = 0x10;

/// Header byte 2 for specified message format (format 1)
pub const EHD2_FORMAT1: u8 = 0x81;

/// Top bit of EHD2, set on every ECHONET Lite message format
pub const EHD2_FORMAT_MASK: u8 = 0x80;

/// UDP port used by ECHONET Lite nodes
pub const ECHONET_PORT: u16 = 3610;

/// Receive timeout used for every request/response exchange
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(15);

/// Maximum datagram size read from the socket
pub const MAX_DATAGRAM_SIZE: usize = 4096;

// Service codes (ESV): requests

/// Property value write request (no response required)
pub const ESV_SETI: u8 = 0x60;
/// Property value write request (response required)
pub const ESV_SETC: u8 = 0x61;
/// Property value read request
pub const ESV_GET: u8 = 0x62;
/// Property value notification request
pub const ESV_INF_REQ: u8 = 0x63;
/// Property value write & read request
pub const ESV_SETGET: u8 = 0x6E;

// Service codes (ESV): responses and notifications

/// Property value write response
pub const ESV_SET_RES: u8 = 0x71;
/// Property value read response
pub const ESV_GET_RES: u8 = 0x72;
/// Property value notification
pub const ESV_INF: u8 = 0x73;
/// Property value notification (response required)
pub const ESV_INFC: u8 = 0x74;
/// Property value notification response
pub const ESV_INFC_RES: u8 = 0x7A;
/// Property value write & read response
pub const ESV_SETGET_RES: u8 = 0x7E;

// Service codes (ESV): not-accepted responses

/// Property value write request (no response required) not accepted
pub const ESV_SETI_SNA: u8 = 0x50;
/// Property value write request (response required) not accepted
pub const ESV_SETC_SNA: u8 = 0x51;
/// Property value read not accepted
pub const ESV_GET_SNA: u8 = 0x52;
/// Property value notification not accepted
pub const ESV_INF_SNA: u8 = 0x53;
/// Property value write & read not accepted
pub const ESV_SETGET_SNA: u8 = 0x5E;

/// High nibble of the not-accepted response family
pub const ESV_FAMILY_NOT_ACCEPTED: u8 = 0x50;
/// High nibble of the request family
pub const ESV_FAMILY_REQUEST: u8 = 0x60;
/// High nibble of the response/notification family
pub const ESV_FAMILY_RESPONSE: u8 = 0x70;

// Property codes (EPC)

/// Operation status
pub const EPC_OPERATION_STATUS: u8 = 0x80;
/// Status change announcement property map
pub const EPC_INF_PROPERTY_MAP: u8 = 0x9D;
/// Set property map
pub const EPC_SET_PROPERTY_MAP: u8 = 0x9E;
/// Get property map
pub const EPC_GET_PROPERTY_MAP: u8 = 0x9F;
/// Self-node instance list S
pub const EPC_SELF_NODE_INSTANCE_LIST: u8 = 0xD6;

/// Property maps with at least this many entries use the bitmap form
pub const PROPERTY_MAP_BITMAP_THRESHOLD: usize = 16;

// Object codes (EOJ)

/// Node profile object, general node
pub const EOJ_NODE_PROFILE: [u8; 3] = [0x0E, 0xF0, 0x01];
/// Node profile object, transmission-only node
pub const EOJ_NODE_PROFILE_SEND_ONLY: [u8; 3] = [0x0E, 0xF0, 0x02];
/// Device object super class
pub const EOJ_SUPER_CLASS: [u8; 3] = [0x00, 0x00, 0x00];

/// Class group code of profile objects
pub const CLASS_GROUP_PROFILE: u8 = 0x0E;
/// Class group code of user-defined objects
pub const CLASS_GROUP_USER_DEFINED: u8 = 0x0F;

/// Latest appendix release understood by the schema loader
pub const LATEST_RELEASE: &str = "M";

/// Returns the short name of a service code, for logs and frame dumps.
pub fn service_name(esv: u8) -> &'static str {
    match esv {
        ESV_SETI => "SetI",
        ESV_SETC => "SetC",
        ESV_GET => "Get",
        ESV_INF_REQ => "INF_REQ",
        ESV_SETGET => "SetGet",
        ESV_SET_RES => "Set_Res",
        ESV_GET_RES => "Get_Res",
        ESV_INF => "INF",
        ESV_INFC => "INFC",
        ESV_INFC_RES => "INFC_Res",
        ESV_SETGET_RES => "SetGet_Res",
        ESV_SETI_SNA => "SetI_SNA",
        ESV_SETC_SNA => "SetC_SNA",
        ESV_GET_SNA => "Get_SNA",
        ESV_INF_SNA => "INF_SNA",
        ESV_SETGET_SNA => "SetGet_SNA",
        _ => "Unknown",
    }
}

/// True for the combined write & read service and its responses.
pub fn is_combined_service(esv: u8) -> bool {
    matches!(esv, ESV_SETGET | ESV_SETGET_RES | ESV_SETGET_SNA)
}
