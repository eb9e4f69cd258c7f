//! # Utility Modules
//!
//! Hex encoding/decoding and logging helpers shared by the codec, the
//! schema loader and the command line tool.

pub mod hex;
pub mod logging;

pub use hex::{decode_hex, encode_hex, format_hex_compact, parse_hex_literal, parse_hex_u8};
pub use logging::{log_frame_hex, log_frame_summary, LogThrottle};
