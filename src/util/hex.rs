//! # Hex Encoding/Decoding Utilities
//!
//! Hex helpers used for frame dumps in logs, for the `0x`-prefixed literals
//! found in schema documents (`"0x80"`, `"0x0130"`, `"0x31"`) and for
//! EDT/object-code arguments on the command line.
//!
//! ## Usage
//!
//! ```rust
//! use echonet_audit::util::hex::{decode_hex, format_hex_compact, parse_hex_literal};
//!
//! let frame = decode_hex("1081 0001 0ef001 013001 62 01 8000").unwrap();
//! assert_eq!(format_hex_compact(&frame[..4]), "10 81 00 01");
//! assert_eq!(parse_hex_literal("0x80").unwrap(), 0x80);
//! ```

use thiserror::Error;

/// Errors that can occur during hex operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("Invalid hex character: {0}")]
    InvalidCharacter(char),

    #[error("Odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("Empty hex string")]
    EmptyString,

    #[error("Hex literal out of range: {0}")]
    OutOfRange(String),
}

/// Encode bytes to lowercase hex string
pub fn encode_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decode a hex string to bytes.
///
/// Whitespace is ignored and an optional leading `0x` is accepted.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, HexError> {
    let trimmed = strip_prefix(hex_str.trim());
    let cleaned: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.is_empty() {
        return Err(HexError::EmptyString);
    }
    if let Some(bad) = cleaned.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(HexError::InvalidCharacter(bad));
    }
    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }

    hex::decode(&cleaned).map_err(|_| HexError::OddLength(cleaned.len()))
}

/// Format hex data for compact display (useful for logs)
///
/// Formats data as "10 81 00 01" with spaces between bytes.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a hex string that may contain separators such as `-` or `:`.
pub fn parse_hex_lenient(input: &str) -> Result<Vec<u8>, HexError> {
    let hex_chars: String = strip_prefix(input.trim())
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect();

    if hex_chars.is_empty() {
        return Err(HexError::EmptyString);
    }
    if hex_chars.len() % 2 != 0 {
        return Err(HexError::OddLength(hex_chars.len()));
    }

    hex::decode(&hex_chars).map_err(|_| HexError::OddLength(hex_chars.len()))
}

/// Parse a numeric hex literal such as `"0x0130"` or `"80"`.
pub fn parse_hex_literal(literal: &str) -> Result<u64, HexError> {
    let digits = strip_prefix(literal.trim());
    if digits.is_empty() {
        return Err(HexError::EmptyString);
    }
    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(HexError::InvalidCharacter(bad));
    }
    u64::from_str_radix(digits, 16).map_err(|_| HexError::OutOfRange(literal.to_string()))
}

/// Parse a single-byte hex literal such as an EPC (`"0x80"`).
pub fn parse_hex_u8(literal: &str) -> Result<u8, HexError> {
    let value = parse_hex_literal(literal)?;
    u8::try_from(value).map_err(|_| HexError::OutOfRange(literal.to_string()))
}

/// Number of hex digits in a literal, excluding any `0x` prefix.
pub fn hex_digit_count(literal: &str) -> usize {
    strip_prefix(literal.trim()).len()
}

fn strip_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}
