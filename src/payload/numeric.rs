//! Big-endian integer helpers shared by the generator and the validator.

use crate::schema::NumberFormat;

/// Unsigned big-endian decode. `None` when the input exceeds 8 bytes.
pub fn decode_unsigned(bytes: &[u8]) -> Option<u64> {
    if bytes.len() > 8 {
        return None;
    }
    Some(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

/// Signed decode by per-byte sign extension.
///
/// Every byte is sign-extended on its own (`b as i8`), shifted to its
/// big-endian position and OR-combined. For a single byte, and for values
/// whose lower bytes are all below 0x80 (or whose upper bytes are all 0xFF),
/// this equals the two's-complement value; otherwise a lower byte of 0x80 or
/// more floods every higher bit with ones.
pub fn decode_signed_per_byte(bytes: &[u8]) -> Option<i64> {
    if bytes.len() > 8 {
        return None;
    }
    let last = bytes.len().saturating_sub(1);
    Some(bytes.iter().enumerate().fold(0i64, |acc, (i, &b)| {
        let shift = ((last - i) * 8) as u32;
        acc | ((b as i8 as i64) << shift)
    }))
}

/// Decodes an EDT according to the signedness of `format`.
pub fn decode_number(format: NumberFormat, bytes: &[u8]) -> Option<i64> {
    if format.is_signed() {
        decode_signed_per_byte(bytes)
    } else {
        decode_unsigned(bytes).and_then(|v| i64::try_from(v).ok())
    }
}

/// Low `width` bytes of `value`, big-endian (two's complement for negatives).
pub fn encode_be(value: i64, width: usize) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let width = width.min(bytes.len());
    bytes[bytes.len() - width..].to_vec()
}

/// Low `width` bytes of an unsigned code, big-endian.
pub fn encode_code(code: u64, width: usize) -> Vec<u8> {
    let bytes = code.to_be_bytes();
    let width = width.min(bytes.len());
    bytes[bytes.len() - width..].to_vec()
}
