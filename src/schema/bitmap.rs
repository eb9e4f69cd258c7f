//! Bitmask decomposition for `bitmap` properties.
//!
//! A field's mask is one byte holding a single contiguous run of set bits.
//! The run is located by scanning upward from bit 0, rebuilt as a
//! right-aligned mask of the same length, then shifted back to the run offset
//! and on to the field's byte index. Both the generator (packing fields) and
//! the validator (rejecting undeclared bits) go through these functions.

use super::{BitmapField, BitmapSchema};
use crate::error::EchonetError;

/// Start offset and length of the set-bit run in a field mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitRun {
    pub offset: u32,
    pub len: u32,
}

impl BitRun {
    /// Right-aligned mask covering the run length.
    pub fn value_mask(&self) -> u64 {
        (1u64 << self.len) - 1
    }
}

/// Finds the first run of set bits in `mask`, scanning from bit 0.
pub fn decompose(mask: u8) -> BitRun {
    if mask == 0 {
        return BitRun { offset: 0, len: 0 };
    }
    let offset = mask.trailing_zeros();
    let len = (mask >> offset).trailing_ones();
    BitRun { offset, len }
}

fn byte_shift(index: u8) -> Result<u32, EchonetError> {
    if index >= 8 {
        return Err(EchonetError::SchemaMismatch(format!(
            "bitmap index {index} exceeds 8 bytes"
        )));
    }
    Ok(index as u32 * 8)
}

/// Mask of the bits a field occupies within the whole bitmap integer.
pub fn field_mask(field: &BitmapField) -> Result<u64, EchonetError> {
    let run = decompose(field.bitmask);
    Ok((run.value_mask() << run.offset) << byte_shift(field.index)?)
}

/// Places a right-aligned field value into its bit run, dropping bits that
/// do not fit.
pub fn pack_field(field: &BitmapField, value: u8) -> Result<u64, EchonetError> {
    let run = decompose(field.bitmask);
    let packed = ((value as u64) << run.offset) & (run.value_mask() << run.offset);
    Ok(packed << byte_shift(field.index)?)
}

/// Union of every declared field mask.
pub fn declared_mask(bitmap: &BitmapSchema) -> Result<u64, EchonetError> {
    bitmap
        .fields
        .iter()
        .try_fold(0u64, |acc, field| Ok(acc | field_mask(field)?))
}
