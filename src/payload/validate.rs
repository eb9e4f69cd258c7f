//! # Value Validator
//!
//! Decides whether an observed EDT is a valid encoding of a property schema.
//! `Ok(false)` means the payload is out of range or malformed for the
//! schema; `Err(SchemaMismatch)` means the schema itself cannot be applied
//! (for example a date-time of an unsupported size).

use super::numeric::{decode_number, decode_unsigned};
use crate::error::EchonetError;
use crate::schema::bitmap::declared_mask;
use crate::schema::{
    level_width, ArraySchema, BitmapSchema, DateTimeSchema, NumberSchema, ObjectSchema,
    SchemaNode,
};
use crate::util::hex::parse_hex_literal;
use chrono::NaiveDate;

/// Leap year used to check month/day pairs that carry no year.
const REFERENCE_YEAR: i32 = 2020;

/// Accepts `edt` when any alternative accepts it.
///
/// Alternatives that fail with an error do not prevent a later one from
/// accepting; the first error is returned only when none accepts.
pub fn validate(alternatives: &[SchemaNode], edt: &[u8]) -> Result<bool, EchonetError> {
    let mut first_error = None;
    for node in alternatives {
        match validate_node(node, edt) {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(false),
    }
}

/// Applies one variant's validity rule.
pub fn validate_node(node: &SchemaNode, edt: &[u8]) -> Result<bool, EchonetError> {
    match node {
        SchemaNode::Number(number) => Ok(validate_number(number, edt)),
        SchemaNode::State(state) => {
            let size = state.size.max(1);
            if edt.len() != size {
                return Ok(false);
            }
            let value = decode_unsigned(edt);
            Ok(state.states.iter().any(|s| Some(s.code) == value))
        }
        SchemaNode::NumericValues(values) => {
            let size = values.size.max(1);
            if edt.len() != size {
                return Ok(false);
            }
            let value = decode_unsigned(edt);
            Ok(values.values.iter().any(|v| Some(v.code) == value))
        }
        SchemaNode::Level(level) => {
            if edt.len() != level_width(&level.base)? {
                return Ok(false);
            }
            let base = parse_hex_literal(&level.base)
                .map_err(|e| EchonetError::SchemaMismatch(format!("level base: {e}")))?;
            Ok(match decode_unsigned(edt) {
                Some(value) => value >= base && value - base <= level.maximum,
                None => false,
            })
        }
        SchemaNode::Raw(raw) => Ok(edt.len() >= raw.min_size && edt.len() <= raw.max_size),
        SchemaNode::Object(object) => validate_object(object, edt),
        SchemaNode::Array(array) => validate_array(array, edt),
        SchemaNode::Bitmap(bitmap) => validate_bitmap(bitmap, edt),
        SchemaNode::DateTime(date_time) => validate_date_time(date_time, edt),
        SchemaNode::OneOf(alternatives) => validate(alternatives, edt),
    }
}

fn validate_number(number: &NumberSchema, edt: &[u8]) -> bool {
    if edt.len() != number.format.width() {
        return false;
    }
    let Some(value) = decode_number(number.format, edt) else {
        return false;
    };
    if number.enumeration.is_empty() {
        value >= number.minimum && value <= number.maximum
    } else {
        number.enumeration.contains(&value)
    }
}

/// Elements are matched against consecutive slices. An alternative without a
/// static size takes every byte not yet consumed except the last one.
fn validate_object(object: &ObjectSchema, edt: &[u8]) -> Result<bool, EchonetError> {
    let mut consumed = 0usize;

    for element in &object.elements {
        let mut advance = None;
        for alternative in &element.alternatives {
            let size = alternative
                .byte_length()
                .unwrap_or_else(|| edt.len().saturating_sub(consumed).saturating_sub(1));
            let Some(slice) = edt.get(consumed..consumed + size) else {
                continue;
            };
            let accepted = validate_node(alternative, slice)
                .map_err(|e| e.within(format!("object element '{}'", element.name)))?;
            if accepted {
                advance = Some(size);
                break;
            }
        }
        match advance {
            Some(size) => consumed += size,
            None => return Ok(false),
        }
    }
    Ok(true)
}

fn validate_array(array: &ArraySchema, edt: &[u8]) -> Result<bool, EchonetError> {
    if array.item_size == 0 {
        return Err(EchonetError::SchemaMismatch("array item size is 0".to_string()));
    }
    if edt.len() % array.item_size != 0 {
        return Ok(false);
    }
    for (i, item) in edt.chunks(array.item_size).enumerate() {
        if !validate(&array.items, item).map_err(|e| e.within(format!("array item {i}")))? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn validate_bitmap(bitmap: &BitmapSchema, edt: &[u8]) -> Result<bool, EchonetError> {
    if edt.len() != bitmap.size {
        return Ok(false);
    }
    let declared = declared_mask(bitmap)?;
    Ok(match decode_unsigned(edt) {
        Some(value) => value & !declared == 0,
        None => false,
    })
}

fn valid_date(year: i32, month: u8, day: u8) -> bool {
    NaiveDate::from_ymd_opt(year, month as u32, day as u32).is_some()
}

fn valid_time(hour: u8, minute: u8, second: Option<u8>) -> bool {
    hour <= 23 && minute <= 59 && second.map_or(true, |s| s <= 59)
}

fn validate_date_time(schema: &DateTimeSchema, edt: &[u8]) -> Result<bool, EchonetError> {
    if !matches!(schema.size, 2 | 3 | 4 | 6 | 7) {
        return Err(EchonetError::SchemaMismatch(format!(
            "unsupported date-time size {}",
            schema.size
        )));
    }
    if edt.len() != schema.size {
        return Ok(false);
    }

    let valid = match schema.size {
        2 => valid_date(REFERENCE_YEAR, edt[0], edt[1]),
        3 => valid_time(edt[0], edt[1], Some(edt[2])),
        // sizes that carry a year check the day against that year
        _ => {
            let year = u16::from_be_bytes([edt[0], edt[1]]) as i32;
            let date_ok = valid_date(year, edt[2], edt[3]);
            match schema.size {
                4 => date_ok,
                6 => date_ok && valid_time(edt[4], edt[5], None),
                _ => date_ok && valid_time(edt[4], edt[5], Some(edt[6])),
            }
        }
    };
    Ok(valid)
}
