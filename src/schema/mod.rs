//! # Property Schema Model
//!
//! A closed set of variants describing how a property's EDT is laid out.
//! Every variant can report its encoded size (when statically known), test
//! whether a byte sequence is a valid encoding ([`crate::payload::validate`])
//! and produce a random valid encoding ([`crate::payload::generate`]).
//!
//! A property schema is a list of parallel alternatives: the payload is valid
//! when any one of them accepts it.

pub mod bitmap;
pub mod loader;

use crate::error::EchonetError;
use serde::Serialize;
use std::fmt;

pub use loader::SchemaRegistry;

/// Integer width and signedness of a `number` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NumberFormat {
    Int8,
    Int16,
    Int32,
    Uint8,
    Uint16,
    Uint32,
}

impl NumberFormat {
    /// Encoded width in bytes.
    pub fn width(self) -> usize {
        match self {
            NumberFormat::Int8 | NumberFormat::Uint8 => 1,
            NumberFormat::Int16 | NumberFormat::Uint16 => 2,
            NumberFormat::Int32 | NumberFormat::Uint32 => 4,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, NumberFormat::Int8 | NumberFormat::Int16 | NumberFormat::Int32)
    }

    /// Smallest and largest values representable in this format.
    pub fn bounds(self) -> (i64, i64) {
        let bits = self.width() as u32 * 8;
        if self.is_signed() {
            (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
        } else {
            (0, (1i64 << bits) - 1)
        }
    }

    /// Parses the format names used by schema documents (`"uint16"`, ...).
    pub fn from_name(name: &str) -> Result<Self, EchonetError> {
        match name {
            "int8" => Ok(NumberFormat::Int8),
            "int16" => Ok(NumberFormat::Int16),
            "int32" => Ok(NumberFormat::Int32),
            "uint8" => Ok(NumberFormat::Uint8),
            "uint16" => Ok(NumberFormat::Uint16),
            "uint32" => Ok(NumberFormat::Uint32),
            other => Err(EchonetError::Schema(format!("unknown number format '{other}'"))),
        }
    }
}

impl fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NumberFormat::Int8 => "int8",
            NumberFormat::Int16 => "int16",
            NumberFormat::Int32 => "int32",
            NumberFormat::Uint8 => "uint8",
            NumberFormat::Uint16 => "uint16",
            NumberFormat::Uint32 => "uint32",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberSchema {
    pub format: NumberFormat,
    pub minimum: i64,
    pub maximum: i64,
    /// Allowed values; when non-empty, minimum/maximum are not consulted.
    pub enumeration: Vec<i64>,
    pub unit: Option<String>,
    pub multiple_of: Option<f64>,
    /// EPCs whose values scale this one (e.g. a cumulative energy unit).
    pub coefficient: Vec<u8>,
}

impl NumberSchema {
    /// Range-only number spanning `[minimum, maximum]`.
    pub fn new(format: NumberFormat, minimum: i64, maximum: i64) -> Self {
        NumberSchema {
            format,
            minimum,
            maximum,
            enumeration: Vec::new(),
            unit: None,
            multiple_of: None,
            coefficient: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateEntry {
    pub code: u64,
    pub label: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSchema {
    /// Declared size; 0 is read as 1.
    pub size: usize,
    pub states: Vec<StateEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelSchema {
    /// Hex literal of the lowest level, e.g. `"0x31"`.
    pub base: String,
    pub maximum: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawSchema {
    pub min_size: usize,
    pub max_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectElement {
    pub name: String,
    pub alternatives: Vec<SchemaNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectSchema {
    pub elements: Vec<ObjectElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArraySchema {
    pub item_size: usize,
    pub min_items: usize,
    pub max_items: usize,
    pub items: Vec<SchemaNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BitmapField {
    pub name: String,
    pub description: String,
    /// Byte index the mask applies to, counted from the least significant byte.
    pub index: u8,
    pub bitmask: u8,
    pub value: Vec<SchemaNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BitmapSchema {
    pub size: usize,
    pub fields: Vec<BitmapField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericValue {
    pub code: u64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericValuesSchema {
    /// Declared size; 0 is read as 1.
    pub size: usize,
    pub values: Vec<NumericValue>,
}

/// Date/time layouts by size:
///
/// | size | fields |
/// |---|---|
/// | 2 | month, day |
/// | 3 | hour, minute, second |
/// | 4 | year (2 bytes), month, day |
/// | 6 | year (2 bytes), month, day, hour, minute |
/// | 7 | year (2 bytes), month, day, hour, minute, second |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateTimeSchema {
    pub size: usize,
}

/// One node of a property schema tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SchemaNode {
    Number(NumberSchema),
    State(StateSchema),
    Level(LevelSchema),
    Raw(RawSchema),
    Object(ObjectSchema),
    Array(ArraySchema),
    Bitmap(BitmapSchema),
    NumericValues(NumericValuesSchema),
    DateTime(DateTimeSchema),
    /// Exactly one of the wrapped shapes applies.
    OneOf(Vec<SchemaNode>),
}

impl SchemaNode {
    /// Variant name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            SchemaNode::Number(_) => "number",
            SchemaNode::State(_) => "state",
            SchemaNode::Level(_) => "level",
            SchemaNode::Raw(_) => "raw",
            SchemaNode::Object(_) => "object",
            SchemaNode::Array(_) => "array",
            SchemaNode::Bitmap(_) => "bitmap",
            SchemaNode::NumericValues(_) => "numericValue",
            SchemaNode::DateTime(_) => "date-time",
            SchemaNode::OneOf(_) => "oneOf",
        }
    }

    /// Encoded size in bytes, or `None` when the encoding is variable.
    ///
    /// Objects take the first alternative of each element; a `OneOf` is
    /// sized by its first alternative.
    pub fn byte_length(&self) -> Option<usize> {
        match self {
            SchemaNode::Number(number) => Some(number.format.width()),
            SchemaNode::State(state) => Some(state.size.max(1)),
            SchemaNode::NumericValues(values) => Some(values.size.max(1)),
            SchemaNode::Level(level) => level_width(&level.base).ok(),
            SchemaNode::Raw(raw) => (raw.min_size == raw.max_size).then_some(raw.max_size),
            SchemaNode::Bitmap(bitmap) => Some(bitmap.size),
            SchemaNode::DateTime(date_time) => Some(date_time.size),
            SchemaNode::Object(object) => object
                .elements
                .iter()
                .map(|element| element.alternatives.first().and_then(SchemaNode::byte_length))
                .sum(),
            SchemaNode::Array(array) => (array.min_items == array.max_items)
                .then(|| array.item_size * array.max_items),
            SchemaNode::OneOf(alternatives) => {
                alternatives.first().and_then(SchemaNode::byte_length)
            }
        }
    }
}

/// Width in bytes implied by a level base literal (`"0x31"` is one byte).
pub fn level_width(base: &str) -> Result<usize, EchonetError> {
    let digits = crate::util::hex::hex_digit_count(base);
    let width = digits / 2;
    if width == 0 || digits % 2 != 0 {
        return Err(EchonetError::SchemaMismatch(format!(
            "level base '{base}' is not a whole number of bytes"
        )));
    }
    Ok(width)
}

/// Shared, read-only list of parallel alternatives for one property.
pub type Alternatives = std::sync::Arc<[SchemaNode]>;
