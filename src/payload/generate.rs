//! # Random Value Generator
//!
//! Produces random EDTs that satisfy a property schema. The generator owns
//! its random source, so a fuzz session seeds it once and threads it through
//! every call; nothing here touches process-wide state.
//!
//! ```rust
//! use echonet_audit::payload::generate::ValueGenerator;
//! use echonet_audit::schema::{NumberFormat, NumberSchema, SchemaNode};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut generator = ValueGenerator::new(StdRng::seed_from_u64(7));
//! let node = SchemaNode::Number(NumberSchema::new(NumberFormat::Uint8, 0, 10));
//! let edt = generator.generate(&[node]).unwrap();
//! assert!(edt[0] <= 10);
//! ```

use super::numeric::{encode_be, encode_code};
use crate::error::EchonetError;
use crate::schema::bitmap::pack_field;
use crate::schema::{
    level_width, ArraySchema, BitmapSchema, DateTimeSchema, NumberSchema, ObjectSchema,
    SchemaNode,
};
use crate::util::hex::parse_hex_literal;
use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use rand::seq::SliceRandom;
use rand::Rng;

/// Schema-directed random EDT generator.
#[derive(Debug)]
pub struct ValueGenerator<R> {
    rng: R,
    fixed_time: Option<NaiveDateTime>,
}

impl<R: Rng> ValueGenerator<R> {
    pub fn new(rng: R) -> Self {
        ValueGenerator {
            rng,
            fixed_time: None,
        }
    }

    /// Uses `now` instead of the wall clock for date-time properties.
    pub fn with_fixed_time(mut self, now: NaiveDateTime) -> Self {
        self.fixed_time = Some(now);
        self
    }

    /// Random source shared with the caller (TIDs, property choice).
    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }

    /// Picks one alternative uniformly and generates a value for it.
    pub fn generate(&mut self, alternatives: &[SchemaNode]) -> Result<Vec<u8>, EchonetError> {
        let node = alternatives
            .choose(&mut self.rng)
            .ok_or_else(|| EchonetError::SchemaMismatch("no schema alternatives".to_string()))?;
        self.generate_node(node)
    }

    /// Generates a value for one schema node.
    pub fn generate_node(&mut self, node: &SchemaNode) -> Result<Vec<u8>, EchonetError> {
        match node {
            SchemaNode::Number(number) => self.number(number),
            SchemaNode::State(state) => {
                let entry = state.states.choose(&mut self.rng).ok_or_else(|| {
                    EchonetError::SchemaMismatch("state without enumerated values".to_string())
                })?;
                Ok(encode_code(entry.code, state.size.max(1)))
            }
            SchemaNode::NumericValues(values) => {
                let entry = values.values.choose(&mut self.rng).ok_or_else(|| {
                    EchonetError::SchemaMismatch("numericValue without values".to_string())
                })?;
                Ok(encode_code(entry.code, values.size.max(1)))
            }
            SchemaNode::Level(level) => {
                let width = level_width(&level.base)?;
                let base = parse_hex_literal(&level.base)
                    .map_err(|e| EchonetError::SchemaMismatch(format!("level base: {e}")))?;
                let offset = self.rng.gen_range(0..=level.maximum);
                Ok(encode_code(base.saturating_add(offset), width))
            }
            SchemaNode::Raw(raw) => {
                if raw.min_size > raw.max_size {
                    return Err(EchonetError::SchemaMismatch(format!(
                        "raw size range {}..{} is empty",
                        raw.min_size, raw.max_size
                    )));
                }
                let len = self.rng.gen_range(raw.min_size..=raw.max_size);
                Ok((0..len).map(|_| self.rng.gen::<u8>()).collect())
            }
            SchemaNode::Object(object) => self.object(object),
            SchemaNode::Array(array) => self.array(array),
            SchemaNode::Bitmap(bitmap) => self.bitmap(bitmap),
            SchemaNode::DateTime(date_time) => self.date_time(date_time),
            SchemaNode::OneOf(alternatives) => self.generate(alternatives),
        }
    }

    fn number(&mut self, number: &NumberSchema) -> Result<Vec<u8>, EchonetError> {
        let width = number.format.width();
        if let Some(&value) = number.enumeration.choose(&mut self.rng) {
            return Ok(encode_be(value, width));
        }
        if number.minimum > number.maximum {
            return Err(EchonetError::SchemaMismatch(format!(
                "number range {}..{} is empty",
                number.minimum, number.maximum
            )));
        }
        let (low, high) = number.format.bounds();
        let value = self
            .rng
            .gen_range(number.minimum..=number.maximum)
            .clamp(low, high);
        Ok(encode_be(value, width))
    }

    /// A trailing element without a static size is followed by one zero
    /// byte, since the validator sizes it as every remaining byte but one.
    fn object(&mut self, object: &ObjectSchema) -> Result<Vec<u8>, EchonetError> {
        let mut edt = Vec::new();
        let last = object.elements.len().saturating_sub(1);
        for (i, element) in object.elements.iter().enumerate() {
            let context = || format!("object element '{}'", element.name);
            let node = element.alternatives.choose(&mut self.rng).ok_or_else(|| {
                EchonetError::SchemaMismatch("no schema alternatives".to_string()).within(context())
            })?;
            let value = self.generate_node(node).map_err(|e| e.within(context()))?;
            edt.extend_from_slice(&value);
            if i == last && node.byte_length().is_none() {
                edt.push(0x00);
            }
        }
        Ok(edt)
    }

    fn array(&mut self, array: &ArraySchema) -> Result<Vec<u8>, EchonetError> {
        if array.min_items > array.max_items {
            return Err(EchonetError::SchemaMismatch(format!(
                "array item range {}..{} is empty",
                array.min_items, array.max_items
            )));
        }
        let count = self.rng.gen_range(array.min_items..=array.max_items);
        let mut edt = Vec::with_capacity(count * array.item_size);
        for i in 0..count {
            let item = self
                .generate(&array.items)
                .map_err(|e| e.within(format!("array item {i}")))?;
            edt.extend_from_slice(&item);
        }
        Ok(edt)
    }

    fn bitmap(&mut self, bitmap: &BitmapSchema) -> Result<Vec<u8>, EchonetError> {
        let mut packed = 0u64;
        for field in &bitmap.fields {
            let value = if field.value.is_empty() {
                self.rng.gen::<u8>()
            } else {
                let bytes = self
                    .generate(&field.value)
                    .map_err(|e| e.within(format!("bitmap field '{}'", field.name)))?;
                bytes.last().copied().unwrap_or(0)
            };
            packed |= pack_field(field, value)
                .map_err(|e| e.within(format!("bitmap field '{}'", field.name)))?;
        }
        Ok(encode_code(packed, bitmap.size))
    }

    fn date_time(&mut self, schema: &DateTimeSchema) -> Result<Vec<u8>, EchonetError> {
        let now = self
            .fixed_time
            .unwrap_or_else(|| Local::now().naive_local());
        let [year_hi, year_lo] = (now.year().clamp(0, u16::MAX as i32) as u16).to_be_bytes();
        let month = now.month() as u8;
        let day = now.day() as u8;
        let hour = now.hour() as u8;
        let minute = now.minute() as u8;
        let second = now.second().min(59) as u8;

        match schema.size {
            2 => Ok(vec![month, day]),
            3 => Ok(vec![hour, minute, second]),
            4 => Ok(vec![year_hi, year_lo, month, day]),
            6 => Ok(vec![year_hi, year_lo, month, day, hour, minute]),
            7 => Ok(vec![year_hi, year_lo, month, day, hour, minute, second]),
            other => Err(EchonetError::SchemaMismatch(format!(
                "unsupported date-time size {other}"
            ))),
        }
    }
}
