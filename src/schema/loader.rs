//! # Schema Registry
//!
//! Loads the machine-readable appendix document (`definitions` plus
//! `devices`) and turns class entries into [`Instance`]s for a given
//! appendix release.
//!
//! Documents stay as `serde_json::Value` trees; schema nodes are only built
//! for the classes that are actually requested.

use crate::constants::{CLASS_GROUP_PROFILE, CLASS_GROUP_USER_DEFINED, EOJ_SUPER_CLASS, LATEST_RELEASE};
use crate::device::{AccessRule, Instance, PropertyDescriptor};
use crate::echonet::frame::ObjectCode;
use crate::error::EchonetError;
use crate::schema::{
    ArraySchema, BitmapField, BitmapSchema, DateTimeSchema, LevelSchema, NumberFormat,
    NumberSchema, NumericValue, NumericValuesSchema, ObjectElement, ObjectSchema, RawSchema,
    SchemaNode, StateEntry, StateSchema,
};
use crate::util::hex::{parse_hex_literal, parse_hex_u8};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

const REF_PREFIX: &str = "#/definitions/";
const MAX_REF_DEPTH: usize = 16;

/// Parsed appendix document.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    definitions: Map<String, Value>,
    devices: Map<String, Value>,
}

impl SchemaRegistry {
    pub fn from_json_str(document: &str) -> Result<Self, EchonetError> {
        let value: Value = serde_json::from_str(document)?;
        Self::from_value(value)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EchonetError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path)
            .map_err(|e| EchonetError::Schema(format!("read {}: {e}", path.display())))?;
        let registry = Self::from_json_str(&document)?;
        log::info!(
            "loaded {} classes from {}",
            registry.devices.len(),
            path.display()
        );
        Ok(registry)
    }

    pub fn from_value(document: Value) -> Result<Self, EchonetError> {
        let Value::Object(mut root) = document else {
            return Err(EchonetError::Schema("document is not a JSON object".to_string()));
        };
        let definitions = match root.remove("definitions") {
            Some(Value::Object(map)) => map,
            Some(_) => return Err(EchonetError::Schema("'definitions' is not an object".into())),
            None => Map::new(),
        };
        let devices = match root.remove("devices") {
            Some(Value::Object(map)) => map,
            _ => return Err(EchonetError::Schema("missing 'devices' object".to_string())),
        };
        Ok(SchemaRegistry {
            definitions,
            devices,
        })
    }

    /// Class group + class codes present in the document.
    pub fn class_codes(&self) -> Vec<u16> {
        self.devices
            .keys()
            .filter_map(|key| parse_hex_literal(key).ok())
            .filter_map(|code| u16::try_from(code).ok())
            .collect()
    }

    pub fn contains_class(&self, class_key: u16) -> bool {
        self.devices.contains_key(&class_name_key(class_key))
    }

    /// Builds the instance for `object_code` as defined in `release`.
    ///
    /// Device classes inherit the super class properties they do not define
    /// themselves; profile and user-defined classes do not.
    pub fn instance(&self, object_code: ObjectCode, release: &str) -> Result<Instance, EchonetError> {
        let mut instance = self
            .class_instance(object_code, release)
            .map_err(|e| e.within(format!("class {object_code}")))?;

        let super_class = ObjectCode(EOJ_SUPER_CLASS);
        let inherits = object_code.class_group() != CLASS_GROUP_PROFILE
            && object_code.class_group() != CLASS_GROUP_USER_DEFINED
            && object_code.class_key() != super_class.class_key();
        if inherits && self.contains_class(super_class.class_key()) {
            let parent = self
                .class_instance(super_class, release)
                .map_err(|e| e.within("super class"))?;
            for property in parent.properties {
                if instance.property(property.epc).is_none() {
                    instance.properties.push(property);
                }
            }
        }
        Ok(instance)
    }

    fn class_instance(&self, object_code: ObjectCode, release: &str) -> Result<Instance, EchonetError> {
        let key = class_name_key(object_code.class_key());
        let entry = self
            .devices
            .get(&key)
            .ok_or_else(|| EchonetError::Schema(format!("no class {key} in document")))?;
        let class = select_release(entry, release)?;

        let class_name = english(class.get("className")).unwrap_or_default();
        let mut properties = Vec::new();
        if let Some(Value::Object(elements)) = class.get("elProperties") {
            for (epc_key, value) in elements {
                let epc = parse_hex_u8(epc_key)?;
                let property = self
                    .property(epc, value, release)
                    .map_err(|e| e.within(format!("EPC {epc_key}")))?;
                properties.push(property);
            }
        }

        Ok(Instance {
            object_code,
            class_name,
            properties,
        })
    }

    fn property(&self, epc: u8, entry: &Value, release: &str) -> Result<PropertyDescriptor, EchonetError> {
        let property = select_release(entry, release)?;

        let rule = |name: &str| -> Result<AccessRule, EchonetError> {
            match property.get("accessRule").and_then(|r| r.get(name)).and_then(Value::as_str) {
                Some(rule) => AccessRule::from_name(rule),
                None => Ok(AccessRule::NotApplicable),
            }
        };

        let data = property
            .get("data")
            .ok_or_else(|| EchonetError::Schema("property has no 'data'".to_string()))?;
        let data = match data.get("oneOf").and_then(Value::as_array) {
            Some(entries) if entries.iter().any(|e| e.get("validRelease").is_some()) => {
                select_release(data, release)?
            }
            _ => data,
        };
        let schema: Vec<SchemaNode> = self.parse_data(data, 0)?;

        Ok(PropertyDescriptor {
            epc,
            name: english(property.get("propertyName")).unwrap_or_default(),
            get: rule("get")?,
            set: rule("set")?,
            inf: rule("inf")?,
            implements_get: false,
            implements_set: false,
            implements_inf: false,
            note: english(property.get("note")).unwrap_or_default(),
            schema: Arc::from(schema),
        })
    }

    /// Parses one data description into its parallel alternatives.
    fn parse_data(&self, data: &Value, depth: usize) -> Result<Vec<SchemaNode>, EchonetError> {
        if depth > MAX_REF_DEPTH {
            return Err(EchonetError::Schema("$ref nesting too deep".to_string()));
        }

        if let Some(entries) = data.get("oneOf") {
            let entries = entries
                .as_array()
                .ok_or_else(|| EchonetError::Schema("'oneOf' is not an array".to_string()))?;
            let mut alternatives = Vec::new();
            for entry in entries {
                alternatives.extend(self.parse_data(entry, depth + 1)?);
            }
            return Ok(alternatives);
        }

        if let Some(reference) = data.get("$ref").and_then(Value::as_str) {
            return self.parse_reference(data, reference, depth);
        }

        let kind = data
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| EchonetError::Schema("data has neither 'type' nor '$ref'".to_string()))?;

        let node = match kind {
            "number" => SchemaNode::Number(parse_number(data)?),
            "state" => SchemaNode::State(parse_state(data)?),
            "level" => SchemaNode::Level(LevelSchema {
                base: data.get("base").and_then(Value::as_str).unwrap_or("0x31").to_string(),
                maximum: data.get("maximum").and_then(Value::as_u64).unwrap_or(0),
            }),
            "raw" => SchemaNode::Raw(RawSchema {
                min_size: usize_field(data, "minSize").unwrap_or(0),
                max_size: usize_field(data, "maxSize").unwrap_or(0),
            }),
            "object" => SchemaNode::Object(self.parse_object(data, depth)?),
            "array" => SchemaNode::Array(ArraySchema {
                item_size: usize_field(data, "itemSize").unwrap_or(0),
                min_items: usize_field(data, "minItems").unwrap_or(0),
                max_items: usize_field(data, "maxItems").unwrap_or(0),
                items: match data.get("items") {
                    Some(items) => self.parse_data(items, depth + 1)?,
                    None => Vec::new(),
                },
            }),
            "bitmap" => SchemaNode::Bitmap(self.parse_bitmap(data, depth)?),
            "numericValue" => SchemaNode::NumericValues(parse_numeric_values(data)?),
            "time" | "date-time" => SchemaNode::DateTime(DateTimeSchema {
                size: usize_field(data, "size").unwrap_or(0),
            }),
            other => return Err(EchonetError::Schema(format!("unknown data type '{other}'"))),
        };
        Ok(vec![node])
    }

    /// Resolves a `$ref` and applies the per-use number overrides.
    fn parse_reference(
        &self,
        data: &Value,
        reference: &str,
        depth: usize,
    ) -> Result<Vec<SchemaNode>, EchonetError> {
        let name = reference
            .strip_prefix(REF_PREFIX)
            .ok_or_else(|| EchonetError::Schema(format!("unsupported reference '{reference}'")))?;
        let definition = self
            .definitions
            .get(name)
            .ok_or_else(|| EchonetError::Schema(format!("undefined reference '{reference}'")))?;

        let mut nodes = self.parse_data(definition, depth + 1)?;
        for node in &mut nodes {
            if let SchemaNode::Number(number) = node {
                if let Some(unit) = data.get("unit").and_then(Value::as_str) {
                    number.unit = Some(unit.to_string());
                }
                if let Some(multiple) = data.get("multipleOf").and_then(Value::as_f64) {
                    number.multiple_of = Some(multiple);
                }
                if let Some(coefficient) = data.get("coefficient") {
                    number.coefficient = parse_coefficient(coefficient)?;
                }
            }
        }
        Ok(nodes)
    }

    fn parse_object(&self, data: &Value, depth: usize) -> Result<ObjectSchema, EchonetError> {
        let mut elements = Vec::new();
        for entry in array_field(data, "properties") {
            let name = label(entry).unwrap_or_default();
            let element = entry.get("element").ok_or_else(|| {
                EchonetError::Schema(format!("object element '{name}' has no 'element'"))
            })?;
            let alternatives = self
                .parse_data(element, depth + 1)
                .map_err(|e| e.within(format!("object element '{name}'")))?;
            elements.push(ObjectElement { name, alternatives });
        }
        Ok(ObjectSchema { elements })
    }

    fn parse_bitmap(&self, data: &Value, depth: usize) -> Result<BitmapSchema, EchonetError> {
        let mut fields = Vec::new();
        for entry in array_field(data, "bitmaps") {
            let name = label(entry).unwrap_or_default();
            let position = entry.get("position");
            let index = position
                .and_then(|p| p.get("index"))
                .and_then(Value::as_u64)
                .and_then(|i| u8::try_from(i).ok())
                .unwrap_or(0);
            let bitmask = match position.and_then(|p| p.get("bitMask")) {
                Some(mask) => parse_mask(mask)?,
                None => 0,
            };
            let value = match entry.get("value") {
                Some(value) => self
                    .parse_data(value, depth + 1)
                    .map_err(|e| e.within(format!("bitmap field '{name}'")))?,
                None => Vec::new(),
            };
            fields.push(BitmapField {
                description: english(entry.get("descriptions")).unwrap_or_default(),
                name,
                index,
                bitmask,
                value,
            });
        }
        Ok(BitmapSchema {
            size: usize_field(data, "size").unwrap_or(1),
            fields,
        })
    }
}

fn class_name_key(class_key: u16) -> String {
    format!("0x{class_key:04X}")
}

/// Picks the entry of a `oneOf` list valid for `release`; plain entries are
/// returned as they are.
fn select_release<'a>(entry: &'a Value, release: &str) -> Result<&'a Value, EchonetError> {
    let Some(candidates) = entry.get("oneOf").and_then(Value::as_array) else {
        return Ok(entry);
    };
    candidates
        .iter()
        .find(|candidate| release_matches(candidate, release))
        .ok_or_else(|| EchonetError::Schema(format!("no definition valid for release {release}")))
}

fn release_matches(candidate: &Value, release: &str) -> bool {
    let Some(valid) = candidate.get("validRelease") else {
        return true;
    };
    let from = valid.get("from").and_then(Value::as_str).unwrap_or("A");
    let to = match valid.get("to").and_then(Value::as_str) {
        Some("latest") | None => LATEST_RELEASE,
        Some(to) => to,
    };
    from <= release && release <= to
}

/// Reads `{"en": ...}` style localized text.
fn english(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        other => other.get("en").and_then(Value::as_str).map(str::to_string),
    }
}

/// Display name of an enum, object or bitmap entry.
fn label(entry: &Value) -> Option<String> {
    english(entry.get("name"))
        .or_else(|| english(entry.get("state")))
        .or_else(|| english(entry.get("elementName")))
        .or_else(|| english(entry.get("descriptions")))
}

fn usize_field(data: &Value, key: &str) -> Option<usize> {
    data.get(key)
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
}

fn array_field<'a>(data: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    data.get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

/// Enum codes are hex strings (`"0x41"`) or plain integers.
fn parse_code(value: &Value) -> Result<u64, EchonetError> {
    match value {
        Value::String(text) => Ok(parse_hex_literal(text)?),
        Value::Number(number) => number
            .as_u64()
            .ok_or_else(|| EchonetError::Schema(format!("invalid code {number}"))),
        other => Err(EchonetError::Schema(format!("invalid code {other}"))),
    }
}

/// Bit masks are written `"0b00000011"`, `"0x03"` or as integers.
fn parse_mask(value: &Value) -> Result<u8, EchonetError> {
    let mask = match value {
        Value::String(text) => {
            let text = text.trim();
            match text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
                Some(binary) => u64::from_str_radix(binary, 2)
                    .map_err(|e| EchonetError::Schema(format!("bit mask '{text}': {e}")))?,
                None => parse_hex_literal(text)?,
            }
        }
        other => parse_code(other)?,
    };
    u8::try_from(mask).map_err(|_| EchonetError::Schema(format!("bit mask {mask:#X} wider than a byte")))
}

fn parse_coefficient(value: &Value) -> Result<Vec<u8>, EchonetError> {
    let entries = value
        .as_array()
        .ok_or_else(|| EchonetError::Schema("'coefficient' is not an array".to_string()))?;
    entries
        .iter()
        .map(|entry| {
            let code = parse_code(entry)?;
            u8::try_from(code).map_err(|_| EchonetError::Schema(format!("coefficient EPC {code:#X}")))
        })
        .collect()
}

fn parse_number(data: &Value) -> Result<NumberSchema, EchonetError> {
    let format = NumberFormat::from_name(data.get("format").and_then(Value::as_str).unwrap_or("uint8"))?;
    let (low, high) = format.bounds();
    let mut number = NumberSchema::new(
        format,
        data.get("minimum").and_then(Value::as_i64).unwrap_or(low),
        data.get("maximum").and_then(Value::as_i64).unwrap_or(high),
    );
    number.enumeration = array_field(data, "enum").filter_map(Value::as_i64).collect();
    number.unit = data.get("unit").and_then(Value::as_str).map(str::to_string);
    number.multiple_of = data.get("multipleOf").and_then(Value::as_f64);
    if let Some(coefficient) = data.get("coefficient") {
        number.coefficient = parse_coefficient(coefficient)?;
    }
    Ok(number)
}

fn parse_state(data: &Value) -> Result<StateSchema, EchonetError> {
    let states = array_field(data, "enum")
        .map(|entry| {
            let code = entry
                .get("edt")
                .ok_or_else(|| EchonetError::Schema("state entry has no 'edt'".to_string()))?;
            Ok(StateEntry {
                code: parse_code(code)?,
                label: label(entry).unwrap_or_default(),
                read_only: entry.get("readOnly").and_then(Value::as_bool).unwrap_or(false),
            })
        })
        .collect::<Result<Vec<_>, EchonetError>>()?;
    Ok(StateSchema {
        size: usize_field(data, "size").unwrap_or(1),
        states,
    })
}

fn parse_numeric_values(data: &Value) -> Result<NumericValuesSchema, EchonetError> {
    let values = array_field(data, "enum")
        .map(|entry| {
            let code = entry
                .get("edt")
                .ok_or_else(|| EchonetError::Schema("numeric value has no 'edt'".to_string()))?;
            Ok(NumericValue {
                code: parse_code(code)?,
                value: entry.get("numericValue").and_then(Value::as_f64).unwrap_or(0.0),
            })
        })
        .collect::<Result<Vec<_>, EchonetError>>()?;
    Ok(NumericValuesSchema {
        size: usize_field(data, "size").unwrap_or(1),
        values,
    })
}
