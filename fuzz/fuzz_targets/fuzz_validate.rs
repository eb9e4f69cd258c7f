#![no_main]

use echonet_audit::payload::validate::validate;
use echonet_audit::schema::{
    ArraySchema, BitmapField, BitmapSchema, DateTimeSchema, LevelSchema, NumberFormat,
    NumberSchema, ObjectElement, ObjectSchema, RawSchema, SchemaNode,
};
use libfuzzer_sys::fuzz_target;

fn schemas() -> Vec<SchemaNode> {
    vec![
        SchemaNode::Number(NumberSchema::new(NumberFormat::Int32, -1000, 1000)),
        SchemaNode::Level(LevelSchema {
            base: "0x31".into(),
            maximum: 8,
        }),
        SchemaNode::DateTime(DateTimeSchema { size: 7 }),
        SchemaNode::Bitmap(BitmapSchema {
            size: 2,
            fields: vec![BitmapField {
                name: "low".into(),
                description: String::new(),
                index: 0,
                bitmask: 0x3C,
                value: Vec::new(),
            }],
        }),
        SchemaNode::Array(ArraySchema {
            item_size: 2,
            min_items: 0,
            max_items: 16,
            items: vec![SchemaNode::Number(NumberSchema::new(NumberFormat::Uint16, 0, 500))],
        }),
        SchemaNode::Object(ObjectSchema {
            elements: vec![
                ObjectElement {
                    name: "head".into(),
                    alternatives: vec![SchemaNode::Number(NumberSchema::new(NumberFormat::Uint8, 0, 9))],
                },
                ObjectElement {
                    name: "body".into(),
                    alternatives: vec![SchemaNode::Raw(RawSchema {
                        min_size: 0,
                        max_size: 64,
                    })],
                },
                ObjectElement {
                    name: "tail".into(),
                    alternatives: vec![SchemaNode::DateTime(DateTimeSchema { size: 2 })],
                },
            ],
        }),
    ]
}

fuzz_target!(|data: &[u8]| {
    // Validation of arbitrary bytes never panics, whatever the schema
    for schema in schemas() {
        let _ = validate(std::slice::from_ref(&schema), data);
    }
});
