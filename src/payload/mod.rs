//! # Property Payloads
//!
//! Schema-directed handling of EDT bytes: random generation for fuzzing,
//! validation of observed values, and the big-endian integer helpers both
//! rely on.

pub mod generate;
pub mod numeric;
pub mod validate;

pub use generate::ValueGenerator;
pub use validate::{validate, validate_node};
