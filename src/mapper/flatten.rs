//! Record flattening
//!
//! Serializes a record through `serde_json::Value` and keeps only scalar
//! fields, encoded as strings.

use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, SyncError};
use super::finite::check_finite;
use super::FieldMap;

/// Convert a record into a field map
///
/// - Numbers and booleans use their canonical text form
/// - Strings (and unit enum variants) are stored as-is
/// - `None` fields are omitted, never stored as empty strings
///
/// Fails with `Mapping` when the record is not a struct-like value, when
/// a field holds a nested object or array, or when a float is NaN or infinite.
pub fn to_field_map<T: Serialize + ?Sized>(record: &T) -> Result<FieldMap> {
    check_finite(record).map_err(|e| SyncError::Mapping(e.to_string()))?;

    let value = serde_json::to_value(record)
        .map_err(|e| SyncError::Mapping(format!("cannot serialize record: {}", e)))?;

    let object = match value {
        Value::Object(object) => object,
        other => {
            return Err(SyncError::Mapping(format!(
                "expected a record with named fields, got {}",
                kind_of(&other)
            )))
        }
    };

    let mut fields = FieldMap::new();
    for (name, value) in object {
        let encoded = match value {
            Value::Null => continue,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s,
            nested @ (Value::Array(_) | Value::Object(_)) => {
                return Err(SyncError::Mapping(format!(
                    "field `{}` holds {}, only scalar fields can be stored in a hash",
                    name,
                    kind_of(&nested)
                )))
            }
        };
        fields.insert(name, encoded);
    }

    Ok(fields)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
