//! Conversion between [`Value`] trees and JSON documents.
//!
//! Arrays are replaced by their reserved record on the way out and rebuilt on
//! the way in. Reconstruction is bottom-up, so arrays nested at any depth in
//! sequences or mappings come back as arrays.

use serde_json::Value as Json;
use tracing::trace;

use crate::array::{decode_array, encode_array, ArrayRecord, DATA_KEY, ELEMENT_TYPE_KEY};
use crate::error::{CodecError, Result};
use crate::value::{Map, Number, Value};

/// Convert a value tree into a JSON tree.
pub fn to_json(value: &Value) -> Result<Json> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(Number::Integer(i)) => Json::from(*i),
        Value::Number(Number::Float(f)) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .ok_or_else(|| CodecError::UnencodableType(format!("non-finite number {f}")))?,
        Value::Text(s) => Json::String(s.clone()),
        Value::Sequence(items) => Json::Array(items.iter().map(to_json).collect::<Result<_>>()?),
        Value::Mapping(map) => Json::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), to_json(v)?)))
                .collect::<Result<_>>()?,
        ),
        Value::Array(array) => serde_json::to_value(encode_array(array))?,
    })
}

/// Convert a JSON tree into a value tree, rebuilding array records.
pub fn from_json(json: Json) -> Result<Value> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Number(Number::Integer(i)),
            None => Value::Number(Number::Float(n.as_f64().ok_or_else(|| {
                CodecError::UnencodableType(format!("number {n} out of range"))
            })?)),
        },
        Json::String(s) => Value::Text(s),
        Json::Array(items) => {
            Value::Sequence(items.into_iter().map(from_json).collect::<Result<_>>()?)
        }
        Json::Object(object) if is_array_record(&object) => {
            let record: ArrayRecord = serde_json::from_value(Json::Object(object))
                .map_err(|err| CodecError::MalformedArray(err.to_string()))?;
            let array = decode_array(&record)?;
            trace!(
                element_type = %array.element_type(),
                shape = ?array.shape(),
                "decoded array record"
            );
            Value::Array(array)
        }
        Json::Object(object) => Value::Mapping(
            object
                .into_iter()
                .map(|(k, v)| Ok((k, from_json(v)?)))
                .collect::<Result<Map>>()?,
        ),
    })
}

fn is_array_record(object: &serde_json::Map<String, Json>) -> bool {
    object.contains_key(ELEMENT_TYPE_KEY) && object.contains_key(DATA_KEY)
}

/// Encode a value as a JSON document.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&to_json(value)?)?)
}

/// Encode a value as a JSON string.
pub fn encode_to_string(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(&to_json(value)?)?)
}

/// Decode a JSON document into a value.
pub fn decode(bytes: &[u8]) -> Result<Value> {
    from_json(serde_json::from_slice(bytes)?)
}

/// Decode a JSON string into a value.
pub fn decode_str(text: &str) -> Result<Value> {
    from_json(serde_json::from_str(text)?)
}
