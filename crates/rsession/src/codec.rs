//! Wire format of stored session records.
//!
//! A record is a JSON object encoded as standard, padded base64. The object
//! map is key-sorted, so the same attributes always encode to the same
//! string. The dirty check in [`Session::persist`](crate::Session::persist)
//! relies on that.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Encode a record map.
pub fn encode(record: &Map<String, Value>) -> String {
    // Serializing a `Map<String, Value>` cannot fail: every key is a string
    // and every value is already JSON.
    let json = Value::Object(record.clone()).to_string();
    STANDARD.encode(json)
}

/// Decode a stored string back into a record map.
pub fn decode(encoded: &str) -> Result<Map<String, Value>> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::MalformedSessionData(format!("invalid base64: {}", e)))?;

    let json = String::from_utf8(bytes)
        .map_err(|e| Error::MalformedSessionData(format!("invalid utf-8: {}", e)))?;

    match serde_json::from_str::<Value>(&json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(Error::MalformedSessionData(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
        Err(e) => Err(Error::MalformedSessionData(format!("invalid JSON: {}", e))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
