//! Structured payloads: JSON text and msgpack bytes.
//!
//! The root is either a single command object or an array of them. Array
//! elements are independent commands, so a malformed element only fails
//! itself.

use super::ParsedExpression;
use crate::error::ParseError;
use crate::value::Value;

/// Commands decoded from one payload, each independently valid or not.
pub type Batch = Vec<Result<ParsedExpression, ParseError>>;

/// Decode a JSON command or batch.
pub fn parse_json(text: &str) -> Result<Batch, ParseError> {
    let root: Value = serde_json::from_str(text).map_err(|e| ParseError::Json(e.to_string()))?;
    split_batch(root)
}

/// Decode a msgpack command or batch.
pub fn parse_msgpack(bytes: &[u8]) -> Result<Batch, ParseError> {
    let root: Value =
        rmp_serde::from_slice(bytes).map_err(|e| ParseError::MsgPack(e.to_string()))?;
    split_batch(root)
}

fn split_batch(root: Value) -> Result<Batch, ParseError> {
    match root {
        Value::Map(_) => Ok(vec![ParsedExpression::from_value(root)]),
        Value::List(items) => Ok(items
            .into_iter()
            .map(ParsedExpression::from_value)
            .collect()),
        _ => Err(ParseError::Shape(
            "payload must be a command object or an array of them".to_string(),
        )),
    }
}
