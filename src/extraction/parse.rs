use crate::classifier::ContentKind;
use crate::extraction::record::ExtractedRecord;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("no json object in response")]
    NoObject,

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parse the text between the first `{` and the last `}` as a JSON object.
pub fn extract_json_object(raw: &str) -> Result<Map<String, Value>, ParseError> {
    let start = raw.find('{').ok_or(ParseError::NoObject)?;
    let end = raw.rfind('}').ok_or(ParseError::NoObject)?;
    if end < start {
        return Err(ParseError::NoObject);
    }
    Ok(serde_json::from_str(&raw[start..=end])?)
}

/// Strings are trimmed, numbers and booleans are written out, anything else
/// carries no usable value.
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Map a parsed object onto the fixed field set of `kind`. Undeclared keys
/// are dropped; when two spellings of the same key are present the first
/// non-empty one wins.
pub fn partial_from_object(kind: ContentKind, object: &Map<String, Value>) -> ExtractedRecord {
    let mut record = ExtractedRecord::empty(kind);
    for (key, value) in object {
        let Some(text) = scalar_text(value) else {
            continue;
        };
        if let Some(slot) = record.slot_mut(key)
            && slot.is_empty()
        {
            *slot = text;
        }
    }
    record
}

/// Interpret a backend response as a partial record of `kind`.
pub fn parse_partial(kind: ContentKind, raw: &str) -> Result<ExtractedRecord, ParseError> {
    let object = extract_json_object(raw)?;
    Ok(partial_from_object(kind, &object))
}
