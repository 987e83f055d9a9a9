use serde_json::Value;
use std::borrow::Cow;

/// A decoded message body as stored in the topic cache.
///
/// Decoding happens once when the message arrives: valid JSON is kept as a
/// tree, anything else is kept as the exact text that was received.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    pub fn decode(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Text(text.into_owned()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Json(_) => None,
            Payload::Text(text) => Some(text),
        }
    }

    /// Structured view of the payload. A JSON string that itself holds JSON
    /// (some publishers double-encode) is parsed one more level. Text
    /// payloads already failed to parse on arrival and have no structure.
    pub fn structured(&self) -> Option<Cow<'_, Value>> {
        match self {
            Payload::Json(value @ Value::String(inner)) => match serde_json::from_str(inner) {
                Ok(parsed) => Some(Cow::Owned(parsed)),
                Err(_) => Some(Cow::Borrowed(value)),
            },
            Payload::Json(value) => Some(Cow::Borrowed(value)),
            Payload::Text(_) => None,
        }
    }

    /// Human-readable rendering, used by the debug dump.
    pub fn display_text(&self) -> String {
        match self {
            Payload::Json(Value::String(text)) => text.clone(),
            Payload::Json(value) => value.to_string(),
            Payload::Text(text) => text.clone(),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_string())
    }
}

/// Renders an outbound value as wire text.
///
/// Objects and arrays become compact JSON; strings go out unquoted; numbers
/// and booleans use their JSON spelling; null is an empty body.
pub fn encode_outbound(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
