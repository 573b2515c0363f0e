//! Response decoding shared by every transport.
//!
//! The service answers either with the expected body or with an object
//! carrying an `error` field. Both arrive as ordinary JSON, so the error
//! check has to happen before the typed decode.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{Error, Result};

/// Decode a response body, turning an `error` field into [`Error::Service`].
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    let value: Value = if body.trim().is_empty() {
        Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_str(body)?
    };

    if let Some(message) = service_error(&value) {
        return Err(Error::Service(message));
    }

    Ok(serde_json::from_value(value)?)
}

/// Extract a readable message from an `error` field, if there is one.
#[must_use]
pub fn service_error(value: &Value) -> Option<String> {
    let error = value.get("error").filter(|e| !e.is_null())?;
    let message = match error {
        Value::String(s) => s.clone(),
        Value::Object(fields) => {
            let code = fields.get("code").and_then(Value::as_str);
            let message = fields.get("message").and_then(Value::as_str);
            match (code, message) {
                (Some(code), Some(message)) => format!("{code}: {message}"),
                (None, Some(message)) => message.to_string(),
                (Some(code), None) => code.to_string(),
                (None, None) => error.to_string(),
            }
        }
        other => other.to_string(),
    };
    Some(message)
}
