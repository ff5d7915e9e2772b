use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    Conflict,
    RateLimited,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            400 | 422 => Self::Validation,
            409 => Self::Conflict,
            429 => Self::RateLimited,
            _ => Self::Internal,
        }
    }
}

/// Error answer from the server: HTTP status plus the raw JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{code:?} ({status}): {message}")]
pub struct ApiError {
    pub status: u16,
    pub code: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub payload: Value,
}

impl ApiError {
    pub fn new(status: u16, payload: Value) -> Self {
        let message = message_from_payload(&payload)
            .unwrap_or_else(|| format!("request failed with status {status}"));
        Self {
            status,
            code: ErrorCode::from_status(status),
            message,
            payload,
        }
    }

    /// Builds an error from a response body that may not be JSON.
    pub fn from_body(status: u16, body: &str) -> Self {
        let payload = serde_json::from_str::<Value>(body)
            .unwrap_or_else(|_| serde_json::json!({ "message": body }));
        Self::new(status, payload)
    }
}

fn message_from_payload(payload: &Value) -> Option<String> {
    match payload {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("type"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}
