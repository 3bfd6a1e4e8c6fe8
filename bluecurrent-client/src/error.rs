//! Client error taxonomy

use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors surfaced by the socket session, the REST calls and the helpers
#[derive(Debug, Error)]
pub enum ClientError {
    /// Server rejected the credentials (`accepted` was falsy)
    #[error("Authentication failed: {}", describe(.0))]
    AuthenticationFailed(Map<String, Value>),

    /// An `ERROR` frame arrived while a response was awaited
    #[error("Server reported an error: {}", describe(.0))]
    Protocol(Map<String, Value>),

    /// Expected message kind not observed in time
    #[error("Timed out after {after:?} waiting for {kind}")]
    Timeout { kind: String, after: Duration },

    #[error("Client is not connected")]
    NotConnected,

    #[error("No bearer token, log in first")]
    NotAuthenticated,

    /// The receive loop stopped; the session must be re-established
    #[error("Connection lost: {0}")]
    Disconnected(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Inbound frame that is not a JSON object
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("{kind} response is missing field `{field}`")]
    MissingField { kind: String, field: String },

    #[error("Cannot parse `{value}` in key `{key}`: {source}")]
    DateFormat {
        key: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Credential encryption failed: {0}")]
    Encryption(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Human-readable cause reported by the server, e.g. `"forbidden"`
    pub fn message(&self) -> Option<&str> {
        match self {
            ClientError::AuthenticationFailed(payload) | ClientError::Protocol(payload) => {
                payload.get("message").and_then(Value::as_str)
            }
            _ => None,
        }
    }

    /// Payload of the server frame that caused the error
    pub fn payload(&self) -> Option<&Map<String, Value>> {
        match self {
            ClientError::AuthenticationFailed(payload) | ClientError::Protocol(payload) => {
                Some(payload)
            }
            _ => None,
        }
    }

    /// Whether retrying the whole operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }
}

fn describe(payload: &Map<String, Value>) -> String {
    match payload.get("message").and_then(Value::as_str) {
        Some(message) => message.to_string(),
        None => Value::Object(payload.clone()).to_string(),
    }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_protocol_error_message() {
        let err = ClientError::Protocol(payload(json!({
            "object": "ERROR",
            "message": "forbidden",
        })));

        assert_eq!(err.message(), Some("forbidden"));
        assert_eq!(err.to_string(), "Server reported an error: forbidden");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_authentication_error_without_message() {
        let err = ClientError::AuthenticationFailed(payload(json!({
            "object": "STATUS_PASSWORD",
            "accepted": false,
        })));

        assert_eq!(err.message(), None);
        assert!(err.to_string().contains("\"accepted\":false"));
        assert_eq!(err.payload().and_then(|p| p.get("accepted")), Some(&json!(false)));
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = ClientError::Timeout {
            kind: "HELLO".to_string(),
            after: Duration::from_secs(10),
        };

        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Timed out after 10s waiting for HELLO");
        assert!(!ClientError::NotConnected.is_retryable());
    }
}
