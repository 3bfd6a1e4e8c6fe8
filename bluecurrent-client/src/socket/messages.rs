//! Socket framing
//!
//! One JSON object per frame, no batching:
//! - outbound: `{"command": NAME, ...fields, "flow_id"?, "Authorization"?}`
//! - inbound: `{"object": KIND, ...fields}`, errors use `{"object": "ERROR", "message": ...}`

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{ClientError, Result};

/// Routing tag of inbound frames
pub const KIND_KEY: &str = "object";

/// Sentinel kind of error frames
pub const ERROR_KIND: &str = "ERROR";

/// Command names
pub mod command {
    pub const VALIDATE_PASSWORD: &str = "VALIDATE_PASSWORD";
    pub const HELLO: &str = "HELLO";
    pub const GET_ACCOUNT: &str = "GET_ACCOUNT";
    pub const GET_CHARGE_CARDS: &str = "GET_CHARGE_CARDS";
    pub const GET_CHARGE_POINTS: &str = "GET_CHARGE_POINTS";
    pub const GET_CH_SETTINGS: &str = "GET_CH_SETTINGS";
    pub const GET_GRID_STATUS: &str = "GET_GRID_STATUS";
    pub const GET_SESSIONS: &str = "GET_SESSIONS";
    pub const GET_STATUS: &str = "GET_STATUS";
    pub const GET_SUSTAINABILITY_STATUS: &str = "GET_SUSTAINABILITY_STATUS";
    pub const SET_OPERATIVE: &str = "SET_OPERATIVE";
    pub const SET_INOPERATIVE: &str = "SET_INOPERATIVE";
    pub const UNLOCK_CONNECTOR: &str = "UNLOCK_CONNECTOR";
    pub const SOFT_RESET: &str = "SOFT_RESET";
}

/// Inbound message kinds
pub mod kind {
    pub const STATUS_PASSWORD: &str = "STATUS_PASSWORD";
    pub const HELLO: &str = "HELLO";
    pub const ACCOUNT: &str = "ACCOUNT";
    pub const CHARGE_CARDS: &str = "CHARGE_CARDS";
    pub const CHARGE_POINTS: &str = "CHARGE_POINTS";
    pub const CH_SETTINGS: &str = "CH_SETTINGS";
    pub const GRID_STATUS: &str = "GRID_STATUS";
    pub const SESSIONS: &str = "SESSIONS";
    pub const STATUS: &str = "STATUS";
    pub const SUSTAINABILITY_STATUS: &str = "SUSTAINABILITY_STATUS";
}

/// Kind of the acknowledgment for a state-changing command
pub fn received_kind(command: &str) -> String {
    format!("RECEIVED_{}", command)
}

/// Kind of the terminal status for a state-changing command
pub fn status_kind(command: &str) -> String {
    format!("STATUS_{}", command)
}

/// Outbound command envelope
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    fields: Map<String, Value>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Map::new(),
        }
    }

    /// Add a field to the envelope
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Attach a freshly minted flow id
    pub fn with_flow_id(self) -> Self {
        self.with("flow_id", Uuid::new_v4().to_string())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Serialize to a single text frame, merging the bearer token when given
    pub fn to_frame(&self, token: Option<&str>) -> Result<String> {
        let mut body = self.fields.clone();
        body.insert("command".to_string(), Value::String(self.name.clone()));
        if let Some(token) = token {
            body.insert(
                "Authorization".to_string(),
                Value::String(format!("Token {}", token)),
            );
        }
        Ok(serde_json::to_string(&Value::Object(body))?)
    }
}

/// Inbound message: an opaque JSON object routed by its `object` tag
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage(Map<String, Value>);

impl InboundMessage {
    /// Decode a text frame; anything but a JSON object is malformed
    pub fn from_frame(frame: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(frame) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(ClientError::MalformedFrame(format!(
                "expected a JSON object, got {}",
                other
            ))),
            Err(e) => Err(ClientError::MalformedFrame(e.to_string())),
        }
    }

    pub fn kind(&self) -> Option<&str> {
        self.0.get(KIND_KEY).and_then(Value::as_str)
    }

    pub fn is_error(&self) -> bool {
        self.kind() == Some(ERROR_KIND)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// `accepted` under truthiness rules: missing, null, false, 0 and "" are falsy
    pub fn is_accepted(&self) -> bool {
        match self.0.get("accepted") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map_or(false, |n| n != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
        }
    }

    /// Remove and return a field, failing when the server left it out
    pub fn take(&mut self, field: &str) -> Result<Value> {
        let kind = self.kind().unwrap_or_default().to_string();
        self.0.remove(field).ok_or(ClientError::MissingField {
            kind,
            field: field.to_string(),
        })
    }

    /// The payload without its routing tag
    pub fn without_kind(mut self) -> Map<String, Value> {
        self.0.remove(KIND_KEY);
        self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for InboundMessage {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<InboundMessage> for Value {
    fn from(message: InboundMessage) -> Self {
        Value::Object(message.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame_value(frame: &str) -> Value {
        serde_json::from_str(frame).unwrap()
    }

    #[test]
    fn test_command_frame_with_token() {
        let frame = Command::new(command::GET_CH_SETTINGS)
            .with("evse_id", "BCU123456")
            .to_frame(Some("abc"))
            .unwrap();

        assert_eq!(
            frame_value(&frame),
            json!({
                "command": "GET_CH_SETTINGS",
                "evse_id": "BCU123456",
                "Authorization": "Token abc",
            })
        );
    }

    #[test]
    fn test_command_frame_without_token() {
        let frame = Command::new(command::HELLO).to_frame(None).unwrap();
        assert_eq!(frame_value(&frame), json!({"command": "HELLO"}));
    }

    #[test]
    fn test_flow_ids_are_fresh() {
        let a = Command::new(command::SOFT_RESET).with_flow_id();
        let b = Command::new(command::SOFT_RESET).with_flow_id();

        let a = a.field("flow_id").and_then(Value::as_str).unwrap().to_string();
        let b = b.field("flow_id").and_then(Value::as_str).unwrap().to_string();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_state_change_kinds() {
        assert_eq!(received_kind(command::SET_OPERATIVE), "RECEIVED_SET_OPERATIVE");
        assert_eq!(status_kind(command::UNLOCK_CONNECTOR), "STATUS_UNLOCK_CONNECTOR");
    }

    #[test]
    fn test_inbound_kind_and_error() {
        let msg = InboundMessage::from_frame(r#"{"object": "ERROR", "message": "forbidden"}"#).unwrap();
        assert_eq!(msg.kind(), Some("ERROR"));
        assert!(msg.is_error());

        let msg = InboundMessage::from_frame(r#"{"data": []}"#).unwrap();
        assert_eq!(msg.kind(), None);
        assert!(!msg.is_error());
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(
            InboundMessage::from_frame("not json"),
            Err(ClientError::MalformedFrame(_))
        ));
        assert!(matches!(
            InboundMessage::from_frame("[1, 2, 3]"),
            Err(ClientError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_accepted_truthiness() {
        let accepted = |body: &str| InboundMessage::from_frame(body).unwrap().is_accepted();

        assert!(accepted(r#"{"accepted": true}"#));
        assert!(accepted(r#"{"accepted": 1}"#));
        assert!(!accepted(r#"{"accepted": false}"#));
        assert!(!accepted(r#"{"accepted": null}"#));
        assert!(!accepted(r#"{"accepted": ""}"#));
        assert!(!accepted(r#"{}"#));
    }

    #[test]
    fn test_take_and_strip() {
        let mut msg = InboundMessage::from_frame(
            r#"{"object": "CHARGE_POINTS", "data": [{"evse_id": "BCU1"}]}"#,
        )
        .unwrap();

        assert_eq!(msg.take("data").unwrap(), json!([{"evse_id": "BCU1"}]));
        match msg.take("data") {
            Err(ClientError::MissingField { kind, field }) => {
                assert_eq!(kind, "CHARGE_POINTS");
                assert_eq!(field, "data");
            }
            other => panic!("unexpected {:?}", other),
        }

        let stripped = InboundMessage::from_frame(r#"{"object": "X", "trees": 1}"#)
            .unwrap()
            .without_kind();
        assert_eq!(Value::Object(stripped), json!({"trees": 1}));
    }
}
