//! The envelope codec.
//!
//! Receivers decode raw channel data with [`Envelope::decode`]. Anything that
//! is not an object, carries the wrong `v`, or has a malformed field comes
//! back as a [`DecodeError`]; callers drop those silently. The `type` field
//! is kept as a raw string so a responder can still answer an unrecognized
//! command with `unknown_cmd`.

use std::fmt;

use pulse_common::CorrelationId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version carried in the `v` field of every envelope.
pub const PROTOCOL_VERSION: u64 = 1;

/// Which side of the channel produced an envelope. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    Bridge,
    Player,
    #[serde(other)]
    Unknown,
}

/// Every message kind defined by protocol version 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    Hello,
    Init,
    Ready,
    Present,
    Dismiss,
    ApplyTheme,
    Trigger,
    SetPlacement,
    SetTokens,
    Ping,
    Pong,
    Status,
    Error,
}

impl MessageKind {
    pub const ALL: [MessageKind; 13] = [
        MessageKind::Hello,
        MessageKind::Init,
        MessageKind::Ready,
        MessageKind::Present,
        MessageKind::Dismiss,
        MessageKind::ApplyTheme,
        MessageKind::Trigger,
        MessageKind::SetPlacement,
        MessageKind::SetTokens,
        MessageKind::Ping,
        MessageKind::Pong,
        MessageKind::Status,
        MessageKind::Error,
    ];

    /// Commands the host may send after the handshake.
    pub const COMMANDS: [MessageKind; 7] = [
        MessageKind::Present,
        MessageKind::Dismiss,
        MessageKind::ApplyTheme,
        MessageKind::Trigger,
        MessageKind::SetPlacement,
        MessageKind::SetTokens,
        MessageKind::Ping,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Hello => "hello",
            MessageKind::Init => "init",
            MessageKind::Ready => "ready",
            MessageKind::Present => "present",
            MessageKind::Dismiss => "dismiss",
            MessageKind::ApplyTheme => "applyTheme",
            MessageKind::Trigger => "trigger",
            MessageKind::SetPlacement => "setPlacement",
            MessageKind::SetTokens => "setTokens",
            MessageKind::Ping => "ping",
            MessageKind::Pong => "pong",
            MessageKind::Status => "status",
            MessageKind::Error => "error",
        }
    }

    /// Look up a kind by its wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    pub fn is_command(&self) -> bool {
        Self::COMMANDS.contains(self)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why inbound channel data was not accepted as an envelope.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("not an object")]
    NotAnObject,

    #[error("unsupported protocol version: {0:?}")]
    VersionMismatch(Option<Value>),

    #[error("malformed envelope: {0}")]
    Malformed(String),

    #[error("malformed {kind} payload: {reason}")]
    Payload { kind: String, reason: String },
}

/// One structured message unit on the cross-window channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub v: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CorrelationId>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Endpoint>,
}

impl Envelope {
    /// Build an envelope for `kind` from `sender`.
    pub fn new(
        sender: Endpoint,
        kind: MessageKind,
        id: Option<CorrelationId>,
        payload: Value,
    ) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            id,
            kind: kind.as_str().to_string(),
            payload,
            origin: Some(sender),
        }
    }

    /// Build an envelope with a typed payload.
    pub fn with_payload<T: Serialize>(
        sender: Endpoint,
        kind: MessageKind,
        id: Option<CorrelationId>,
        payload: &T,
    ) -> Self {
        let payload = serde_json::to_value(payload).unwrap_or(Value::Null);
        Self::new(sender, kind, id, payload)
    }

    /// Decode raw channel data, enforcing the protocol version.
    pub fn decode(data: &Value) -> Result<Self, DecodeError> {
        let object = data.as_object().ok_or(DecodeError::NotAnObject)?;
        match object.get("v") {
            Some(v) if v.as_u64() == Some(PROTOCOL_VERSION) => {}
            other => return Err(DecodeError::VersionMismatch(other.cloned())),
        }
        serde_json::from_value(data.clone()).map_err(|e| DecodeError::Malformed(e.to_string()))
    }

    /// Serialize for posting on the channel.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// The recognized message kind, if any.
    pub fn message_kind(&self) -> Option<MessageKind> {
        MessageKind::parse(&self.kind)
    }

    /// Deserialize the payload. A missing payload decodes as `{}`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        let value = if self.payload.is_null() {
            Value::Object(Default::default())
        } else {
            self.payload.clone()
        };
        serde_json::from_value(value).map_err(|e| DecodeError::Payload {
            kind: self.kind.clone(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_accepts_version_one() {
        let env = Envelope::decode(&json!({
            "v": 1, "id": "abc", "type": "status", "payload": { "ok": true }, "origin": "player"
        }))
        .unwrap();
        assert_eq!(env.id.as_ref().map(|id| id.as_str()), Some("abc"));
        assert_eq!(env.message_kind(), Some(MessageKind::Status));
        assert_eq!(env.origin, Some(Endpoint::Player));
    }

    #[test]
    fn decode_rejects_wrong_or_missing_version() {
        let wrong = Envelope::decode(&json!({ "v": 2, "type": "status" }));
        assert!(matches!(wrong, Err(DecodeError::VersionMismatch(Some(_)))));

        let missing = Envelope::decode(&json!({ "type": "status" }));
        assert!(matches!(missing, Err(DecodeError::VersionMismatch(None))));

        let stringly = Envelope::decode(&json!({ "v": "1", "type": "status" }));
        assert!(matches!(stringly, Err(DecodeError::VersionMismatch(_))));
    }

    #[test]
    fn decode_rejects_non_objects_and_missing_type() {
        assert!(matches!(
            Envelope::decode(&json!("hello")),
            Err(DecodeError::NotAnObject)
        ));
        assert!(matches!(
            Envelope::decode(&json!({ "v": 1 })),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn unknown_kind_survives_decoding() {
        let env = Envelope::decode(&json!({ "v": 1, "id": "x1", "type": "explode" })).unwrap();
        assert_eq!(env.kind, "explode");
        assert_eq!(env.message_kind(), None);
    }

    #[test]
    fn unknown_origin_tag_is_tolerated() {
        let env = Envelope::decode(&json!({ "v": 1, "type": "ping", "origin": "devtools" })).unwrap();
        assert_eq!(env.origin, Some(Endpoint::Unknown));
    }

    #[test]
    fn encode_omits_empty_fields() {
        let env = Envelope::new(Endpoint::Bridge, MessageKind::Dismiss, None, Value::Null);
        let value = env.to_value();
        assert_eq!(value, json!({ "v": 1, "type": "dismiss", "origin": "bridge" }));
    }

    #[test]
    fn message_kind_wire_names() {
        assert_eq!(MessageKind::ApplyTheme.as_str(), "applyTheme");
        assert_eq!(MessageKind::parse("setPlacement"), Some(MessageKind::SetPlacement));
        assert_eq!(MessageKind::parse("apply-theme"), None);
        assert_eq!(
            serde_json::to_value(MessageKind::SetTokens).unwrap(),
            json!("setTokens")
        );
        for kind in MessageKind::ALL {
            assert_eq!(MessageKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn commands_exclude_handshake_and_replies() {
        assert!(MessageKind::Present.is_command());
        assert!(MessageKind::Ping.is_command());
        assert!(!MessageKind::Init.is_command());
        assert!(!MessageKind::Status.is_command());
        assert!(!MessageKind::Pong.is_command());
    }

    #[test]
    fn missing_payload_decodes_as_empty_object() {
        #[derive(Deserialize)]
        struct Empty {}
        let env = Envelope::decode(&json!({ "v": 1, "type": "dismiss" })).unwrap();
        assert!(env.payload_as::<Empty>().is_ok());
    }
}
