//! Error codes and the `error` envelope payload.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of error codes. Codes are stable wire identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadPayload,
    UnknownCmd,
    PresentFail,
    GenFail,
    AckTimeout,
    Cancelled,
    ImplicitAck,
    HeartbeatTimeout,
    PlayerTimeout,
    BridgeDestroyed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadPayload => "bad_payload",
            ErrorCode::UnknownCmd => "unknown_cmd",
            ErrorCode::PresentFail => "present_fail",
            ErrorCode::GenFail => "gen_fail",
            ErrorCode::AckTimeout => "ack_timeout",
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::ImplicitAck => "implicit_ack",
            ErrorCode::HeartbeatTimeout => "heartbeat_timeout",
            ErrorCode::PlayerTimeout => "player_timeout",
            ErrorCode::BridgeDestroyed => "bridge_destroyed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of an `error` envelope, also used for observer error events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub recoverable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorPayload {
    pub fn new(code: ErrorCode, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            code,
            message: message.into(),
            recoverable,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn codes_serialize_snake_case() {
        assert_eq!(
            serde_json::to_value(ErrorCode::HeartbeatTimeout).unwrap(),
            json!("heartbeat_timeout")
        );
        let code: ErrorCode = serde_json::from_value(json!("bridge_destroyed")).unwrap();
        assert_eq!(code, ErrorCode::BridgeDestroyed);
        assert_eq!(ErrorCode::UnknownCmd.to_string(), "unknown_cmd");
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert!(serde_json::from_value::<ErrorCode>(json!("kaboom")).is_err());
    }

    #[test]
    fn payload_defaults_optional_fields() {
        let payload: ErrorPayload =
            serde_json::from_value(json!({ "code": "present_fail" })).unwrap();
        assert_eq!(payload.code, ErrorCode::PresentFail);
        assert_eq!(payload.message, "");
        assert!(!payload.recoverable);
        assert!(payload.hint.is_none());
    }

    #[test]
    fn payload_serializes_hint_only_when_set() {
        let plain = ErrorPayload::new(ErrorCode::BadPayload, "Missing surveyId", false);
        assert_eq!(
            serde_json::to_value(&plain).unwrap(),
            json!({ "code": "bad_payload", "message": "Missing surveyId", "recoverable": false })
        );

        let hinted = ErrorPayload::new(ErrorCode::GenFail, "load failed", true)
            .with_hint("Verify theme asset and CSS payload");
        let value = serde_json::to_value(&hinted).unwrap();
        assert_eq!(value["hint"], "Verify theme asset and CSS payload");
    }

    #[test]
    fn display_includes_message() {
        let payload = ErrorPayload::new(ErrorCode::PresentFail, "boom", true);
        assert_eq!(payload.to_string(), "present_fail: boom");
        let bare = ErrorPayload::new(ErrorCode::Cancelled, "", false);
        assert_eq!(bare.to_string(), "cancelled");
    }
}
