use pulse_protocol::{ErrorPayload, StatusPayload};
use serde::{Deserialize, Serialize};

use crate::state::StateChange;

/// Everything an observer can see from a controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum BridgeEvent {
    StateChange(StateChange),
    /// The player became ready. Emitted once per controller lifetime.
    Ready,
    Status(StatusPayload),
    Error(ErrorPayload),
    Close,
}

impl BridgeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BridgeEvent::StateChange(_) => "statechange",
            BridgeEvent::Ready => "ready",
            BridgeEvent::Status(_) => "status",
            BridgeEvent::Error(_) => "error",
            BridgeEvent::Close => "close",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_protocol::ErrorCode;
    use serde_json::json;

    #[test]
    fn serializes_tagged() {
        let event = BridgeEvent::Status(StatusPayload::event("player-ready"));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "status", "data": { "ok": true, "event": "player-ready" } })
        );
        assert_eq!(
            serde_json::to_value(BridgeEvent::Close).unwrap(),
            json!({ "type": "close" })
        );
    }

    #[test]
    fn names() {
        let err = BridgeEvent::Error(ErrorPayload::new(ErrorCode::ImplicitAck, "", true));
        assert_eq!(err.name(), "error");
        assert_eq!(BridgeEvent::Ready.name(), "ready");
    }
}
