//! Messages exchanged between the public handle, timers and the controller task.

use pulse_common::CorrelationId;
use pulse_protocol::MessageKind;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::BridgeError;
use crate::frame::FrameTarget;
use crate::pending::OperationResult;

/// Requests from [`super::Bridge`] to the controller task.
#[derive(Debug)]
pub(crate) enum ApiCommand {
    Initialize {
        target: FrameTarget,
        reply: oneshot::Sender<Result<(), BridgeError>>,
    },
    Send {
        kind: MessageKind,
        payload: Value,
        metadata: Value,
        reply: oneshot::Sender<OperationResult>,
    },
    Teardown {
        reply: oneshot::Sender<()>,
    },
}

/// Timer and heartbeat wakeups, fed back into the controller task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Internal {
    AckTimeout(CorrelationId),
    /// Carries the handshake generation so stale timers are ignored.
    HandshakeTimeout(u64),
    HeartbeatTick,
}

/// A command accepted before the handshake completed.
#[derive(Debug)]
pub(crate) struct QueuedCommand {
    pub(crate) id: CorrelationId,
    pub(crate) kind: MessageKind,
    pub(crate) payload: Value,
}
