use pulse_protocol::{ErrorCode, ErrorPayload, MessageKind};

/// Why a controller operation was rejected.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BridgeError {
    #[error("bad payload: {0}")]
    BadPayload(String),

    #[error("player does not support `{0}`")]
    Unsupported(MessageKind),

    #[error("player rejected command: {0}")]
    Remote(ErrorPayload),

    #[error("no ack for `{command}` within {timeout_ms} ms")]
    AckTimeout { command: MessageKind, timeout_ms: u64 },

    #[error("superseded by a newer present")]
    Cancelled,

    #[error("player did not become ready within {0} ms")]
    PlayerTimeout(u64),

    #[error("bridge destroyed")]
    Destroyed,

    #[error("bridge not initialized")]
    NotInitialized,

    #[error("bridge already initialized")]
    AlreadyInitialized,

    #[error("frame mount failed: {0}")]
    Mount(String),

    #[error("bridge task has stopped")]
    Closed,
}

impl BridgeError {
    /// The wire error code this rejection corresponds to.
    pub fn code(&self) -> ErrorCode {
        match self {
            BridgeError::BadPayload(_) | BridgeError::AlreadyInitialized => ErrorCode::BadPayload,
            BridgeError::Unsupported(_) => ErrorCode::UnknownCmd,
            BridgeError::Remote(payload) => payload.code,
            BridgeError::AckTimeout { .. } => ErrorCode::AckTimeout,
            BridgeError::Cancelled => ErrorCode::Cancelled,
            BridgeError::PlayerTimeout(_) | BridgeError::Mount(_) => ErrorCode::PlayerTimeout,
            BridgeError::Destroyed | BridgeError::NotInitialized | BridgeError::Closed => {
                ErrorCode::BridgeDestroyed
            }
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            BridgeError::Remote(payload) => payload.recoverable,
            BridgeError::AckTimeout { .. }
            | BridgeError::Cancelled
            | BridgeError::PlayerTimeout(_) => true,
            _ => false,
        }
    }
}
