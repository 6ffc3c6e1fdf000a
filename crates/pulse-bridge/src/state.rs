//! Controller lifecycle: states, transition records and the reducer.
//!
//! [`reduce`] is the single source of truth for how the controller moves
//! between states. It is pure: given the current state, a lifecycle event and
//! a timestamp it returns the transition record (if any) and the side effects
//! the owning task must carry out.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControllerState {
    #[default]
    Unmounted,
    Booting,
    Idle,
    Presenting,
    Dismissing,
    Error,
}

impl ControllerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerState::Unmounted => "UNMOUNTED",
            ControllerState::Booting => "BOOTING",
            ControllerState::Idle => "IDLE",
            ControllerState::Presenting => "PRESENTING",
            ControllerState::Dismissing => "DISMISSING",
            ControllerState::Error => "ERROR",
        }
    }

    /// True once the handshake has finished, successfully or not.
    pub fn is_mounted(&self) -> bool {
        !matches!(self, ControllerState::Unmounted | ControllerState::Booting)
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub prev: ControllerState,
    pub next: ControllerState,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub ts: DateTime<Utc>,
}

/// Inputs to the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    InitStart,
    HandshakeTimeout,
    Ready,
    PresentStart { survey_id: String },
    PresentCancelled { survey_id: String },
    PresentComplete { survey_id: String, implicit: bool },
    PresentFailed { survey_id: String, timeout: bool },
    DismissStart,
    DismissComplete { implicit: bool },
    DismissFailed { timeout: bool },
    /// Any other command (or user ping) got a real reply.
    CommandAcked,
    /// Any other command timed out without an implicit ack.
    CommandTimedOut { command: String },
    HeartbeatAck,
    HeartbeatMissed { misses: u32 },
    Destroy,
}

/// Side effects requested by the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    StartHeartbeat,
    StopHeartbeat,
    /// Mark the channel connected and post queued commands in order.
    FlushQueue,
    /// Reject commands still waiting for the handshake with `player_timeout`.
    RejectQueued,
    /// Reject every queued and in-flight command with `bridge_destroyed`.
    RejectAll,
    DetachListener,
    UnmountFrame,
    /// Broadcast `player-ready` and, the first time only, the `ready` event.
    AnnounceReady,
    /// Broadcast `heartbeat_timeout` and `player-inactive`.
    AnnounceInactive,
    EmitClose,
}

/// Result of one reducer step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    pub change: Option<StateChange>,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn none() -> Self {
        Self::default()
    }

    fn to(
        prev: ControllerState,
        next: ControllerState,
        reason: &str,
        data: Option<Value>,
        ts: DateTime<Utc>,
    ) -> Self {
        Self {
            change: Some(StateChange {
                prev,
                next,
                reason: reason.to_string(),
                data,
                ts,
            }),
            effects: Vec::new(),
        }
    }

    fn with(mut self, effects: &[Effect]) -> Self {
        self.effects.extend_from_slice(effects);
        self
    }
}

/// Compute the transition for `event` in `state`.
pub fn reduce(state: ControllerState, event: &LifecycleEvent, ts: DateTime<Utc>) -> Transition {
    use ControllerState as S;
    use LifecycleEvent as E;

    let mounted = state.is_mounted();
    let recover = |ts| {
        if state == S::Error {
            Transition::to(state, S::Idle, "recovered", None, ts)
        } else {
            Transition::none()
        }
    };

    match event {
        E::InitStart if state == S::Unmounted => {
            Transition::to(state, S::Booting, "init-start", None, ts)
        }
        E::InitStart => Transition::none(),

        E::HandshakeTimeout if state == S::Booting => {
            Transition::to(state, S::Error, "player-timeout", None, ts).with(&[Effect::RejectQueued])
        }
        E::HandshakeTimeout => Transition::none(),

        E::Ready if state == S::Unmounted => Transition::none(),
        E::Ready => Transition::to(state, S::Idle, "ready", None, ts).with(&[
            Effect::StartHeartbeat,
            Effect::AnnounceReady,
            Effect::FlushQueue,
        ]),

        E::PresentStart { survey_id } if mounted => Transition::to(
            state,
            S::Presenting,
            "present-start",
            Some(json!({ "surveyId": survey_id })),
            ts,
        ),
        E::PresentCancelled { survey_id } if state == S::Presenting => Transition::to(
            state,
            S::Idle,
            "present-cancelled",
            Some(json!({ "surveyId": survey_id })),
            ts,
        ),
        E::PresentComplete {
            survey_id,
            implicit,
        } if matches!(state, S::Presenting | S::Error) => {
            let reason = if *implicit {
                "implicit-ack"
            } else {
                "present-complete"
            };
            Transition::to(
                state,
                S::Idle,
                reason,
                Some(json!({ "surveyId": survey_id })),
                ts,
            )
        }
        E::PresentFailed { survey_id, timeout } if mounted => {
            let (reason, data) = if *timeout {
                ("ack-timeout", json!({ "command": "present", "surveyId": survey_id }))
            } else {
                ("present-failed", json!({ "surveyId": survey_id }))
            };
            Transition::to(state, S::Error, reason, Some(data), ts)
        }

        E::DismissStart if mounted => {
            Transition::to(state, S::Dismissing, "dismiss-start", None, ts)
        }
        E::DismissComplete { implicit } if matches!(state, S::Dismissing | S::Error) => {
            let reason = if *implicit {
                "implicit-ack"
            } else {
                "dismiss-complete"
            };
            Transition::to(state, S::Idle, reason, None, ts)
        }
        E::DismissFailed { timeout } if mounted => {
            let (reason, data) = if *timeout {
                ("ack-timeout", Some(json!({ "command": "dismiss" })))
            } else {
                ("dismiss-failed", None)
            };
            Transition::to(state, S::Error, reason, data, ts)
        }

        E::CommandAcked | E::HeartbeatAck => recover(ts),
        E::CommandTimedOut { command } if mounted => Transition::to(
            state,
            S::Error,
            "ack-timeout",
            Some(json!({ "command": command })),
            ts,
        ),

        E::HeartbeatMissed { misses } if mounted && *misses == 2 => Transition::to(
            state,
            S::Idle,
            "heartbeat-missed-2",
            Some(json!({ "misses": misses })),
            ts,
        )
        .with(&[Effect::AnnounceInactive]),

        E::Destroy if state == S::Unmounted => Transition::none().with(&[Effect::RejectAll]),
        E::Destroy => Transition::to(state, S::Unmounted, "destroy", None, ts).with(&[
            Effect::StopHeartbeat,
            Effect::RejectAll,
            Effect::DetachListener,
            Effect::UnmountFrame,
            Effect::EmitClose,
        ]),

        _ => Transition::none(),
    }
}
