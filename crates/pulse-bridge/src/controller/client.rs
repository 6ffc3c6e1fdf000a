//! Public handle for driving an embedded player.

use std::sync::Arc;
use std::time::Duration;

use pulse_config::PulseConfig;
use pulse_protocol::{
    ApplyThemePayload, InboundMessage, InitPayload, MessageKind, PresentPayload,
    SetPlacementPayload, ThemeTokens, TriggerPayload,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use super::actor::ControllerActor;
use super::types::ApiCommand;
use crate::error::BridgeError;
use crate::events::BridgeEvent;
use crate::frame::{FrameHost, FrameTarget};
use crate::pending::OperationResult;
use crate::state::ControllerState;

/// Controller tuning, usually built from [`PulseConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeOptions {
    pub host_origin: String,
    /// Expected player origin. `None` derives it from the frame `src`.
    pub player_origin: Option<String>,
    pub ack_timeout: Duration,
    pub handshake_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub compat_implicit_ack: bool,
    pub debug: bool,
    /// Sent to the player in reply to `hello`.
    pub init: InitPayload,
}

impl BridgeOptions {
    pub fn from_config(config: &PulseConfig) -> Self {
        let bridge = &config.bridge;
        let tokens = &config.init.tokens;
        let tokens = (!tokens.is_empty()).then(|| ThemeTokens {
            brand: tokens.brand.clone(),
            radius: tokens.radius,
            density: tokens.density,
        });
        Self {
            host_origin: bridge.host_origin.clone(),
            player_origin: bridge.explicit_player_origin().map(str::to_string),
            ack_timeout: bridge.ack_timeout(),
            handshake_timeout: bridge.handshake_timeout(),
            heartbeat_interval: bridge.heartbeat_interval(),
            compat_implicit_ack: bridge.compat_implicit_ack,
            debug: bridge.debug,
            init: InitPayload {
                placement: config.init.placement.clone(),
                density: config.init.density,
                tokens,
            },
        }
    }
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self::from_config(&PulseConfig::default())
    }
}

/// Handle to a running controller.
///
/// All methods talk to the background controller task; cloning the handle
/// is cheap and every clone drives the same frame. When the last handle is
/// dropped the controller tears itself down.
#[derive(Clone)]
pub struct Bridge {
    api_tx: mpsc::Sender<ApiCommand>,
    state_rx: watch::Receiver<ControllerState>,
    events: broadcast::Sender<BridgeEvent>,
}

impl Bridge {
    /// Start a controller task. `inbox` is the host window's message inbox.
    pub fn spawn(
        options: BridgeOptions,
        host: Arc<dyn FrameHost>,
        inbox: mpsc::UnboundedReceiver<InboundMessage>,
    ) -> Self {
        let (api_tx, api_rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(ControllerState::Unmounted);
        let (events, _) = broadcast::channel(256);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let actor = ControllerActor::new(options, host, state_tx, events.clone(), internal_tx);
        tokio::spawn(actor.run(api_rx, inbox, internal_rx));

        Self {
            api_tx,
            state_rx,
            events,
        }
    }

    /// Mount the frame and perform the handshake. Resolves on `ready`.
    pub async fn initialize(&self, target: FrameTarget) -> Result<(), BridgeError> {
        let (reply, rx) = oneshot::channel();
        self.api_tx
            .send(ApiCommand::Initialize { target, reply })
            .await
            .map_err(|_| BridgeError::Closed)?;
        rx.await.map_err(|_| BridgeError::Closed)?
    }

    /// Show a survey, superseding any outstanding `present`.
    pub async fn present(&self, survey_id: &str, force: bool) -> OperationResult {
        let survey_id = survey_id.trim();
        if survey_id.is_empty() {
            return Err(BridgeError::BadPayload("Missing surveyId".into()));
        }
        let payload = encode(&PresentPayload::new(survey_id, force))?;
        self.request(MessageKind::Present, payload, json!({ "surveyId": survey_id })).await
    }

    pub async fn dismiss(&self) -> OperationResult {
        self.request(MessageKind::Dismiss, json!({}), Value::Null).await
    }

    pub async fn apply_theme(&self, theme: ApplyThemePayload) -> OperationResult {
        let payload = encode(&theme)?;
        self.request(MessageKind::ApplyTheme, payload, Value::Null).await
    }

    pub async fn trigger(&self, command: &str, args: Vec<Value>) -> OperationResult {
        let payload = encode(&TriggerPayload {
            command: command.to_string(),
            args,
        })?;
        self.request(MessageKind::Trigger, payload, json!({ "command": command })).await
    }

    pub async fn set_placement(&self, placement: &str) -> OperationResult {
        let payload = encode(&SetPlacementPayload {
            placement: Some(placement.to_string()),
        })?;
        self.request(MessageKind::SetPlacement, payload, Value::Null).await
    }

    pub async fn set_tokens(&self, tokens: ThemeTokens) -> OperationResult {
        let payload = encode(&tokens)?;
        self.request(MessageKind::SetTokens, payload, Value::Null).await
    }

    pub async fn ping(&self) -> OperationResult {
        self.request(MessageKind::Ping, json!({}), Value::Null).await
    }

    /// Reject everything outstanding, stop the heartbeat and unmount the frame.
    pub async fn teardown(&self) {
        let (reply, rx) = oneshot::channel();
        if self
            .api_tx
            .send(ApiCommand::Teardown { reply })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    /// The latest state. Transitions between two reads are not seen here;
    /// [`Bridge::subscribe`] delivers every `StateChange`.
    pub fn state(&self) -> ControllerState {
        *self.state_rx.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    async fn request(
        &self,
        kind: MessageKind,
        payload: Value,
        metadata: Value,
    ) -> OperationResult {
        let (reply, rx) = oneshot::channel();
        self.api_tx
            .send(ApiCommand::Send {
                kind,
                payload,
                metadata,
                reply,
            })
            .await
            .map_err(|_| BridgeError::Closed)?;
        rx.await.map_err(|_| BridgeError::Closed)?
    }
}

fn encode<T: Serialize>(payload: &T) -> Result<Value, BridgeError> {
    serde_json::to_value(payload).map_err(|e| BridgeError::BadPayload(e.to_string()))
}
