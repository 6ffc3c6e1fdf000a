//! The controller task: sole owner of lifecycle state, pending operations,
//! the presentation slot, the heartbeat and the frame.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pulse_common::CorrelationId;
use pulse_protocol::{
    CapabilitySet, Endpoint, Envelope, ErrorCode, ErrorPayload, InboundFilter, InboundMessage,
    MessageKind, StatusPayload,
};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::client::BridgeOptions;
use super::types::{ApiCommand, Internal, QueuedCommand};
use crate::error::BridgeError;
use crate::events::BridgeEvent;
use crate::frame::{derive_player_origin, FrameHandle, FrameHost, FrameTarget};
use crate::heartbeat::HeartbeatMonitor;
use crate::pending::{OperationResult, PendingOperation, PendingTable, PresentationSlot, Reply};
use crate::state::{reduce, ControllerState, Effect, LifecycleEvent};

struct Handshake {
    generation: u64,
    timer: JoinHandle<()>,
    waiter: Option<oneshot::Sender<Result<(), BridgeError>>>,
}

impl Handshake {
    fn finish(mut self, result: Result<(), BridgeError>) {
        self.timer.abort();
        if let Some(waiter) = self.waiter.take() {
            let _ = waiter.send(result);
        }
    }
}

pub(crate) struct ControllerActor {
    pub(super) options: BridgeOptions,
    host: Arc<dyn FrameHost>,
    state: ControllerState,
    state_tx: watch::Sender<ControllerState>,
    events: broadcast::Sender<BridgeEvent>,
    internal_tx: mpsc::UnboundedSender<Internal>,

    frame: Option<FrameHandle>,
    player_origin: Option<String>,
    pub(super) filter: Option<InboundFilter>,
    connected: bool,
    pub(super) remote_caps: Option<CapabilitySet>,

    pub(super) pending: PendingTable,
    queue: VecDeque<QueuedCommand>,
    slot: PresentationSlot,
    heartbeat: HeartbeatMonitor,
    pub(super) last_status: Option<StatusPayload>,

    handshake: Option<Handshake>,
    generation: u64,
    ready_announced: bool,
    torn_down: bool,
}

impl ControllerActor {
    pub(crate) fn new(
        options: BridgeOptions,
        host: Arc<dyn FrameHost>,
        state_tx: watch::Sender<ControllerState>,
        events: broadcast::Sender<BridgeEvent>,
        internal_tx: mpsc::UnboundedSender<Internal>,
    ) -> Self {
        Self {
            options,
            host,
            state: ControllerState::Unmounted,
            state_tx,
            events,
            internal_tx,
            frame: None,
            player_origin: None,
            filter: None,
            connected: false,
            remote_caps: None,
            pending: PendingTable::new(),
            queue: VecDeque::new(),
            slot: PresentationSlot::default(),
            heartbeat: HeartbeatMonitor::new(),
            last_status: None,
            handshake: None,
            generation: 0,
            ready_announced: false,
            torn_down: false,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut api_rx: mpsc::Receiver<ApiCommand>,
        mut inbox: mpsc::UnboundedReceiver<InboundMessage>,
        mut internal_rx: mpsc::UnboundedReceiver<Internal>,
    ) {
        loop {
            tokio::select! {
                command = api_rx.recv() => match command {
                    Some(command) => self.handle_api(command),
                    None => break,
                },
                Some(message) = inbox.recv() => self.handle_inbound(message),
                Some(internal) = internal_rx.recv() => self.handle_internal(internal),
            }
        }

        debug!("All bridge handles dropped; shutting down");
        self.teardown();
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    fn handle_api(&mut self, command: ApiCommand) {
        match command {
            ApiCommand::Initialize { target, reply } => {
                if let Err(e) = self.initialize(&target) {
                    warn!(error = %e, src = %target.src, "Bridge initialization failed");
                    let _ = reply.send(Err(e));
                    return;
                }
                self.generation += 1;
                let generation = self.generation;
                let timer = self.spawn_timer(
                    self.options.handshake_timeout,
                    Internal::HandshakeTimeout(generation),
                );
                self.handshake = Some(Handshake {
                    generation,
                    timer,
                    waiter: Some(reply),
                });
            }
            ApiCommand::Send {
                kind,
                payload,
                metadata,
                reply,
            } => {
                let op = PendingOperation::new(kind, Reply::Caller(reply), metadata);
                self.submit(kind, payload, op);
            }
            ApiCommand::Teardown { reply } => {
                self.teardown();
                let _ = reply.send(());
            }
        }
    }

    fn initialize(&mut self, target: &FrameTarget) -> Result<(), BridgeError> {
        if self.state != ControllerState::Unmounted {
            return Err(BridgeError::AlreadyInitialized);
        }
        let origin = match &self.options.player_origin {
            Some(origin) => origin.clone(),
            None => derive_player_origin(&target.src, &self.options.host_origin)?,
        };
        let frame = self.host.mount(target)?;
        info!(src = %frame.src, origin = %origin, "Player frame mounted");

        self.filter = Some(InboundFilter::new(origin.clone(), frame.window));
        self.player_origin = Some(origin);
        self.frame = Some(frame);
        self.torn_down = false;
        self.apply(LifecycleEvent::InitStart);
        Ok(())
    }

    fn teardown(&mut self) {
        if let Some(handshake) = self.handshake.take() {
            handshake.finish(Err(BridgeError::Destroyed));
        }
        self.apply(LifecycleEvent::Destroy);
        self.torn_down = true;
        self.connected = false;
        self.remote_caps = None;
        self.last_status = None;
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Accept a command: fail fast, queue until ready, or post it now.
    pub(super) fn submit(&mut self, kind: MessageKind, payload: Value, op: PendingOperation) {
        if self.state == ControllerState::Unmounted {
            let error = if self.torn_down {
                BridgeError::Destroyed
            } else {
                BridgeError::NotInitialized
            };
            debug!(kind = %kind, error = %error, "No frame mounted; rejecting command");
            op.settle(Err(error));
            return;
        }
        if !op.is_heartbeat() && !self.remote_supports(kind) {
            debug!(kind = %kind, "Rejecting command the player did not advertise");
            op.settle(Err(BridgeError::Unsupported(kind)));
            return;
        }
        if self.state == ControllerState::Error && !self.connected {
            let timeout_ms = millis(self.options.handshake_timeout);
            op.settle(Err(BridgeError::PlayerTimeout(timeout_ms)));
            return;
        }

        let id = CorrelationId::new();
        if kind == MessageKind::Present {
            self.supersede_presentation(id.clone());
        }
        self.pending.insert(id.clone(), op);

        if self.connected {
            self.dispatch(id, kind, payload);
        } else {
            debug!(kind = %kind, id = %id, "Player not ready; queueing command");
            self.queue.push_back(QueuedCommand { id, kind, payload });
        }
    }

    fn remote_supports(&self, kind: MessageKind) -> bool {
        self.remote_caps
            .as_ref()
            .map_or(true, |caps| caps.supports(kind))
    }

    /// Cancel the current presentation occupant and install `id`.
    fn supersede_presentation(&mut self, id: CorrelationId) {
        let Some(previous) = self.slot.occupy(id) else {
            return;
        };
        if let Some(op) = self.pending.remove(&previous) {
            debug!(id = %previous, "Cancelling superseded present");
            self.apply(LifecycleEvent::PresentCancelled {
                survey_id: op.survey_id(),
            });
            op.settle(Err(BridgeError::Cancelled));
        }
    }

    /// Post a registered command and arm its ack timer.
    fn dispatch(&mut self, id: CorrelationId, kind: MessageKind, payload: Value) {
        let Some(op) = self.pending.get_mut(&id) else {
            // Cancelled while queued.
            return;
        };
        let heartbeat = op.is_heartbeat();
        let survey_id = op.survey_id();

        if !heartbeat && !self.remote_supports(kind) {
            if let Some(op) = self.pending.remove(&id) {
                self.slot.release(&id);
                op.settle(Err(BridgeError::Unsupported(kind)));
            }
            return;
        }

        match kind {
            MessageKind::Present => self.apply(LifecycleEvent::PresentStart { survey_id }),
            MessageKind::Dismiss => self.apply(LifecycleEvent::DismissStart),
            _ => {}
        }

        self.post(&Envelope::new(Endpoint::Bridge, kind, Some(id.clone()), payload));
        let timer = self.spawn_timer(self.options.ack_timeout, Internal::AckTimeout(id.clone()));
        match self.pending.get_mut(&id) {
            Some(op) => op.arm(timer),
            None => timer.abort(),
        }
    }

    fn flush_queue(&mut self) {
        self.connected = true;
        if !self.queue.is_empty() {
            debug!(count = self.queue.len(), "Flushing queued commands");
        }
        while let Some(command) = self.queue.pop_front() {
            self.dispatch(command.id, command.kind, command.payload);
        }
    }

    fn reject_queued(&mut self) {
        let timeout_ms = millis(self.options.handshake_timeout);
        let queued: Vec<QueuedCommand> = self.queue.drain(..).collect();
        for command in queued {
            if let Some(op) = self.pending.remove(&command.id) {
                self.slot.release(&command.id);
                op.settle(Err(BridgeError::PlayerTimeout(timeout_ms)));
            }
        }
    }

    fn reject_all(&mut self) {
        self.queue.clear();
        self.slot.clear();
        let outstanding = self.pending.drain_all();
        if !outstanding.is_empty() {
            debug!(count = outstanding.len(), "Rejecting outstanding operations");
        }
        for (_, op) in outstanding {
            op.settle(Err(BridgeError::Destroyed));
        }
    }

    /// Settle a reply that matched a pending operation.
    pub(super) fn settle_reply(&mut self, id: &CorrelationId, result: OperationResult) {
        let Some(op) = self.pending.remove(id) else {
            debug!(id = %id, "Ignoring reply for unknown or settled id");
            return;
        };
        if op.is_heartbeat() {
            let ok = result.is_ok();
            op.settle(result);
            if ok {
                self.heartbeat.record_success();
                self.apply(LifecycleEvent::HeartbeatAck);
            } else {
                self.heartbeat_missed();
            }
            return;
        }
        self.finish(id, op, result, false);
    }

    /// Record the lifecycle outcome of an operation, then deliver it.
    fn finish(
        &mut self,
        id: &CorrelationId,
        op: PendingOperation,
        result: OperationResult,
        implicit: bool,
    ) {
        self.slot.release(id);
        let timed_out = matches!(result, Err(BridgeError::AckTimeout { .. }));
        let event = match (op.kind, result.is_ok()) {
            (MessageKind::Present, true) => Some(LifecycleEvent::PresentComplete {
                survey_id: op.survey_id(),
                implicit,
            }),
            (MessageKind::Present, false) => Some(LifecycleEvent::PresentFailed {
                survey_id: op.survey_id(),
                timeout: timed_out,
            }),
            (MessageKind::Dismiss, true) => Some(LifecycleEvent::DismissComplete { implicit }),
            (MessageKind::Dismiss, false) => {
                Some(LifecycleEvent::DismissFailed { timeout: timed_out })
            }
            (_, true) if !implicit => Some(LifecycleEvent::CommandAcked),
            (kind, false) if timed_out => Some(LifecycleEvent::CommandTimedOut {
                command: kind.as_str().to_string(),
            }),
            _ => None,
        };
        if let Some(event) = event {
            self.apply(event);
        }
        op.settle(result);
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::AckTimeout(id) => self.ack_timed_out(id),
            Internal::HandshakeTimeout(generation) => self.handshake_timed_out(generation),
            Internal::HeartbeatTick => {
                if self.connected {
                    let op = PendingOperation::new(MessageKind::Ping, Reply::Heartbeat, Value::Null);
                    self.submit(MessageKind::Ping, json!({}), op);
                }
            }
        }
    }

    fn ack_timed_out(&mut self, id: CorrelationId) {
        let Some(op) = self.pending.remove(&id) else {
            return;
        };
        if op.is_heartbeat() {
            op.settle(Err(BridgeError::AckTimeout {
                command: MessageKind::Ping,
                timeout_ms: millis(self.options.ack_timeout),
            }));
            self.heartbeat_missed();
            return;
        }

        let command = op.kind;
        if self.options.compat_implicit_ack {
            if let Some(status) = self.last_status.clone() {
                warn!(command = %command, id = %id, "Ack missing; resolved via last status");
                let warning = ErrorPayload::new(
                    ErrorCode::ImplicitAck,
                    "Ack missing; resolved via status payload",
                    true,
                )
                .with_hint(command.as_str());
                self.emit(BridgeEvent::Error(warning));
                self.finish(&id, op, Ok(status), true);
                return;
            }
        }

        warn!(command = %command, id = %id, "Ack timeout");
        let error = BridgeError::AckTimeout {
            command,
            timeout_ms: millis(self.options.ack_timeout),
        };
        self.finish(&id, op, Err(error), false);
    }

    fn handshake_timed_out(&mut self, generation: u64) {
        if self.handshake.as_ref().map(|h| h.generation) != Some(generation) {
            return;
        }
        let Some(handshake) = self.handshake.take() else {
            return;
        };
        let timeout_ms = millis(self.options.handshake_timeout);
        warn!(timeout_ms, "Player did not become ready");
        self.apply(LifecycleEvent::HandshakeTimeout);
        handshake.finish(Err(BridgeError::PlayerTimeout(timeout_ms)));
    }

    fn heartbeat_missed(&mut self) {
        let misses = self.heartbeat.record_miss();
        warn!(misses, "Heartbeat missed");
        self.apply(LifecycleEvent::HeartbeatMissed { misses });
    }

    fn spawn_timer(&self, after: Duration, message: Internal) -> JoinHandle<()> {
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(message);
        })
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Run the reducer and carry out whatever it asks for.
    pub(super) fn apply(&mut self, event: LifecycleEvent) {
        let transition = reduce(self.state, &event, Utc::now());
        if let Some(change) = transition.change {
            info!(
                prev = %change.prev,
                next = %change.next,
                reason = %change.reason,
                "Bridge state change"
            );
            self.state = change.next;
            self.state_tx.send_replace(change.next);
            self.emit(BridgeEvent::StateChange(change));
        }
        for effect in transition.effects {
            self.run_effect(effect);
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::StartHeartbeat => self.heartbeat.start(
                self.options.heartbeat_interval,
                self.internal_tx.clone(),
                Internal::HeartbeatTick,
            ),
            Effect::StopHeartbeat => self.heartbeat.stop(),
            Effect::FlushQueue => self.flush_queue(),
            Effect::RejectQueued => self.reject_queued(),
            Effect::RejectAll => self.reject_all(),
            Effect::DetachListener => self.filter = None,
            Effect::UnmountFrame => {
                if let Some(frame) = self.frame.take() {
                    info!(src = %frame.src, "Unmounting player frame");
                    self.host.unmount(&frame);
                }
                self.player_origin = None;
            }
            Effect::AnnounceReady => {
                if !self.ready_announced {
                    self.ready_announced = true;
                    self.emit(BridgeEvent::Ready);
                }
                self.emit(BridgeEvent::Status(StatusPayload::event("player-ready")));
            }
            Effect::AnnounceInactive => {
                self.emit(BridgeEvent::Error(ErrorPayload::new(
                    ErrorCode::HeartbeatTimeout,
                    "No heartbeat reply from player",
                    true,
                )));
                self.emit(BridgeEvent::Status(
                    StatusPayload::failure("player-inactive").with("heartbeat", false),
                ));
            }
            Effect::EmitClose => self.emit(BridgeEvent::Close),
        }
    }

    /// Resolve the pending handshake, if any, after `ready`.
    pub(super) fn complete_handshake(&mut self) {
        if let Some(handshake) = self.handshake.take() {
            handshake.finish(Ok(()));
        }
    }

    pub(super) fn emit(&self, event: BridgeEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub(super) fn post(&self, envelope: &Envelope) {
        let (Some(frame), Some(origin)) = (&self.frame, &self.player_origin) else {
            debug!(kind = %envelope.kind, "No frame mounted; dropping envelope");
            return;
        };
        let data = envelope.to_value();
        if self.options.debug {
            debug!(envelope = %data, "[bridge ->]");
        }
        if let Err(e) = frame.port.post_message(data, origin) {
            warn!(error = %e, kind = %envelope.kind, "Failed to post envelope");
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
