//! Inbound envelope handling for the controller task.

use pulse_common::CorrelationId;
use pulse_protocol::{
    CapabilitySet, Endpoint, Envelope, ErrorPayload, HelloPayload, InboundMessage, MessageKind,
    ReadyPayload, StatusPayload,
};
use tracing::{debug, info};

use super::actor::ControllerActor;
use crate::error::BridgeError;
use crate::events::BridgeEvent;
use crate::state::LifecycleEvent;

impl ControllerActor {
    /// Validate and route one message from the host window's inbox.
    pub(super) fn handle_inbound(&mut self, message: InboundMessage) {
        let Some(filter) = &self.filter else {
            debug!("No listener attached; dropping message");
            return;
        };
        if !filter.accepts(&message) {
            debug!(
                origin = %message.origin,
                source = %message.source,
                "Dropping message from unexpected window"
            );
            return;
        }
        let envelope = match Envelope::decode(&message.data) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "Dropping invalid envelope");
                return;
            }
        };
        if self.options.debug {
            debug!(envelope = %message.data, "[bridge <-]");
        }

        match envelope.message_kind() {
            Some(MessageKind::Hello) => self.on_hello(&envelope),
            Some(MessageKind::Ready) => self.on_ready(&envelope),
            Some(MessageKind::Status) => self.on_status(&envelope),
            Some(MessageKind::Error) => self.on_error(&envelope),
            Some(MessageKind::Pong) => self.on_pong(&envelope),
            Some(other) => debug!(kind = %other, "Ignoring command-kind envelope from player"),
            None => debug!(kind = %envelope.kind, "Ignoring unknown envelope kind"),
        }
    }

    fn on_hello(&mut self, envelope: &Envelope) {
        let hello: HelloPayload = envelope.payload_as().unwrap_or_default();
        info!(
            player_version = %hello.player_version,
            supports = ?hello.supports,
            "Player hello"
        );
        self.remote_caps = (!hello.supports.is_empty()).then(|| {
            CapabilitySet::commands().intersection(&CapabilitySet::from_names(&hello.supports))
        });

        let init = Envelope::with_payload(
            Endpoint::Bridge,
            MessageKind::Init,
            Some(CorrelationId::new()),
            &self.options.init,
        );
        self.post(&init);
    }

    fn on_ready(&mut self, envelope: &Envelope) {
        let ready: ReadyPayload = envelope.payload_as().unwrap_or_default();
        info!(player_version = %ready.player_version, "Player ready");

        self.apply(LifecycleEvent::Ready);
        self.complete_handshake();

        if let Some(id) = &envelope.id {
            if self.pending.contains(id) {
                let status = StatusPayload::from_value(&envelope.payload);
                self.settle_reply(id, Ok(status));
            }
        }
    }

    fn on_status(&mut self, envelope: &Envelope) {
        let status = StatusPayload::from_value(&envelope.payload);
        self.last_status = Some(status.clone());
        self.emit(BridgeEvent::Status(status.clone()));

        if let Some(id) = &envelope.id {
            if self.pending.contains(id) {
                self.settle_reply(id, Ok(status));
            }
        }
    }

    fn on_error(&mut self, envelope: &Envelope) {
        let payload: ErrorPayload = match envelope.payload_as() {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "Dropping malformed error payload");
                return;
            }
        };
        self.emit(BridgeEvent::Error(payload.clone()));

        if let Some(id) = &envelope.id {
            if self.pending.contains(id) {
                self.settle_reply(id, Err(BridgeError::Remote(payload)));
            }
        }
    }

    fn on_pong(&mut self, envelope: &Envelope) {
        if let Some(id) = &envelope.id {
            if self.pending.contains(id) {
                let status = StatusPayload::from_value(&envelope.payload);
                self.settle_reply(id, Ok(status));
            }
        }
    }
}
