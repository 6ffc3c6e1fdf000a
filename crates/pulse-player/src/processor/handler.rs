//! Inbound command handling for the player task.

use std::sync::Arc;

use pulse_common::CorrelationId;
use pulse_protocol::{
    ApplyThemePayload, Envelope, ErrorCode, ErrorPayload, InboundMessage, InitPayload,
    MessageKind, Placement, PresentPayload, SetPlacementPayload, StatusPayload, ThemeTokens,
    TriggerPayload,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::actor::PlayerActor;
use super::types::{Internal, PresentRequest};
use crate::tracker::WIDGET_CONTAINER_ID;
use crate::widget::{StyleHost, WidgetError};

const DISMISS_HINT: &str = "Widget may not be mounted";
const THEME_HINT: &str = "Verify theme asset and CSS payload";
const PRESENT_HINT: &str = "Check survey configuration";

impl PlayerActor {
    /// Validate and route one message from the player window's inbox.
    pub(super) fn handle_inbound(&mut self, message: InboundMessage) {
        if !self.filter.accepts(&message) {
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
            debug!(envelope = %message.data, "[player <-]");
        }

        match envelope.message_kind() {
            Some(MessageKind::Init) => self.on_init(&envelope),
            Some(kind) if kind.is_command() && self.options.capabilities.supports(kind) => {
                let Some(id) = envelope.id.clone() else {
                    debug!(kind = %kind, "Ignoring command without correlation id");
                    return;
                };
                self.dispatch(kind, id, &envelope);
            }
            _ => self.reject_unsupported(&envelope),
        }
    }

    fn dispatch(&mut self, kind: MessageKind, id: CorrelationId, envelope: &Envelope) {
        match kind {
            MessageKind::Present => self.on_present(id, envelope),
            MessageKind::Dismiss => self.on_dismiss(id),
            MessageKind::ApplyTheme => self.on_apply_theme(id, envelope),
            MessageKind::Trigger => self.on_trigger(id, envelope),
            MessageKind::SetPlacement => self.on_set_placement(id, envelope),
            MessageKind::SetTokens => self.on_set_tokens(id, envelope),
            MessageKind::Ping => self.on_ping(id),
            _ => self.reject_unsupported(envelope),
        }
    }

    fn reject_unsupported(&self, envelope: &Envelope) {
        match &envelope.id {
            Some(id) => self.reply_error(
                id,
                ErrorPayload::new(
                    ErrorCode::UnknownCmd,
                    format!("Unsupported command \"{}\"", envelope.kind),
                    false,
                ),
            ),
            None => debug!(kind = %envelope.kind, "Ignoring unsupported message"),
        }
    }

    // -----------------------------------------------------------------------
    // Handshake
    // -----------------------------------------------------------------------

    fn on_init(&mut self, envelope: &Envelope) {
        let init: InitPayload = envelope.payload_as().unwrap_or_default();
        if let Some(placement) = init.placement.as_deref().and_then(Placement::parse) {
            self.tracker.set_placement(placement);
        }
        if let Some(density) = init.density {
            self.merge_tokens(&ThemeTokens {
                density: Some(density),
                ..Default::default()
            });
        }
        if let Some(tokens) = &init.tokens {
            self.merge_tokens(tokens);
        }
        info!(placement = %self.tracker.placement(), "Init applied");

        if let Some(id) = &envelope.id {
            let ack = StatusPayload::event("init-applied")
                .with("capabilities", self.options.capabilities.names())
                .with_placement(self.tracker.placement());
            self.reply_status(id, ack);
            self.pending_ready_id = Some(id.clone());
        }
        self.announce_ready();
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn on_present(&mut self, id: CorrelationId, envelope: &Envelope) {
        let payload: PresentPayload = envelope.payload_as().unwrap_or_default();
        let Some(survey_id) = payload.survey_id() else {
            let message = match &payload.survey_id {
                None | Some(Value::Null) | Some(Value::Bool(false)) => "Missing surveyId",
                Some(Value::String(s)) if s.is_empty() => "Missing surveyId",
                Some(_) => "Empty surveyId",
            };
            self.reply_error(&id, ErrorPayload::new(ErrorCode::BadPayload, message, false));
            return;
        };

        let request = PresentRequest {
            ack_id: id,
            survey_id,
            force: payload.force,
        };
        if self.widget_ready() {
            self.execute_presents(vec![request]);
        } else {
            self.queue_present(request);
        }
    }

    /// Ack once the widget is visible or the adaptive wait runs out.
    pub(super) fn on_presented(
        &mut self,
        request: PresentRequest,
        result: Result<(), WidgetError>,
    ) {
        let PresentRequest {
            ack_id,
            survey_id,
            force,
        } = request;
        match result {
            Ok(()) => {
                info!(survey_id = %survey_id, force, "Present called");
                self.settle_present_later(ack_id, survey_id);
            }
            Err(e) => {
                let error = ErrorPayload::new(ErrorCode::PresentFail, e.to_string(), true)
                    .with_hint(PRESENT_HINT);
                self.reply_error(&ack_id, error);
            }
        }
    }

    fn on_dismiss(&mut self, id: CorrelationId) {
        let widget = Arc::clone(&self.widget);
        self.spawn_effect(async move {
            let result = widget.dismiss().await;
            Internal::Dismissed { ack_id: id, result }
        });
    }

    pub(super) fn on_dismissed(&mut self, id: CorrelationId, result: Result<(), WidgetError>) {
        let dismissed = match result {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Widget dismiss failed; hiding the container");
                self.hide_container()
            }
        };
        if !dismissed {
            let error = ErrorPayload::new(ErrorCode::PresentFail, "Unable to dismiss survey", true)
                .with_hint(DISMISS_HINT);
            self.reply_error(&id, error);
            return;
        }

        self.remeasure();
        let status = StatusPayload::event("dismiss-called").with_geometry(&self.tracker.snapshot());
        self.reply_status(&id, status.clone());
        self.broadcast(status);
    }

    fn hide_container(&self) -> bool {
        self.document
            .element_by_id(WIDGET_CONTAINER_ID)
            .is_some_and(|container| self.document.hide(container))
    }

    /// Tokens merge right away; stylesheet and inline CSS load off-task.
    fn on_apply_theme(&mut self, id: CorrelationId, envelope: &Envelope) {
        let theme: ApplyThemePayload = match envelope.payload_as() {
            Ok(theme) => theme,
            Err(e) => {
                let error = ErrorPayload::new(ErrorCode::BadPayload, e.to_string(), true);
                self.reply_error(&id, error);
                return;
            }
        };

        if let Some(tokens) = &theme.tokens {
            self.merge_tokens(tokens);
        }
        let styles = Arc::clone(&self.styles);
        self.spawn_effect(async move {
            let result = load_theme(styles.as_ref(), theme.href, theme.css).await;
            Internal::ThemeApplied { ack_id: id, result }
        });
    }

    pub(super) fn on_theme_applied(&mut self, id: CorrelationId, result: Result<(), WidgetError>) {
        if let Err(e) = result {
            let error =
                ErrorPayload::new(ErrorCode::GenFail, e.to_string(), true).with_hint(THEME_HINT);
            self.reply_error(&id, error);
            return;
        }

        let status =
            StatusPayload::event("apply-theme-applied").with_geometry(&self.tracker.snapshot());
        self.reply_status(&id, status.clone());
        self.broadcast(status);
    }

    fn on_trigger(&mut self, id: CorrelationId, envelope: &Envelope) {
        let trigger: TriggerPayload = envelope.payload_as().unwrap_or_default();
        if trigger.command.is_empty() {
            let error = ErrorPayload::new(ErrorCode::BadPayload, "Missing command", true);
            self.reply_error(&id, error);
            return;
        }

        let widget = Arc::clone(&self.widget);
        self.spawn_effect(async move {
            let result = widget.trigger(&trigger.command, &trigger.args).await;
            Internal::Triggered {
                ack_id: id,
                command: trigger.command,
                result,
            }
        });
    }

    pub(super) fn on_triggered(
        &mut self,
        id: CorrelationId,
        command: String,
        result: Result<(), WidgetError>,
    ) {
        match result {
            Ok(()) => {
                info!(command = %command, "Trigger fired");
                let status = StatusPayload::event(format!("trigger-{command}"))
                    .with_placement(self.tracker.placement());
                self.reply_status(&id, status);
            }
            Err(e) => {
                let error = ErrorPayload::new(ErrorCode::UnknownCmd, e.to_string(), true);
                self.reply_error(&id, error);
            }
        }
    }

    fn on_set_placement(&mut self, id: CorrelationId, envelope: &Envelope) {
        let payload: SetPlacementPayload = envelope.payload_as().unwrap_or_default();
        let Some(placement) = payload.placement.as_deref().and_then(Placement::parse) else {
            let error = ErrorPayload::new(ErrorCode::BadPayload, "placement is required", true);
            self.reply_error(&id, error);
            return;
        };

        info!(placement = %placement, "Placement set");
        self.tracker.set_placement(placement.clone());
        self.remeasure();
        let status = StatusPayload::event("set-placement")
            .with_placement(&placement)
            .with_geometry(&self.tracker.snapshot());
        self.reply_status(&id, status.clone());
        self.broadcast(status);
    }

    fn on_set_tokens(&mut self, id: CorrelationId, envelope: &Envelope) {
        let tokens: ThemeTokens = envelope.payload_as().unwrap_or_default();
        self.merge_tokens(&tokens);
        let status = StatusPayload::event("set-tokens").with_placement(self.tracker.placement());
        self.reply_status(&id, status);
    }

    fn on_ping(&mut self, id: CorrelationId) {
        let status = StatusPayload::event("pong-ack").with_placement(self.tracker.placement());
        self.reply_status(&id, status);
        self.post(MessageKind::Pong, Some(id), &json!({}));
    }
}

/// Absent `href`/`css` keys leave the current value alone; `null` or an
/// empty string removes it.
async fn load_theme(
    styles: &dyn StyleHost,
    href: Option<Option<String>>,
    css: Option<Option<String>>,
) -> Result<(), WidgetError> {
    if let Some(href) = href {
        let href = href.as_deref().filter(|h| !h.trim().is_empty());
        styles.load_stylesheet(href).await?;
    }
    if let Some(css) = css {
        let css = css.as_deref().filter(|c| !c.is_empty());
        styles.set_inline_css(css).await?;
    }
    Ok(())
}
