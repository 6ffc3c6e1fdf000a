//! The player task: owns the tracker, merged tokens, the present queue and
//! everything posted back to the parent window.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pulse_common::CorrelationId;
use pulse_protocol::{
    Endpoint, Envelope, ErrorPayload, GeometrySnapshot, HelloPayload, InboundFilter,
    InboundMessage, MessageKind, ReadyPayload, StatusPayload, ThemeTokens,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::options::{ParentLink, PlayerOptions};
use super::types::{Internal, PresentRequest};
use super::PageSeams;
use crate::dom::{Document, PageEvent};
use crate::theme::sanitize_tokens;
use crate::tracker::VisibilityTracker;
use crate::widget::{StyleHost, SurveyWidget};

pub(crate) struct PlayerActor {
    pub(super) options: PlayerOptions,
    pub(super) document: Arc<dyn Document>,
    pub(super) widget: Arc<dyn SurveyWidget>,
    pub(super) styles: Arc<dyn StyleHost>,
    parent: ParentLink,
    pub(super) filter: InboundFilter,
    internal_tx: mpsc::UnboundedSender<Internal>,

    pub(super) tracker: VisibilityTracker,
    tokens: ThemeTokens,

    started: Instant,
    widget_ready: bool,
    ready_latency: Option<Duration>,
    pending_presents: VecDeque<PresentRequest>,

    online: bool,
    pub(super) pending_ready_id: Option<CorrelationId>,
}

impl PlayerActor {
    pub(crate) fn new(
        options: PlayerOptions,
        seams: PageSeams,
        parent: ParentLink,
        tracker: VisibilityTracker,
        internal_tx: mpsc::UnboundedSender<Internal>,
    ) -> Self {
        let filter = parent.filter();
        Self {
            options,
            document: seams.document,
            widget: seams.widget,
            styles: seams.styles,
            parent,
            filter,
            internal_tx,
            tracker,
            tokens: ThemeTokens::default(),
            started: Instant::now(),
            widget_ready: false,
            ready_latency: None,
            pending_presents: VecDeque::new(),
            online: false,
            pending_ready_id: None,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<InboundMessage>,
        mut page_events: mpsc::UnboundedReceiver<PageEvent>,
        mut internal_rx: mpsc::UnboundedReceiver<Internal>,
    ) {
        info!(
            version = %self.options.player_version,
            parent = %self.parent.origin(),
            "Player starting"
        );
        self.say_hello();
        let initial = self.tracker.retarget();
        self.publish(initial);

        let period = self.options.viewport_poll.max(Duration::from_millis(1));
        let mut poll = interval_at(Instant::now() + period, period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = inbox.recv() => match message {
                    Some(message) => self.handle_inbound(message),
                    None => break,
                },
                Some(event) = page_events.recv() => self.handle_page(event),
                Some(internal) = internal_rx.recv() => self.handle_internal(internal),
                _ = poll.tick() => {
                    let published = self.tracker.refresh();
                    self.publish(published);
                }
            }
        }

        debug!("Player window closed; stopping");
    }

    // -----------------------------------------------------------------------
    // Page
    // -----------------------------------------------------------------------

    fn handle_page(&mut self, event: PageEvent) {
        let published = match event {
            PageEvent::Mutation => self.tracker.retarget(),
            PageEvent::Resize | PageEvent::Scroll => self.tracker.refresh(),
            PageEvent::TransitionEnd(node) if self.tracker.target() == Some(node) => {
                self.tracker.refresh()
            }
            PageEvent::TransitionEnd(_) => None,
            PageEvent::Intersection(node, sample) => {
                self.tracker.observe_intersection(node, sample)
            }
            PageEvent::VisibilityChange { hidden: false } => self.tracker.refresh(),
            PageEvent::VisibilityChange { hidden: true } => None,
            PageEvent::WidgetReady => {
                self.on_widget_ready();
                None
            }
        };
        self.publish(published);
    }

    fn on_widget_ready(&mut self) {
        if !self.widget_ready {
            let latency = self.started.elapsed();
            self.widget_ready = true;
            self.ready_latency = Some(latency);
            info!(latency_ms = latency.as_millis() as u64, "Survey widget ready");
            let queued: Vec<PresentRequest> = self.pending_presents.drain(..).collect();
            self.execute_presents(queued);
        }

        if self.online {
            self.broadcast(StatusPayload::default().with_geometry(&self.tracker.snapshot()));
        } else {
            self.announce_ready();
        }
    }

    pub(super) fn widget_ready(&self) -> bool {
        self.widget_ready
    }

    /// Wait for `present` adapted to how slow this page was to load the widget.
    pub(super) fn present_wait(&self) -> Duration {
        self.options.present_wait.for_latency(self.ready_latency)
    }

    pub(super) fn queue_present(&mut self, request: PresentRequest) {
        info!(survey_id = %request.survey_id, "Present queued until the widget is ready");
        self.pending_presents.push_back(request);
    }

    /// Re-read geometry now rather than waiting for the next page event.
    pub(super) fn remeasure(&mut self) {
        let published = self.tracker.retarget();
        self.publish(published);
    }

    /// Broadcast a freshly published snapshot.
    fn publish(&self, published: Option<GeometrySnapshot>) {
        if let Some(snapshot) = published {
            debug!(
                visible = snapshot.is_visible(),
                placement = %snapshot.placement,
                "Geometry changed"
            );
            self.broadcast(StatusPayload::default().with_geometry(&snapshot));
        }
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::Presented { request, result } => self.on_presented(request, result),
            Internal::Dismissed { ack_id, result } => self.on_dismissed(ack_id, result),
            Internal::ThemeApplied { ack_id, result } => self.on_theme_applied(ack_id, result),
            Internal::Triggered {
                ack_id,
                command,
                result,
            } => self.on_triggered(ack_id, command, result),
            Internal::PresentSettled {
                ack_id,
                survey_id,
                snapshot,
            } => {
                info!(
                    survey_id = %survey_id,
                    visible = snapshot.is_visible(),
                    "Present settled"
                );
                let status = StatusPayload::event("present-called")
                    .with("surveyId", survey_id)
                    .with_geometry(&snapshot);
                self.reply_status(&ack_id, status.clone());
                self.broadcast(status);
            }
        }
    }

    /// Run a page effect off the player task and feed its outcome back in.
    pub(super) fn spawn_effect<F>(&self, effect: F)
    where
        F: Future<Output = Internal> + Send + 'static,
    {
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let _ = internal_tx.send(effect.await);
        });
    }

    /// Hand `requests` to the widget one after another, off the player task.
    pub(super) fn execute_presents(&self, requests: Vec<PresentRequest>) {
        if requests.is_empty() {
            return;
        }
        let widget = Arc::clone(&self.widget);
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            for request in requests {
                let result = widget.present(&request.survey_id, request.force).await;
                if internal_tx.send(Internal::Presented { request, result }).is_err() {
                    break;
                }
            }
        });
    }

    /// Wait for visible geometry off the player task, then report back.
    pub(super) fn settle_present_later(&self, ack_id: CorrelationId, survey_id: String) {
        let wait = self.present_wait();
        let mut geometry = self.tracker.watch();
        let internal_tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let snapshot = geometry.wait_for_visible(wait).await;
            let _ = internal_tx.send(Internal::PresentSettled {
                ack_id,
                survey_id,
                snapshot,
            });
        });
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    /// Sanitize `tokens`, merge them into the current set and hand the
    /// result to the widget.
    pub(super) fn merge_tokens(&mut self, tokens: &ThemeTokens) {
        let clean = sanitize_tokens(tokens);
        if clean.is_empty() {
            return;
        }
        self.tokens.merge(&clean);
        self.styles.apply_tokens(&self.tokens);
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    fn say_hello(&self) {
        let hello = HelloPayload {
            player_version: self.options.player_version.clone(),
            supports: self.options.capabilities.names(),
        };
        self.post(MessageKind::Hello, None, &hello);
    }

    /// Send `ready` once per player lifetime, keyed to the `init` that
    /// triggered it if there was one.
    pub(super) fn announce_ready(&mut self) {
        if self.online {
            return;
        }
        self.online = true;
        let ready = ReadyPayload {
            player_version: self.options.player_version.clone(),
        };
        let id = self.pending_ready_id.take();
        info!(init_id = ?id, "Player ready");
        self.post(MessageKind::Ready, id, &ready);
        let status = StatusPayload::event("player-ready").with_placement(self.tracker.placement());
        self.broadcast(status);
    }

    pub(super) fn reply_status(&self, id: &CorrelationId, status: StatusPayload) {
        self.post(MessageKind::Status, Some(id.clone()), &status);
    }

    pub(super) fn broadcast(&self, status: StatusPayload) {
        self.post(MessageKind::Status, None, &status);
    }

    pub(super) fn reply_error(&self, id: &CorrelationId, error: ErrorPayload) {
        warn!(id = %id, code = %error.code, message = %error.message, "Command failed");
        self.post(MessageKind::Error, Some(id.clone()), &error);
    }

    pub(super) fn post<T: Serialize>(
        &self,
        kind: MessageKind,
        id: Option<CorrelationId>,
        payload: &T,
    ) {
        let data = Envelope::with_payload(Endpoint::Player, kind, id, payload).to_value();
        if self.options.debug {
            debug!(envelope = %data, "[player ->]");
        }
        if let Err(e) = self.parent.post(data) {
            debug!(error = %e, kind = %kind, "Parent window unreachable");
        }
    }
}
