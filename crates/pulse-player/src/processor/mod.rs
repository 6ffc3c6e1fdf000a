//! The command processor.
//!
//! One task per player owns every piece of responder state: the parent
//! link, the visibility tracker, merged theme tokens and the queue of
//! `present` requests waiting for the widget. [`Player`] is the handle to
//! that task.

mod actor;
mod handler;
mod options;
mod types;


use std::sync::Arc;

use pulse_protocol::InboundMessage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dom::{Document, PageEvent};
use crate::tracker::{GeometryWatch, VisibilityTracker};
use crate::widget::{StyleHost, SurveyWidget};
use actor::PlayerActor;

pub use options::{ParentLink, PlayerOptions, PresentWait};

/// The page the player runs against.
#[derive(Clone)]
pub struct PageSeams {
    pub document: Arc<dyn Document>,
    pub widget: Arc<dyn SurveyWidget>,
    pub styles: Arc<dyn StyleHost>,
}

impl PageSeams {
    /// Use one object for all three seams.
    pub fn from_page<P>(page: Arc<P>) -> Self
    where
        P: Document + SurveyWidget + StyleHost + 'static,
    {
        Self {
            document: page.clone(),
            widget: page.clone(),
            styles: page,
        }
    }
}

/// Handle to a running player. Dropping it stops the player.
pub struct Player {
    task: JoinHandle<()>,
    geometry: GeometryWatch,
}

impl Player {
    /// Start the player task. It says `hello` to `parent` right away.
    ///
    /// `inbox` is the player window's message inbox; `page_events` carries
    /// the layout and readiness notifications of the page behind `seams`.
    pub fn spawn(
        options: PlayerOptions,
        seams: PageSeams,
        parent: ParentLink,
        inbox: mpsc::UnboundedReceiver<InboundMessage>,
        page_events: mpsc::UnboundedReceiver<PageEvent>,
    ) -> Self {
        let tracker = VisibilityTracker::new(seams.document.clone(), options.placement.clone());
        let geometry = tracker.watch();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let actor = PlayerActor::new(options, seams, parent, tracker, internal_tx);
        let task = tokio::spawn(actor.run(inbox, page_events, internal_rx));
        Self { task, geometry }
    }

    /// Follow the geometry the player publishes.
    pub fn geometry(&self) -> GeometryWatch {
        self.geometry.clone()
    }

    pub fn shutdown(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.task.abort();
    }
}
