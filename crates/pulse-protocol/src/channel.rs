//! In-process model of the cross-window messaging channel.
//!
//! A [`Window`] is a browsing context with an origin and an inbox. Another
//! context posts to it through a [`WindowProxy`], which stamps every message
//! with the sender's origin and window id the way the browser does. Posts
//! whose target origin does not match the receiving window are dropped
//! without error. Receivers bind an [`InboundFilter`] to the one origin and
//! source window they expect.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

static NEXT_WINDOW_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a browsing context, compared by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(u64);

impl WindowId {
    fn next() -> Self {
        Self(NEXT_WINDOW_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// One delivered message, as seen by the receiving window.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub origin: String,
    pub source: WindowId,
    pub data: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("target window is closed")]
    Closed,
}

/// Anything a message can be posted to.
pub trait PostTarget: Send + Sync {
    /// Post `data`, to be delivered only if the target's origin equals
    /// `target_origin` (or `target_origin` is `"*"`).
    fn post_message(&self, data: Value, target_origin: &str) -> Result<(), ChannelError>;
}

/// A browsing context that can receive messages.
#[derive(Debug, Clone)]
pub struct Window {
    id: WindowId,
    origin: String,
    inbox: mpsc::UnboundedSender<InboundMessage>,
}

impl Window {
    /// Open a new window at `origin`, returning it and its inbox.
    pub fn open(origin: impl Into<String>) -> (Window, mpsc::UnboundedReceiver<InboundMessage>) {
        let (inbox, rx) = mpsc::unbounded_channel();
        let window = Window {
            id: WindowId::next(),
            origin: origin.into(),
            inbox,
        };
        (window, rx)
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// A handle `sender` can use to post messages into this window.
    pub fn proxy_from(&self, sender: &Window) -> WindowProxy {
        WindowProxy {
            source: sender.id,
            source_origin: sender.origin.clone(),
            target: self.clone(),
        }
    }
}

/// A posting handle bound to one sender and one target window.
#[derive(Debug, Clone)]
pub struct WindowProxy {
    source: WindowId,
    source_origin: String,
    target: Window,
}

impl WindowProxy {
    pub fn target_id(&self) -> WindowId {
        self.target.id
    }

    pub fn target_origin(&self) -> &str {
        &self.target.origin
    }
}

impl PostTarget for WindowProxy {
    fn post_message(&self, data: Value, target_origin: &str) -> Result<(), ChannelError> {
        if target_origin != "*" && target_origin != self.target.origin {
            debug!(
                expected = target_origin,
                actual = %self.target.origin,
                "Dropping post: target origin mismatch"
            );
            return Ok(());
        }
        self.target
            .inbox
            .send(InboundMessage {
                origin: self.source_origin.clone(),
                source: self.source,
                data,
            })
            .map_err(|_| ChannelError::Closed)
    }
}

/// Accepts only messages from one origin and one source window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFilter {
    pub origin: String,
    pub source: WindowId,
}

impl InboundFilter {
    pub fn new(origin: impl Into<String>, source: WindowId) -> Self {
        Self {
            origin: origin.into(),
            source,
        }
    }

    pub fn accepts(&self, message: &InboundMessage) -> bool {
        message.origin == self.origin && message.source == self.source
    }
}
