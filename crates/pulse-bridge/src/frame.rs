//! The seam between the controller and whatever hosts the player frame.

use std::sync::Arc;

use pulse_protocol::{PostTarget, WindowId};
use url::Url;

use crate::error::BridgeError;

/// What to mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameTarget {
    /// Frame `src`, absolute or relative to the host origin.
    pub src: String,
    pub title: Option<String>,
}

impl FrameTarget {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            title: None,
        }
    }
}

/// A mounted frame: its content window identity and a way to post into it.
#[derive(Clone)]
pub struct FrameHandle {
    pub window: WindowId,
    pub port: Arc<dyn PostTarget>,
    pub src: String,
}

impl std::fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHandle")
            .field("window", &self.window)
            .field("src", &self.src)
            .finish_non_exhaustive()
    }
}

/// Creates and destroys player frames.
pub trait FrameHost: Send + Sync {
    fn mount(&self, target: &FrameTarget) -> Result<FrameHandle, BridgeError>;
    fn unmount(&self, handle: &FrameHandle);
}

/// Derive the origin a frame at `src` will run under, resolving relative
/// sources against `host_origin`.
pub fn derive_player_origin(src: &str, host_origin: &str) -> Result<String, BridgeError> {
    let base = Url::parse(host_origin)
        .map_err(|e| BridgeError::Mount(format!("invalid host origin '{host_origin}': {e}")))?;
    let url = base
        .join(src)
        .map_err(|e| BridgeError::Mount(format!("invalid frame src '{src}': {e}")))?;
    Ok(url.origin().ascii_serialization())
}
