//! Geometry snapshots reported by the player.

use std::fmt;

use pulse_common::{Bounds, Viewport};
use serde::{Deserialize, Serialize};

/// Widget placement tag, normalized to trimmed upper case (`BR`, `TL`, `INLINE`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Placement(String);

impl Placement {
    /// Normalize a raw placement string. Blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Placement {
    /// Bottom right, where the widget docks unless told otherwise.
    fn default() -> Self {
        Self("BR".to_string())
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Visibility and layout box of the widget root.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WidgetGeometry {
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

impl WidgetGeometry {
    pub fn hidden() -> Self {
        Self {
            visible: false,
            bounds: None,
        }
    }

    pub fn visible(bounds: Bounds) -> Self {
        Self {
            visible: true,
            bounds: Some(bounds.rounded()),
        }
    }
}

/// The player's best current measurement of the widget.
///
/// Hidden snapshots never carry bounds, so two hidden snapshots with the same
/// placement and viewport compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometrySnapshot {
    pub widget: WidgetGeometry,
    pub placement: Placement,
    pub viewport: Viewport,
}

impl GeometrySnapshot {
    pub fn hidden(placement: Placement, viewport: Viewport) -> Self {
        Self {
            widget: WidgetGeometry::hidden(),
            placement,
            viewport: viewport.rounded(),
        }
    }

    pub fn visible(bounds: Bounds, placement: Placement, viewport: Viewport) -> Self {
        Self {
            widget: WidgetGeometry::visible(bounds),
            placement,
            viewport: viewport.rounded(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.widget.visible
    }
}
