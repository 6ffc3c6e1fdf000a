//! Messages fed back into the player task.

use pulse_common::CorrelationId;
use pulse_protocol::GeometrySnapshot;

use crate::widget::WidgetError;

/// Wakeups from tasks the player spawned.
#[derive(Debug)]
pub(super) enum Internal {
    /// The widget accepted or refused a `present` call.
    Presented {
        request: PresentRequest,
        result: Result<(), WidgetError>,
    },
    /// A `present` finished waiting for the widget; ack with this geometry.
    PresentSettled {
        ack_id: CorrelationId,
        survey_id: String,
        snapshot: GeometrySnapshot,
    },
    Dismissed {
        ack_id: CorrelationId,
        result: Result<(), WidgetError>,
    },
    /// Stylesheet and inline CSS are in place, or one of them failed.
    ThemeApplied {
        ack_id: CorrelationId,
        result: Result<(), WidgetError>,
    },
    Triggered {
        ack_id: CorrelationId,
        command: String,
        result: Result<(), WidgetError>,
    },
}

/// A `present` accepted before the widget could run it.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct PresentRequest {
    pub(super) ack_id: CorrelationId,
    pub(super) survey_id: String,
    pub(super) force: bool,
}
