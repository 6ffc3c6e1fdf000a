//! Responder side of the embedded survey player.
//!
//! The [`Player`] task receives commands from the host bridge, runs them
//! against the live widget and replies once the effect is observable. The
//! [`VisibilityTracker`] supplies the geometry those replies carry.
//!
//! The page itself is reached only through the seams in [`dom`] and
//! [`widget`]; [`sim`] provides an in-memory page for previews and tests.

pub mod dom;
pub mod processor;
pub mod sim;
pub mod theme;
pub mod tracker;
pub mod widget;

pub use dom::{
    ComputedStyle, Document, IntersectionSample, NodeMetrics, NodeRef, PageEvent, Selector,
};
pub use processor::{PageSeams, ParentLink, Player, PlayerOptions, PresentWait};
pub use sim::{SimConfig, SimNode, SimulatedPage};
pub use theme::{sanitize_tokens, validate_css_color, TokenError};
pub use tracker::{GeometryWatch, VisibilityTracker, WIDGET_CONTAINER_ID};
pub use widget::{StyleHost, SurveyWidget, WidgetError};
