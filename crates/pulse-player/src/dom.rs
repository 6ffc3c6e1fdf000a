//! Read-only view of the player document, plus the page events that
//! prompt the tracker to measure again.

use pulse_common::{Bounds, Viewport};

/// Opaque handle to an element in the player document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(pub u64);

/// The selector forms the widget-root lookup needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// `#id`
    Id(&'static str),
    /// `[attribute]`
    Attribute(&'static str),
    /// `.class`
    Class(&'static str),
}

/// Computed style properties that decide whether a node renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "block".into(),
            visibility: "visible".into(),
            opacity: 1.0,
        }
    }
}

impl ComputedStyle {
    /// Not `display: none`, not hidden or collapsed, and not fully transparent.
    pub fn is_rendered(&self) -> bool {
        self.display != "none"
            && !matches!(self.visibility.as_str(), "hidden" | "collapse")
            && self.opacity > 0.01
    }
}

/// One measurement pass over a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMetrics {
    /// Layout box in viewport coordinates.
    pub bounds: Bounds,
    pub style: ComputedStyle,
    /// `data-pi-placement`, or `data-pi-position` when the former is unset.
    pub placement_hint: Option<String>,
    pub classes: Vec<String>,
}

/// Latest intersection-observer reading for a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionSample {
    pub is_intersecting: bool,
    pub ratio: f64,
}

impl IntersectionSample {
    pub fn in_view(&self) -> bool {
        self.is_intersecting && self.ratio > 0.0
    }
}

/// Something on the page changed and geometry may be stale.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    /// Nodes were added or removed; the widget root may have changed.
    Mutation,
    Resize,
    Scroll,
    TransitionEnd(NodeRef),
    Intersection(NodeRef, IntersectionSample),
    VisibilityChange { hidden: bool },
    /// The survey widget finished loading and accepts commands.
    WidgetReady,
}

/// Query and measurement access to the player document.
pub trait Document: Send + Sync {
    /// The attached element with this id, if any.
    fn element_by_id(&self, id: &str) -> Option<NodeRef>;

    /// Attached nodes matching any of `selectors`, in document order.
    fn query_all(&self, selectors: &[Selector]) -> Vec<NodeRef>;

    /// First attached descendant of `root` matching any of `selectors`.
    fn query_within(&self, root: NodeRef, selectors: &[Selector]) -> Option<NodeRef>;

    fn is_attached(&self, node: NodeRef) -> bool;

    /// `None` once the node is gone.
    fn measure(&self, node: NodeRef) -> Option<NodeMetrics>;

    fn viewport(&self) -> Viewport;

    /// Force `display: none` on `node`. Returns false if there was nothing to hide.
    fn hide(&self, node: NodeRef) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(display: &str, visibility: &str, opacity: f64) -> ComputedStyle {
        ComputedStyle {
            display: display.into(),
            visibility: visibility.into(),
            opacity,
        }
    }

    #[test]
    fn default_style_renders() {
        assert!(ComputedStyle::default().is_rendered());
    }

    #[test]
    fn hidden_styles_do_not_render() {
        assert!(!style("none", "visible", 1.0).is_rendered());
        assert!(!style("block", "hidden", 1.0).is_rendered());
        assert!(!style("block", "collapse", 1.0).is_rendered());
        assert!(!style("block", "visible", 0.01).is_rendered());
        assert!(style("flex", "visible", 0.02).is_rendered());
    }

    #[test]
    fn intersection_needs_positive_ratio() {
        let touching = IntersectionSample {
            is_intersecting: true,
            ratio: 0.0,
        };
        let partly = IntersectionSample {
            is_intersecting: true,
            ratio: 0.25,
        };
        let away = IntersectionSample {
            is_intersecting: false,
            ratio: 0.5,
        };
        assert!(!touching.in_view());
        assert!(partly.in_view());
        assert!(!away.in_view());
    }
}
