//! Widget visibility tracking.
//!
//! The tracker keeps one [`GeometrySnapshot`] for the active widget root.
//! Each page event re-measures the root; a snapshot is published only when
//! it differs from the previous one in visibility, bounds, placement or
//! viewport. Readers hold a [`GeometryWatch`] and never see a merged or
//! half-updated snapshot.

use std::sync::Arc;
use std::time::Duration;

use pulse_protocol::{GeometrySnapshot, Placement};
use tokio::sync::watch;
use tracing::debug;

use crate::dom::{Document, IntersectionSample, NodeMetrics, NodeRef, Selector};

/// Element the widget renders into. Dismiss falls back to hiding it.
pub const WIDGET_CONTAINER_ID: &str = "_pi_surveyWidgetContainer";

/// Widget roots looked up by id, highest priority first.
const ROOT_IDS: [&str; 5] = [
    "_pi_surveyWidget",
    "_pi_surveyWidgetCustom",
    "_pi_modalWidgetContainer",
    "_pi_inlineWidget",
    "_pi_surveyInvite",
];

/// Widget roots marked by attribute or class.
const ROOT_SELECTORS: [Selector; 5] = [
    Selector::Attribute("data-pi-widget-root"),
    Selector::Attribute("data-pi-widget"),
    Selector::Class("pi-widget-inline"),
    Selector::Class("pi-widget-modal"),
    Selector::Class("pi-widget-docked"),
];

/// Roots searched for inside the container.
const NESTED_SELECTORS: [Selector; 5] = [
    Selector::Id("_pi_surveyWidget"),
    Selector::Id("_pi_surveyWidgetCustom"),
    Selector::Attribute("data-pi-widget-root"),
    Selector::Class("pi-widget-inline"),
    Selector::Class("pi-widget-modal"),
];

const POSITION_CLASSES: [(&str, &str); 4] = [
    ("pi-widget--position-br", "BR"),
    ("pi-widget--position-bl", "BL"),
    ("pi-widget--position-tr", "TR"),
    ("pi-widget--position-tl", "TL"),
];

/// Owns the published geometry. Lives inside the player task.
pub struct VisibilityTracker {
    document: Arc<dyn Document>,
    target: Option<NodeRef>,
    intersection: Option<IntersectionSample>,
    placement: Placement,
    published: watch::Sender<GeometrySnapshot>,
}

impl VisibilityTracker {
    /// Start with a hidden snapshot at `placement`. Nothing is measured until
    /// the first [`retarget`](Self::retarget).
    pub fn new(document: Arc<dyn Document>, placement: Placement) -> Self {
        let initial = GeometrySnapshot::hidden(placement.clone(), document.viewport());
        let (published, _) = watch::channel(initial);
        Self {
            document,
            target: None,
            intersection: None,
            placement,
            published,
        }
    }

    pub fn snapshot(&self) -> GeometrySnapshot {
        self.published.borrow().clone()
    }

    pub fn watch(&self) -> GeometryWatch {
        GeometryWatch {
            rx: self.published.subscribe(),
        }
    }

    pub fn target(&self) -> Option<NodeRef> {
        self.target
    }

    /// Placement reported when the widget root carries no placement of its own.
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn set_placement(&mut self, placement: Placement) {
        self.placement = placement;
    }

    /// Pick the widget root again and measure it. Call after DOM mutations.
    pub fn retarget(&mut self) -> Option<GeometrySnapshot> {
        let root = select_root(self.document.as_ref());
        if root != self.target {
            debug!(from = ?self.target, to = ?root, "Widget root changed");
            self.target = root;
            self.intersection = None;
        }
        self.refresh()
    }

    /// Measure the current root. Returns the snapshot if it was published.
    pub fn refresh(&mut self) -> Option<GeometrySnapshot> {
        let snapshot = self.measure();
        self.publish(snapshot)
    }

    /// Record an intersection reading. Readings for anything other than the
    /// current root are ignored.
    pub fn observe_intersection(
        &mut self,
        node: NodeRef,
        sample: IntersectionSample,
    ) -> Option<GeometrySnapshot> {
        if self.target != Some(node) {
            return None;
        }
        self.intersection = Some(sample);
        self.refresh()
    }

    fn measure(&self) -> GeometrySnapshot {
        let viewport = self.document.viewport();
        let metrics = self
            .target
            .filter(|node| self.document.is_attached(*node))
            .and_then(|node| self.document.measure(node));
        let Some(metrics) = metrics else {
            return GeometrySnapshot::hidden(self.placement.clone(), viewport);
        };

        let placement = detect_placement(&metrics, &self.placement);
        let in_view = self.intersection.map_or(true, |sample| sample.in_view());
        if is_visible(&metrics) && in_view {
            GeometrySnapshot::visible(metrics.bounds, placement, viewport)
        } else {
            GeometrySnapshot::hidden(placement, viewport)
        }
    }

    fn publish(&mut self, snapshot: GeometrySnapshot) -> Option<GeometrySnapshot> {
        let changed = self.published.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot.clone();
            true
        });
        changed.then_some(snapshot)
    }
}

/// Read side of the tracker.
#[derive(Debug, Clone)]
pub struct GeometryWatch {
    rx: watch::Receiver<GeometrySnapshot>,
}

impl GeometryWatch {
    pub fn current(&self) -> GeometrySnapshot {
        self.rx.borrow().clone()
    }

    /// Resolve with the first visible snapshot, or with whatever is current
    /// once `timeout` elapses.
    pub async fn wait_for_visible(&mut self, timeout: Duration) -> GeometrySnapshot {
        let wait = self.rx.wait_for(GeometrySnapshot::is_visible);
        let visible = match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(snapshot)) => Some(snapshot.clone()),
            _ => None,
        };
        visible.unwrap_or_else(|| self.current())
    }

    /// Wait for the next published snapshot. `None` once the tracker is gone.
    pub async fn changed(&mut self) -> Option<GeometrySnapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

// =============================================================================
// SELECTION
// =============================================================================

/// Choose the widget root: the first candidate with a measurable visible box,
/// else the first attached candidate.
///
/// Candidates, in order: the well-known root ids, attribute and class
/// markers, a root nested in the widget container, then the container itself.
pub fn select_root(document: &dyn Document) -> Option<NodeRef> {
    let mut candidates: Vec<NodeRef> = ROOT_IDS
        .iter()
        .filter_map(|id| document.element_by_id(id))
        .collect();
    candidates.extend(document.query_all(&ROOT_SELECTORS));
    if let Some(container) = document.element_by_id(WIDGET_CONTAINER_ID) {
        candidates.extend(document.query_within(container, &NESTED_SELECTORS));
        candidates.push(container);
    }

    let mut fallback = None;
    for node in candidates {
        if !document.is_attached(node) {
            continue;
        }
        if document.measure(node).is_some_and(|m| is_visible(&m)) {
            return Some(node);
        }
        fallback = fallback.or(Some(node));
    }
    fallback
}

/// Visible: a positive area and a rendered style.
pub fn is_visible(metrics: &NodeMetrics) -> bool {
    metrics.bounds.area() > 0.0 && metrics.style.is_rendered()
}

/// Placement from the node's data hint or position class, else `fallback`.
pub fn detect_placement(metrics: &NodeMetrics, fallback: &Placement) -> Placement {
    if let Some(placement) = metrics.placement_hint.as_deref().and_then(Placement::parse) {
        return placement;
    }
    POSITION_CLASSES
        .iter()
        .find(|(class, _)| {
            metrics
                .classes
                .iter()
                .any(|c| c.eq_ignore_ascii_case(class))
        })
        .and_then(|(_, tag)| Placement::parse(tag))
        .unwrap_or_else(|| fallback.clone())
}

#[cfg(test)]
mod tests;
