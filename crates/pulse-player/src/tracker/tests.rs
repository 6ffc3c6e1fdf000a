use std::sync::Arc;
use std::time::Duration;

use pulse_common::{Bounds, Viewport};
use pulse_protocol::{GeometrySnapshot, Placement};

use super::*;
use crate::dom::{ComputedStyle, IntersectionSample};
use crate::sim::{SimConfig, SimNode, SimulatedPage};

fn br() -> Placement {
    Placement::parse("BR").unwrap()
}

fn page() -> Arc<SimulatedPage> {
    SimulatedPage::new(SimConfig::default()).0
}

fn tracker(page: &Arc<SimulatedPage>) -> VisibilityTracker {
    VisibilityTracker::new(page.clone(), br())
}

fn boxed(x: f64, y: f64) -> Bounds {
    Bounds::new(x, y, 300.0, 200.0)
}

fn hidden_style() -> ComputedStyle {
    ComputedStyle {
        visibility: "hidden".into(),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Root selection
// ---------------------------------------------------------------------------

#[test]
fn empty_page_has_no_root() {
    let page = page();
    assert_eq!(select_root(&*page), None);
}

#[test]
fn id_candidates_outrank_selector_candidates() {
    let page = page();
    let _marked = page.insert(SimNode::new().class("pi-widget-modal").bounds(boxed(0.0, 0.0)));
    let by_id = page.insert(SimNode::new().id("_pi_surveyInvite").bounds(boxed(10.0, 10.0)));
    assert_eq!(select_root(&*page), Some(by_id));
}

#[test]
fn visible_candidate_beats_earlier_hidden_one() {
    let page = page();
    let _hidden = page.insert(
        SimNode::new()
            .id("_pi_surveyWidget")
            .bounds(boxed(0.0, 0.0))
            .style(hidden_style()),
    );
    let shown = page.insert(SimNode::new().attr("data-pi-widget", "").bounds(boxed(5.0, 5.0)));
    assert_eq!(select_root(&*page), Some(shown));
}

#[test]
fn falls_back_to_first_attached_candidate() {
    let page = page();
    let first = page.insert(SimNode::new().id("_pi_surveyWidgetCustom"));
    let _second = page.insert(SimNode::new().class("pi-widget-docked"));
    assert_eq!(select_root(&*page), Some(first));
}

#[test]
fn nested_root_in_container_comes_before_container() {
    let page = page();
    let container = page.insert(SimNode::new().id(WIDGET_CONTAINER_ID).bounds(boxed(0.0, 0.0)));
    let nested = page.insert(
        SimNode::new()
            .class("pi-widget-inline")
            .child_of(container)
            .bounds(boxed(0.0, 0.0)),
    );
    assert_eq!(select_root(&*page), Some(nested));
}

#[test]
fn container_alone_is_a_root() {
    let page = page();
    let container = page.insert(SimNode::new().id(WIDGET_CONTAINER_ID).bounds(boxed(0.0, 0.0)));
    assert_eq!(select_root(&*page), Some(container));
}

#[test]
fn detached_candidates_are_skipped() {
    let page = page();
    let gone = page.insert(SimNode::new().id("_pi_surveyWidget").bounds(boxed(0.0, 0.0)));
    page.detach(gone);
    assert_eq!(select_root(&*page), None);
}

// ---------------------------------------------------------------------------
// Visibility rules
// ---------------------------------------------------------------------------

fn measure_with(style: ComputedStyle, bounds: Bounds) -> GeometrySnapshot {
    let page = page();
    page.insert(SimNode::new().id("_pi_surveyWidget").bounds(bounds).style(style));
    let mut tracker = tracker(&page);
    tracker.retarget();
    tracker.snapshot()
}

#[test]
fn rendered_box_is_visible() {
    let snap = measure_with(ComputedStyle::default(), boxed(12.0, 34.0));
    assert!(snap.is_visible());
    assert_eq!(snap.widget.bounds, Some(boxed(12.0, 34.0)));
}

#[test]
fn zero_area_is_hidden() {
    let snap = measure_with(ComputedStyle::default(), Bounds::new(0.0, 0.0, 300.0, 0.0));
    assert!(!snap.is_visible());
    assert_eq!(snap.widget.bounds, None);
}

#[test]
fn display_none_is_hidden() {
    let style = ComputedStyle {
        display: "none".into(),
        ..Default::default()
    };
    assert!(!measure_with(style, boxed(0.0, 0.0)).is_visible());
}

#[test]
fn collapsed_is_hidden() {
    let style = ComputedStyle {
        visibility: "collapse".into(),
        ..Default::default()
    };
    assert!(!measure_with(style, boxed(0.0, 0.0)).is_visible());
}

#[test]
fn nearly_transparent_is_hidden() {
    let style = ComputedStyle {
        opacity: 0.005,
        ..Default::default()
    };
    assert!(!measure_with(style, boxed(0.0, 0.0)).is_visible());
}

#[test]
fn bounds_are_rounded() {
    let snap = measure_with(
        ComputedStyle::default(),
        Bounds::new(10.004, 20.0, 300.336, 199.999),
    );
    assert_eq!(
        snap.widget.bounds,
        Some(Bounds::new(10.0, 20.0, 300.34, 200.0))
    );
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

#[test]
fn placement_from_data_hint() {
    let snap = {
        let page = page();
        page.insert(
            SimNode::new()
                .id("_pi_surveyWidget")
                .attr("data-pi-placement", " tl ")
                .class("pi-widget--position-br")
                .bounds(boxed(0.0, 0.0)),
        );
        let mut tracker = tracker(&page);
        tracker.retarget();
        tracker.snapshot()
    };
    assert_eq!(snap.placement.as_str(), "TL");
}

#[test]
fn placement_from_position_class() {
    let page = page();
    page.insert(
        SimNode::new()
            .id("_pi_surveyWidget")
            .class("PI-WIDGET--POSITION-BL")
            .bounds(boxed(0.0, 0.0)),
    );
    let mut tracker = tracker(&page);
    tracker.retarget();
    assert_eq!(tracker.snapshot().placement.as_str(), "BL");
}

#[test]
fn placement_falls_back_to_current() {
    let page = page();
    page.insert(SimNode::new().id("_pi_surveyWidget").bounds(boxed(0.0, 0.0)));
    let mut tracker = tracker(&page);
    tracker.set_placement(Placement::parse("inline").unwrap());
    tracker.retarget();
    assert_eq!(tracker.snapshot().placement.as_str(), "INLINE");
}

// ---------------------------------------------------------------------------
// Publication
// ---------------------------------------------------------------------------

#[test]
fn unchanged_geometry_is_not_republished() {
    let page = page();
    page.insert(SimNode::new().id("_pi_surveyWidget").bounds(boxed(0.0, 0.0)));
    let mut tracker = tracker(&page);
    assert!(tracker.retarget().is_some());
    assert!(tracker.refresh().is_none());
    assert!(tracker.retarget().is_none());
}

#[test]
fn hidden_page_publishes_nothing_initially() {
    let page = page();
    let mut tracker = tracker(&page);
    assert!(tracker.retarget().is_none());
    assert!(!tracker.snapshot().is_visible());
}

#[test]
fn bounds_change_is_published() {
    let page = page();
    let node = page.insert(SimNode::new().id("_pi_surveyWidget").bounds(boxed(0.0, 0.0)));
    let mut tracker = tracker(&page);
    tracker.retarget();

    page.set_bounds(node, boxed(40.0, 0.0));
    let snap = tracker.refresh().expect("moved widget is published");
    assert_eq!(snap.widget.bounds.unwrap().x, 40.0);
}

#[test]
fn viewport_change_is_published() {
    let page = page();
    let mut tracker = tracker(&page);
    tracker.retarget();

    page.resize_viewport(Viewport::new(800.0, 600.0));
    let snap = tracker.refresh().expect("viewport change is published");
    assert_eq!(snap.viewport, Viewport::new(800.0, 600.0));
}

#[test]
fn removed_root_reports_hidden_at_current_placement() {
    let page = page();
    let node = page.insert(
        SimNode::new()
            .id("_pi_surveyWidget")
            .class("pi-widget--position-tl")
            .bounds(boxed(0.0, 0.0)),
    );
    let mut tracker = tracker(&page);
    tracker.retarget();
    assert_eq!(tracker.snapshot().placement.as_str(), "TL");

    page.detach(node);
    let snap = tracker.retarget().expect("removal is published");
    assert!(!snap.is_visible());
    assert_eq!(snap.placement, br());
    assert_eq!(tracker.target(), None);
}

#[test]
fn intersection_gates_visibility_for_current_root_only() {
    let page = page();
    let stray = page.insert(SimNode::new().id("elsewhere"));
    let node = page.insert(SimNode::new().id("_pi_surveyWidget").bounds(boxed(0.0, 0.0)));
    let mut tracker = tracker(&page);
    tracker.retarget();
    assert!(tracker.snapshot().is_visible());

    let out = IntersectionSample {
        is_intersecting: false,
        ratio: 0.0,
    };
    assert!(tracker.observe_intersection(stray, out).is_none());
    assert!(tracker.snapshot().is_visible());

    let snap = tracker.observe_intersection(node, out).expect("scrolled out");
    assert!(!snap.is_visible());

    let back = IntersectionSample {
        is_intersecting: true,
        ratio: 0.5,
    };
    assert!(tracker.observe_intersection(node, back).unwrap().is_visible());
}

// ---------------------------------------------------------------------------
// Waiting
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn wait_for_visible_returns_immediately_when_visible() {
    let page = page();
    page.insert(SimNode::new().id("_pi_surveyWidget").bounds(boxed(0.0, 0.0)));
    let mut tracker = tracker(&page);
    tracker.retarget();

    let start = tokio::time::Instant::now();
    let snap = tracker.watch().wait_for_visible(Duration::from_secs(5)).await;
    assert!(snap.is_visible());
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn wait_for_visible_times_out_with_hidden_snapshot() {
    let page = page();
    let tracker = tracker(&page);
    let mut watch = tracker.watch();

    let start = tokio::time::Instant::now();
    let snap = watch.wait_for_visible(Duration::from_millis(2400)).await;
    assert!(!snap.is_visible());
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(2400));
    assert!(elapsed < Duration::from_millis(2410));
}

#[tokio::test(start_paused = true)]
async fn becoming_visible_releases_waiters_once() {
    let page = page();
    let mut tracker = tracker(&page);
    tracker.retarget();

    let mut first = tracker.watch();
    let mut second = tracker.watch();
    let mut observer = tracker.watch();
    let a = tokio::spawn(async move { first.wait_for_visible(Duration::from_secs(5)).await });
    let b = tokio::spawn(async move { second.wait_for_visible(Duration::from_secs(5)).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let node = page.insert(SimNode::new().id("_pi_surveyWidget").bounds(boxed(0.0, 0.0)));
    assert!(tracker.retarget().is_some());
    assert!(tracker.refresh().is_none());

    let a = a.await.unwrap();
    let b = b.await.unwrap();
    assert!(a.is_visible());
    assert_eq!(a, b);

    assert_eq!(observer.changed().await, Some(tracker.snapshot()));
    page.set_bounds(node, boxed(0.0, 0.0));
    assert!(tracker.refresh().is_none());
    let nothing = tokio::time::timeout(Duration::from_millis(50), observer.changed()).await;
    assert!(nothing.is_err(), "no duplicate publication");
}
