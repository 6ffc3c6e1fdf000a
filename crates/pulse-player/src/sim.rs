//! In-memory player page.
//!
//! [`SimulatedPage`] plays the document, the survey widget and the style
//! host at once. Every layout change it makes is reported as a
//! [`PageEvent`], the same way real observers would report it, so the
//! player reacts to it exactly as it would on a live page.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use pulse_common::{Bounds, Viewport};
use pulse_protocol::ThemeTokens;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::dom::{
    ComputedStyle, Document, IntersectionSample, NodeMetrics, NodeRef, PageEvent, Selector,
};
use crate::tracker::WIDGET_CONTAINER_ID;
use crate::widget::{StyleHost, SurveyWidget, WidgetError};

/// Triggers the simulated widget knows how to run.
const KNOWN_TRIGGERS: [&str; 7] = [
    "present-selected",
    "exit-intent",
    "rage-click",
    "scroll-depth",
    "time-delay",
    "pageview",
    "idle",
];

/// How the simulated widget renders.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub viewport: Viewport,
    /// Delay between an accepted `present` and the widget appearing.
    pub render_delay: Duration,
    /// Box the rendered widget occupies.
    pub widget_bounds: Bounds,
    /// Position class put on the rendered widget root.
    pub position_class: Option<String>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::new(1280.0, 720.0),
            render_delay: Duration::from_millis(300),
            widget_bounds: Bounds::new(940.0, 420.0, 320.0, 280.0),
            position_class: Some("pi-widget--position-br".into()),
        }
    }
}

/// A node in the simulated document. Also serves as the builder passed to
/// [`SimulatedPage::insert`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimNode {
    id: Option<String>,
    classes: Vec<String>,
    attributes: HashMap<String, String>,
    parent: Option<NodeRef>,
    bounds: Bounds,
    style: ComputedStyle,
    attached: bool,
}

impl Default for SimNode {
    fn default() -> Self {
        Self {
            id: None,
            classes: Vec::new(),
            attributes: HashMap::new(),
            parent: None,
            bounds: Bounds::new(0.0, 0.0, 0.0, 0.0),
            style: ComputedStyle::default(),
            attached: true,
        }
    }
}

impl SimNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn child_of(mut self, parent: NodeRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn style(mut self, style: ComputedStyle) -> Self {
        self.style = style;
        self
    }

    fn matches(&self, selector: &Selector) -> bool {
        match selector {
            Selector::Id(id) => self.id.as_deref() == Some(*id),
            Selector::Attribute(name) => self.attributes.contains_key(*name),
            Selector::Class(class) => self.classes.iter().any(|c| c.as_str() == *class),
        }
    }

    fn placement_hint(&self) -> Option<String> {
        self.attributes
            .get("data-pi-placement")
            .or_else(|| self.attributes.get("data-pi-position"))
            .cloned()
    }
}

#[derive(Default)]
struct PageState {
    nodes: Vec<SimNode>,
    viewport: Viewport,
    widget_ready: bool,
    render_generation: u64,
    rendered: Vec<NodeRef>,
    presented: Vec<String>,
    triggers: Vec<String>,
    stylesheet: Option<String>,
    inline_css: Option<String>,
    tokens: ThemeTokens,
    broken_stylesheets: HashSet<String>,
    failing_surveys: HashSet<String>,
}

impl PageState {
    fn push(&mut self, node: SimNode) -> NodeRef {
        self.nodes.push(node);
        NodeRef(self.nodes.len() as u64 - 1)
    }

    fn node(&self, node: NodeRef) -> Option<&SimNode> {
        self.nodes.get(node.0 as usize)
    }

    fn node_mut(&mut self, node: NodeRef) -> Option<&mut SimNode> {
        self.nodes.get_mut(node.0 as usize)
    }

    fn is_attached(&self, node: NodeRef) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            match self.node(id) {
                Some(n) if n.attached => current = n.parent,
                _ => return false,
            }
        }
        true
    }

    fn is_descendant(&self, node: NodeRef, ancestor: NodeRef) -> bool {
        let mut current = self.node(node).and_then(|n| n.parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.node(id).and_then(|n| n.parent);
        }
        false
    }

    fn attached_refs(&self) -> impl Iterator<Item = NodeRef> + '_ {
        (0..self.nodes.len() as u64)
            .map(NodeRef)
            .filter(move |node| self.is_attached(*node))
    }

    fn clear_rendered(&mut self) {
        for node in std::mem::take(&mut self.rendered) {
            if let Some(n) = self.node_mut(node) {
                n.attached = false;
            }
        }
    }
}

/// In-memory document, widget and style host.
pub struct SimulatedPage {
    config: SimConfig,
    state: Arc<Mutex<PageState>>,
    events: mpsc::UnboundedSender<PageEvent>,
}

fn lock(state: &Mutex<PageState>) -> MutexGuard<'_, PageState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedPage {
    /// Create an empty page. The receiver carries its page events.
    pub fn new(config: SimConfig) -> (Arc<Self>, mpsc::UnboundedReceiver<PageEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let state = PageState {
            viewport: config.viewport,
            ..Default::default()
        };
        let page = Arc::new(Self {
            config,
            state: Arc::new(Mutex::new(state)),
            events,
        });
        (page, rx)
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        lock(&self.state)
    }

    fn notify(&self, event: PageEvent) {
        let _ = self.events.send(event);
    }

    // -------------------------------------------------------------------------
    // Driving the page
    // -------------------------------------------------------------------------

    /// Add a node and report the mutation.
    pub fn insert(&self, node: SimNode) -> NodeRef {
        let node = self.state().push(node);
        self.notify(PageEvent::Mutation);
        node
    }

    /// Remove a node (and with it its subtree) from the document.
    pub fn detach(&self, node: NodeRef) {
        if let Some(n) = self.state().node_mut(node) {
            n.attached = false;
        }
        self.notify(PageEvent::Mutation);
    }

    /// Move or resize a node, as a resize observer would report it.
    pub fn set_bounds(&self, node: NodeRef, bounds: Bounds) {
        if let Some(n) = self.state().node_mut(node) {
            n.bounds = bounds;
        }
        self.notify(PageEvent::Resize);
    }

    /// Change a node's computed style; reported when its transition ends.
    pub fn set_style(&self, node: NodeRef, style: ComputedStyle) {
        if let Some(n) = self.state().node_mut(node) {
            n.style = style;
        }
        self.notify(PageEvent::TransitionEnd(node));
    }

    pub fn resize_viewport(&self, viewport: Viewport) {
        self.state().viewport = viewport;
        self.notify(PageEvent::Resize);
    }

    pub fn report_intersection(&self, node: NodeRef, sample: IntersectionSample) {
        self.notify(PageEvent::Intersection(node, sample));
    }

    pub fn set_document_hidden(&self, hidden: bool) {
        self.notify(PageEvent::VisibilityChange { hidden });
    }

    /// The widget script finished loading.
    pub fn mark_widget_ready(&self) {
        self.state().widget_ready = true;
        self.notify(PageEvent::WidgetReady);
    }

    /// Mark the widget ready after `delay`, as a slow page would.
    pub fn boot_after(&self, delay: Duration) {
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            lock(&state).widget_ready = true;
            let _ = events.send(PageEvent::WidgetReady);
        });
    }

    /// Make loading `href` fail.
    pub fn break_stylesheet(&self, href: impl Into<String>) {
        self.state().broken_stylesheets.insert(href.into());
    }

    /// Make presenting `survey_id` fail.
    pub fn fail_survey(&self, survey_id: impl Into<String>) {
        self.state().failing_surveys.insert(survey_id.into());
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    pub fn is_widget_ready(&self) -> bool {
        self.state().widget_ready
    }

    pub fn stylesheet(&self) -> Option<String> {
        self.state().stylesheet.clone()
    }

    pub fn inline_css(&self) -> Option<String> {
        self.state().inline_css.clone()
    }

    pub fn tokens(&self) -> ThemeTokens {
        self.state().tokens.clone()
    }

    /// Every survey id the widget accepted, oldest first.
    pub fn presented(&self) -> Vec<String> {
        self.state().presented.clone()
    }

    pub fn triggers(&self) -> Vec<String> {
        self.state().triggers.clone()
    }

    pub fn style_of(&self, node: NodeRef) -> Option<ComputedStyle> {
        self.state().node(node).map(|n| n.style.clone())
    }

    fn render_nodes(config: &SimConfig) -> (SimNode, SimNode) {
        let container = SimNode::new()
            .id(WIDGET_CONTAINER_ID)
            .bounds(config.widget_bounds);
        let mut root = SimNode::new()
            .id("_pi_surveyWidget")
            .attr("data-pi-widget-root", "")
            .bounds(config.widget_bounds);
        if let Some(class) = &config.position_class {
            root = root.class(class.clone());
        }
        (container, root)
    }
}

// =============================================================================
// SEAMS
// =============================================================================

impl Document for SimulatedPage {
    fn element_by_id(&self, id: &str) -> Option<NodeRef> {
        let state = self.state();
        let found = state
            .attached_refs()
            .find(|node| state.node(*node).is_some_and(|n| n.id.as_deref() == Some(id)));
        found
    }

    fn query_all(&self, selectors: &[Selector]) -> Vec<NodeRef> {
        let state = self.state();
        let found = state
            .attached_refs()
            .filter(|node| {
                state
                    .node(*node)
                    .is_some_and(|n| selectors.iter().any(|s| n.matches(s)))
            })
            .collect();
        found
    }

    fn query_within(&self, root: NodeRef, selectors: &[Selector]) -> Option<NodeRef> {
        let state = self.state();
        let found = state.attached_refs().find(|node| {
            state.is_descendant(*node, root)
                && state
                    .node(*node)
                    .is_some_and(|n| selectors.iter().any(|s| n.matches(s)))
        });
        found
    }

    fn is_attached(&self, node: NodeRef) -> bool {
        self.state().is_attached(node)
    }

    fn measure(&self, node: NodeRef) -> Option<NodeMetrics> {
        let state = self.state();
        if !state.is_attached(node) {
            return None;
        }
        state.node(node).map(|n| NodeMetrics {
            bounds: n.bounds,
            style: n.style.clone(),
            placement_hint: n.placement_hint(),
            classes: n.classes.clone(),
        })
    }

    fn viewport(&self) -> Viewport {
        self.state().viewport
    }

    fn hide(&self, node: NodeRef) -> bool {
        let mut state = self.state();
        if !state.is_attached(node) {
            return false;
        }
        match state.node_mut(node) {
            Some(n) => {
                n.style.display = "none".into();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl SurveyWidget for SimulatedPage {
    async fn present(&self, survey_id: &str, _force: bool) -> Result<(), WidgetError> {
        let generation = {
            let mut state = self.state();
            if !state.widget_ready {
                return Err(WidgetError::NotMounted);
            }
            if state.failing_surveys.contains(survey_id) {
                return Err(WidgetError::Present {
                    survey_id: survey_id.to_string(),
                    reason: "survey is not eligible".into(),
                });
            }
            state.presented.push(survey_id.to_string());
            state.render_generation += 1;
            state.render_generation
        };

        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let (container, root) = Self::render_nodes(&self.config);
        let delay = self.config.render_delay;
        let survey_id = survey_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = lock(&state);
                if state.render_generation != generation {
                    debug!(survey_id = %survey_id, "Render superseded");
                    return;
                }
                state.clear_rendered();
                let container = state.push(container);
                let root = state.push(root.child_of(container));
                state.rendered = vec![container, root];
            }
            let _ = events.send(PageEvent::Mutation);
        });
        Ok(())
    }

    async fn dismiss(&self) -> Result<(), WidgetError> {
        {
            let mut state = self.state();
            if !state.widget_ready {
                return Err(WidgetError::NotMounted);
            }
            state.render_generation += 1;
            state.clear_rendered();
        }
        self.notify(PageEvent::Mutation);
        Ok(())
    }

    async fn trigger(&self, command: &str, _args: &[Value]) -> Result<(), WidgetError> {
        if !KNOWN_TRIGGERS.contains(&command) {
            return Err(WidgetError::UnknownTrigger(command.to_string()));
        }
        self.state().triggers.push(command.to_string());
        Ok(())
    }
}

#[async_trait]
impl StyleHost for SimulatedPage {
    async fn load_stylesheet(&self, href: Option<&str>) -> Result<(), WidgetError> {
        let mut state = self.state();
        state.stylesheet = None;
        if let Some(href) = href {
            if state.broken_stylesheets.contains(href) {
                return Err(WidgetError::Stylesheet(href.to_string()));
            }
            state.stylesheet = Some(href.to_string());
        }
        Ok(())
    }

    async fn set_inline_css(&self, css: Option<&str>) -> Result<(), WidgetError> {
        self.state().inline_css = css.map(str::to_string);
        Ok(())
    }

    fn apply_tokens(&self, tokens: &ThemeTokens) {
        self.state().tokens = tokens.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nested_nodes_follow_their_parent() {
        let (page, _events) = SimulatedPage::new(SimConfig::default());
        let parent = page.insert(SimNode::new().id("outer"));
        let child = page.insert(SimNode::new().id("inner").child_of(parent));
        assert!(page.is_attached(child));

        page.detach(parent);
        assert!(!page.is_attached(child));
        assert_eq!(page.element_by_id("inner"), None);
    }

    #[tokio::test]
    async fn queries_follow_document_order() {
        let (page, _events) = SimulatedPage::new(SimConfig::default());
        let a = page.insert(SimNode::new().class("pi-widget-modal"));
        let b = page.insert(SimNode::new().attr("data-pi-widget", "1"));
        let found = page.query_all(&[
            Selector::Attribute("data-pi-widget"),
            Selector::Class("pi-widget-modal"),
        ]);
        assert_eq!(found, vec![a, b]);
    }

    #[tokio::test]
    async fn query_within_only_sees_descendants() {
        let (page, _events) = SimulatedPage::new(SimConfig::default());
        let outside = page.insert(SimNode::new().class("pi-widget-inline"));
        let container = page.insert(SimNode::new().id("box"));
        let inside = page.insert(SimNode::new().class("pi-widget-inline").child_of(container));
        let selectors = [Selector::Class("pi-widget-inline")];
        assert_eq!(page.query_within(container, &selectors), Some(inside));
        assert_ne!(page.query_within(container, &selectors), Some(outside));
    }

    #[tokio::test]
    async fn measure_reports_placement_hint() {
        let (page, _events) = SimulatedPage::new(SimConfig::default());
        let node = page.insert(SimNode::new().attr("data-pi-position", "tl"));
        let metrics = page.measure(node).unwrap();
        assert_eq!(metrics.placement_hint.as_deref(), Some("tl"));
    }

    #[tokio::test]
    async fn hide_sets_display_none() {
        let (page, _events) = SimulatedPage::new(SimConfig::default());
        let node = page.insert(SimNode::new().id(WIDGET_CONTAINER_ID));
        assert!(page.hide(node));
        assert_eq!(page.style_of(node).unwrap().display, "none");
    }

    #[tokio::test]
    async fn widget_calls_need_a_ready_widget() {
        let (page, _events) = SimulatedPage::new(SimConfig::default());
        assert_eq!(page.present("42", false).await, Err(WidgetError::NotMounted));
        assert_eq!(page.dismiss().await, Err(WidgetError::NotMounted));
    }

    #[tokio::test(start_paused = true)]
    async fn present_renders_after_delay() {
        let (page, mut events) = SimulatedPage::new(SimConfig::default());
        page.mark_widget_ready();
        assert_eq!(events.recv().await, Some(PageEvent::WidgetReady));

        page.present("42", false).await.unwrap();
        assert_eq!(page.element_by_id("_pi_surveyWidget"), None);

        assert_eq!(events.recv().await, Some(PageEvent::Mutation));
        assert!(page.element_by_id("_pi_surveyWidget").is_some());
        assert_eq!(page.presented(), vec!["42".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_before_render_cancels_it() {
        let (page, _events) = SimulatedPage::new(SimConfig::default());
        page.mark_widget_ready();
        page.present("42", false).await.unwrap();
        page.dismiss().await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(page.element_by_id(WIDGET_CONTAINER_ID), None);
    }

    #[tokio::test]
    async fn unknown_trigger_is_rejected() {
        let (page, _events) = SimulatedPage::new(SimConfig::default());
        assert!(page.trigger("exit-intent", &[]).await.is_ok());
        assert_eq!(
            page.trigger("moon-phase", &[]).await,
            Err(WidgetError::UnknownTrigger("moon-phase".into()))
        );
        assert_eq!(page.triggers(), vec!["exit-intent".to_string()]);
    }

    #[tokio::test]
    async fn broken_stylesheet_fails_and_clears() {
        let (page, _events) = SimulatedPage::new(SimConfig::default());
        page.load_stylesheet(Some("https://cdn.example/a.css")).await.unwrap();
        page.break_stylesheet("https://cdn.example/b.css");
        assert!(page.load_stylesheet(Some("https://cdn.example/b.css")).await.is_err());
        assert_eq!(page.stylesheet(), None);
    }
}
