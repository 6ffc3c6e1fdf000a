//! Player tuning and the link back to the host window.

use std::sync::Arc;
use std::time::Duration;

use pulse_config::{PlayerConfig, PulseConfig};
use pulse_protocol::{
    CapabilitySet, ChannelError, InboundFilter, Placement, PostTarget, WindowId, WindowProxy,
};
use serde_json::Value;

/// How long `present` waits for a visible widget.
///
/// Pages whose widget came up quickly get the short wait; slow pages get
/// the long one, with a linear ramp in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentWait {
    pub min: Duration,
    pub max: Duration,
    /// Widget readiness latency at or below which the page counts as fast.
    pub fast_page: Duration,
    /// Widget readiness latency at or above which the page counts as slow.
    pub slow_page: Duration,
}

impl PresentWait {
    pub fn from_config(player: &PlayerConfig) -> Self {
        Self {
            min: Duration::from_millis(player.present_wait_min_ms),
            max: Duration::from_millis(player.present_wait_max_ms),
            fast_page: Duration::from_millis(player.fast_page_ms),
            slow_page: Duration::from_millis(player.slow_page_ms),
        }
    }

    /// The wait for a page whose widget took `latency` to become ready.
    /// Unknown latency gets the longest wait.
    pub fn for_latency(&self, latency: Option<Duration>) -> Duration {
        let Some(latency) = latency else {
            return self.max;
        };
        if latency <= self.fast_page {
            return self.min;
        }
        if latency >= self.slow_page {
            return self.max;
        }
        let span = (self.slow_page - self.fast_page).as_secs_f64();
        let progress = (latency - self.fast_page).as_secs_f64() / span;
        self.min + self.max.saturating_sub(self.min).mul_f64(progress)
    }
}

impl Default for PresentWait {
    fn default() -> Self {
        Self::from_config(&PlayerConfig::default())
    }
}

/// Player tuning, usually built from [`PulseConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerOptions {
    /// Announced in `hello` and `ready`.
    pub player_version: String,
    /// Placement until the host or the widget says otherwise.
    pub placement: Placement,
    pub present_wait: PresentWait,
    pub viewport_poll: Duration,
    /// Commands this player executes; everything else is `unknown_cmd`.
    pub capabilities: CapabilitySet,
    pub debug: bool,
}

impl PlayerOptions {
    pub fn from_config(config: &PulseConfig) -> Self {
        let player = &config.player;
        Self {
            player_version: player.player_version.clone(),
            placement: Placement::parse(&player.default_placement).unwrap_or_default(),
            present_wait: PresentWait::from_config(player),
            viewport_poll: player.viewport_poll(),
            capabilities: CapabilitySet::commands(),
            debug: player.debug,
        }
    }
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self::from_config(&PulseConfig::default())
    }
}

/// The player's view of its parent: where replies go and the only window
/// commands are accepted from.
#[derive(Clone)]
pub struct ParentLink {
    port: Arc<dyn PostTarget>,
    origin: String,
    window: WindowId,
}

impl ParentLink {
    pub fn new(port: Arc<dyn PostTarget>, origin: impl Into<String>, window: WindowId) -> Self {
        Self {
            port,
            origin: origin.into(),
            window,
        }
    }

    /// Link through a proxy onto the parent window.
    pub fn from_proxy(proxy: WindowProxy) -> Self {
        let origin = proxy.target_origin().to_string();
        let window = proxy.target_id();
        Self::new(Arc::new(proxy), origin, window)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub(crate) fn filter(&self) -> InboundFilter {
        InboundFilter::new(self.origin.clone(), self.window)
    }

    /// Post with the parent's exact origin as the target.
    pub(crate) fn post(&self, data: Value) -> Result<(), ChannelError> {
        self.port.post_message(data, &self.origin)
    }
}

impl std::fmt::Debug for ParentLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParentLink")
            .field("origin", &self.origin)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait() -> PresentWait {
        PresentWait {
            min: Duration::from_millis(4000),
            max: Duration::from_millis(6000),
            fast_page: Duration::from_millis(1000),
            slow_page: Duration::from_millis(4000),
        }
    }

    #[test]
    fn fast_pages_get_the_short_wait() {
        assert_eq!(wait().for_latency(Some(Duration::ZERO)), Duration::from_millis(4000));
        assert_eq!(
            wait().for_latency(Some(Duration::from_millis(1000))),
            Duration::from_millis(4000)
        );
    }

    #[test]
    fn slow_and_unknown_pages_get_the_long_wait() {
        assert_eq!(
            wait().for_latency(Some(Duration::from_secs(9))),
            Duration::from_millis(6000)
        );
        assert_eq!(wait().for_latency(None), Duration::from_millis(6000));
    }

    #[test]
    fn wait_ramps_between_fast_and_slow() {
        let mid = wait().for_latency(Some(Duration::from_millis(2500)));
        assert!(mid > Duration::from_millis(4990) && mid < Duration::from_millis(5010));
    }

    #[test]
    fn options_follow_config() {
        let mut config = PulseConfig::default();
        config.player.default_placement = " tl ".into();
        config.player.present_wait_min_ms = 1500;
        let options = PlayerOptions::from_config(&config);
        assert_eq!(options.placement.as_str(), "TL");
        assert_eq!(options.present_wait.min, Duration::from_millis(1500));
        assert_eq!(options.capabilities.len(), 7);
    }

    #[test]
    fn blank_placement_falls_back_to_bottom_right() {
        let mut config = PulseConfig::default();
        config.player.default_placement = "  ".into();
        assert_eq!(PlayerOptions::from_config(&config).placement.as_str(), "BR");
    }

    #[test]
    fn parent_link_targets_the_parent_window() {
        let (host, _host_inbox) = pulse_protocol::Window::open("https://host.example");
        let (player, _player_inbox) = pulse_protocol::Window::open("https://player.example");
        let link = ParentLink::from_proxy(host.proxy_from(&player));
        assert_eq!(link.origin(), "https://host.example");
        assert_eq!(link.window(), host.id());
    }
}
