//! Configuration schema types for the Pulse bridge.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Timeouts are stored in milliseconds and exposed as [`Duration`]s.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

// =============================================================================
// Bridge (host side)
// =============================================================================

/// Host-side controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Origin of the hosting page. Used as the sender origin of every
    /// envelope the controller posts.
    pub host_origin: String,
    /// Expected origin of the player frame. Empty means derive it from the
    /// frame `src`.
    pub player_origin: String,
    /// Per-command acknowledgement timeout (valid range: 50-60000).
    pub ack_timeout_ms: u64,
    /// Handshake timeout, from mount until `ready` (valid range: 100-120000).
    pub handshake_timeout_ms: u64,
    /// Liveness ping interval (valid range: 100-600000).
    pub heartbeat_interval_ms: u64,
    /// Resolve ack timeouts with the last unsolicited status when one exists.
    pub compat_implicit_ack: bool,
    /// Log every envelope sent and received.
    pub debug: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host_origin: "http://localhost:3000".into(),
            player_origin: String::new(),
            ack_timeout_ms: 3000,
            handshake_timeout_ms: 5000,
            heartbeat_interval_ms: 30_000,
            compat_implicit_ack: true,
            debug: false,
        }
    }
}

impl BridgeConfig {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// The configured player origin, if one was set explicitly.
    pub fn explicit_player_origin(&self) -> Option<&str> {
        let trimmed = self.player_origin.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

// =============================================================================
// Init (bootstrap parameters)
// =============================================================================

/// Theme tokens forwarded to the player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
}

impl TokenConfig {
    pub fn is_empty(&self) -> bool {
        self.brand.is_none() && self.radius.is_none() && self.density.is_none()
    }
}

/// Parameters sent to the player in the `init` envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InitConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
    pub tokens: TokenConfig,
}

// =============================================================================
// Player (responder side)
// =============================================================================

/// Player-side command processor and visibility tracker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Version string announced in `hello` and `ready`.
    pub player_version: String,
    /// Placement used until the widget or the host says otherwise.
    pub default_placement: String,
    /// Shortest wait for a visible widget after `present`.
    pub present_wait_min_ms: u64,
    /// Longest wait for a visible widget after `present`.
    pub present_wait_max_ms: u64,
    /// Widget readiness latency at or below which the page counts as fast.
    pub fast_page_ms: u64,
    /// Widget readiness latency at or above which the page counts as slow.
    pub slow_page_ms: u64,
    /// Fallback viewport poll interval (valid range: 50-10000).
    pub viewport_poll_ms: u64,
    /// Log every envelope sent and received.
    pub debug: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            player_version: "2025-10-09-01".into(),
            default_placement: "BR".into(),
            present_wait_min_ms: 4000,
            present_wait_max_ms: 6000,
            fast_page_ms: 1000,
            slow_page_ms: 4000,
            viewport_poll_ms: 500,
            debug: false,
        }
    }
}

impl PlayerConfig {
    pub fn viewport_poll(&self) -> Duration {
        Duration::from_millis(self.viewport_poll_ms)
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

// =============================================================================
// Root
// =============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub bridge: BridgeConfig,
    pub init: InitConfig,
    pub player: PlayerConfig,
    pub logging: LoggingConfig,
}
