//! Full configuration validation.
//!
//! Validates timeout ranges, origin formats and the present-wait window,
//! collecting every problem into a single `ConfigError`.

use crate::schema::{BridgeConfig, InitConfig, PlayerConfig, PulseConfig};
use pulse_common::ConfigError;


/// Run all validations on a config, collecting all errors.
pub fn validate(config: &PulseConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_bridge(&mut errors, &config.bridge);
    validate_init(&mut errors, &config.init);
    validate_player(&mut errors, &config.player);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_bridge(errors: &mut Vec<String>, bridge: &BridgeConfig) {
    validate_range(errors, "bridge.ack_timeout_ms", bridge.ack_timeout_ms, 50, 60_000);
    validate_range(
        errors,
        "bridge.handshake_timeout_ms",
        bridge.handshake_timeout_ms,
        100,
        120_000,
    );
    validate_range(
        errors,
        "bridge.heartbeat_interval_ms",
        bridge.heartbeat_interval_ms,
        100,
        600_000,
    );
    validate_origin(errors, "bridge.host_origin", &bridge.host_origin);
    if let Some(origin) = bridge.explicit_player_origin() {
        validate_origin(errors, "bridge.player_origin", origin);
    }
}

fn validate_init(errors: &mut Vec<String>, init: &InitConfig) {
    if let Some(density) = init.density {
        validate_range_f64(errors, "init.density", density, 0.0, 4.0);
    }
    if let Some(density) = init.tokens.density {
        validate_range_f64(errors, "init.tokens.density", density, 0.0, 4.0);
    }
    if let Some(radius) = init.tokens.radius {
        validate_range_f64(errors, "init.tokens.radius", radius, 0.0, 64.0);
    }
    if matches!(&init.placement, Some(p) if p.trim().is_empty()) {
        errors.push("init.placement must not be blank".into());
    }
}

fn validate_player(errors: &mut Vec<String>, player: &PlayerConfig) {
    validate_range(
        errors,
        "player.present_wait_min_ms",
        player.present_wait_min_ms,
        100,
        30_000,
    );
    validate_range(
        errors,
        "player.present_wait_max_ms",
        player.present_wait_max_ms,
        100,
        30_000,
    );
    if player.present_wait_min_ms > player.present_wait_max_ms {
        errors.push(format!(
            "player.present_wait_min_ms ({}) exceeds player.present_wait_max_ms ({})",
            player.present_wait_min_ms, player.present_wait_max_ms
        ));
    }
    if player.fast_page_ms >= player.slow_page_ms {
        errors.push(format!(
            "player.fast_page_ms ({}) must be below player.slow_page_ms ({})",
            player.fast_page_ms, player.slow_page_ms
        ));
    }
    validate_range(errors, "player.viewport_poll_ms", player.viewport_poll_ms, 50, 10_000);
    if player.default_placement.trim().is_empty() {
        errors.push("player.default_placement must not be blank".into());
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Push an error if `value` is outside `[min, max]` (integer).
fn validate_range(errors: &mut Vec<String>, name: &str, value: u64, min: u64, max: u64) {
    if value < min || value > max {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

/// Push an error if `value` is outside `[min, max]` (float).
fn validate_range_f64(errors: &mut Vec<String>, name: &str, value: f64, min: f64, max: f64) {
    if !(min..=max).contains(&value) {
        errors.push(format!("{name} = {value} is out of range [{min}, {max}]"));
    }
}

/// Push an error unless `value` looks like `scheme://host[:port]` with no path.
fn validate_origin(errors: &mut Vec<String>, name: &str, value: &str) {
    let Some((scheme, rest)) = value.split_once("://") else {
        errors.push(format!("{name} = '{value}' is not an origin (missing scheme)"));
        return;
    };
    let scheme_ok = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !scheme_ok {
        errors.push(format!("{name} = '{value}' has an invalid scheme"));
        return;
    }
    if rest.is_empty() || rest.contains('/') {
        errors.push(format!("{name} = '{value}' must not contain a path"));
    }
}
