//! TOML config file loading and creation.

use crate::schema::PulseConfig;
use crate::validation;
use pulse_common::ConfigError;
use std::path::{Path, PathBuf};
use tracing::{info, warn};


/// Load config from a specific TOML file path.
///
/// Deserializes the file using serde defaults for any missing fields.
/// After loading, the config is validated; if validation fails, a warning
/// is logged and the default config is returned.
pub fn load_from_path(path: &Path) -> Result<PulseConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::ParseError(format!("failed to read {}: {e}", path.display()))
    })?;

    let config = parse_str(&content)?;

    if let Err(e) = validation::validate(&config) {
        warn!("config validation warning: {e}");
        warn!("falling back to default config");
        return Ok(PulseConfig::default());
    }

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Parse config from TOML text without validating it.
pub fn parse_str(content: &str) -> Result<PulseConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))
}

/// Load config from the platform-specific default path.
///
/// On macOS: `~/Library/Application Support/pulse-bridge/config.toml`
/// On Linux: `~/.config/pulse-bridge/config.toml`
///
/// If the file does not exist, creates a default config file and returns defaults.
pub fn load_default() -> Result<PulseConfig, ConfigError> {
    let path = default_config_path()?;

    if !path.exists() {
        info!("no config found at {}, creating default", path.display());
        create_default_config(&path)?;
        return Ok(PulseConfig::default());
    }

    load_from_path(&path)
}

/// Get the platform-specific default config file path.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        ConfigError::ParseError("could not determine config directory".into())
    })?;
    Ok(config_dir.join("pulse-bridge").join("config.toml"))
}

/// Create a default TOML config file with documentation comments.
pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConfigError::ParseError(format!(
                "failed to create config directory {}: {e}",
                parent.display()
            ))
        })?;
    }

    std::fs::write(path, default_config_toml()).map_err(|e| {
        ConfigError::ParseError(format!(
            "failed to write default config to {}: {e}",
            path.display()
        ))
    })?;

    info!("created default config at {}", path.display());
    Ok(())
}

/// Generate the default TOML config content with comments.
fn default_config_toml() -> &'static str {
    r##"# Pulse Bridge Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[bridge]
# host_origin = "http://localhost:3000"
# player_origin = ""            # empty: derived from the frame src
# ack_timeout_ms = 3000         # 50-60000
# handshake_timeout_ms = 5000   # 100-120000
# heartbeat_interval_ms = 30000 # 100-600000
# compat_implicit_ack = true
# debug = false

[init]
# placement = "BR"
# density = 1.0

[init.tokens]
# brand = "#0055ff"
# radius = 8
# density = 1.0

[player]
# player_version = "2025-10-09-01"
# default_placement = "BR"
# present_wait_min_ms = 4000
# present_wait_max_ms = 6000
# fast_page_ms = 1000
# slow_page_ms = 4000
# viewport_poll_ms = 500        # 50-10000
# debug = false

[logging]
# level = "info"                # trace, debug, info, warn, error
"##
}
