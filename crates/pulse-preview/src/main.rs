//! pulse-preview: run the bridge and the survey player side by side in one
//! process.
//!
//! The controller mounts a loopback frame whose player runs against a
//! simulated page, then plays a short script (initialize, theme, present,
//! dismiss, teardown). Every observer event is printed to stdout as a JSON
//! line; logs go to stderr.

mod cli;
mod frame;
mod session;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use pulse_bridge::{Bridge, BridgeOptions, FrameTarget};
use pulse_config::PulseConfig;
use pulse_player::PlayerOptions;
use pulse_protocol::Window;
use tracing_subscriber::EnvFilter;

use crate::frame::{LoopbackHost, PlayerBehavior};
use crate::session::Script;

fn load_config(args: &cli::Args) -> (PulseConfig, Option<String>) {
    let loaded = match &args.config {
        Some(path) => pulse_config::toml_loader::load_from_path(path),
        None => pulse_config::load_config(),
    };
    let (mut config, failure) = match loaded {
        Ok(config) => (config, None),
        Err(e) => (PulseConfig::default(), Some(e.to_string())),
    };
    args.apply_to(&mut config);
    (config, failure)
}

fn init_logging(args: &cli::Args, config: &PulseConfig) {
    let fallback = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.as_directive().to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    let (config, config_failure) = load_config(&args);
    init_logging(&args, &config);

    tracing::info!("pulse-preview v{} starting", env!("CARGO_PKG_VERSION"));
    if let Some(e) = config_failure {
        tracing::warn!("Config load failed, using defaults: {e}");
    }

    let behavior = if args.unresponsive {
        PlayerBehavior::Unresponsive
    } else {
        PlayerBehavior::Responsive {
            widget_delay: Duration::from_millis(args.widget_delay_ms),
        }
    };
    let options = BridgeOptions::from_config(&config);
    let (host, inbox) = Window::open(options.host_origin.clone());
    let frames = Arc::new(LoopbackHost::new(
        host,
        PlayerOptions::from_config(&config),
        behavior,
    ));
    let bridge = Bridge::spawn(options, frames, inbox);
    let printer = session::print_events(&bridge);

    let script = Script::from_args(&args);
    let outcome = session::run(&bridge, FrameTarget::new(args.src.clone()), &script).await;
    bridge.teardown().await;
    if tokio::time::timeout(Duration::from_secs(1), printer).await.is_err() {
        tracing::debug!("Event printer did not finish");
    }

    match outcome {
        Ok(()) => {
            tracing::info!("Session complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(code = %e.code(), "Session aborted: {e}");
            ExitCode::FAILURE
        }
    }
}
