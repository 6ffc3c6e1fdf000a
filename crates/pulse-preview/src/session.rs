//! The scripted preview session.

use std::time::Duration;

use pulse_bridge::{Bridge, BridgeError, BridgeEvent, FrameTarget, OperationResult};
use pulse_protocol::{ApplyThemePayload, ThemeTokens};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cli::Args;

/// What the session does once the player is up.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub survey: String,
    pub theme: Option<ApplyThemePayload>,
    pub placement: Option<String>,
    pub linger: Duration,
}

impl Script {
    pub fn from_args(args: &Args) -> Self {
        let tokens = args.brand.as_ref().map(|brand| ThemeTokens {
            brand: Some(brand.clone()),
            ..Default::default()
        });
        let theme = (args.theme.is_some() || tokens.is_some()).then(|| ApplyThemePayload {
            href: args.theme.clone().map(Some),
            css: None,
            tokens,
        });
        Self {
            survey: args.survey.clone(),
            theme,
            placement: args.placement.clone(),
            linger: Duration::from_millis(args.linger_ms),
        }
    }
}

/// Initialize, theme, present and dismiss. Command failures are reported
/// and the script carries on; only a failed handshake ends it early.
pub async fn run(bridge: &Bridge, target: FrameTarget, script: &Script) -> Result<(), BridgeError> {
    bridge.initialize(target).await?;
    info!("Player ready");

    if let Some(theme) = &script.theme {
        report("applyTheme", bridge.apply_theme(theme.clone()).await);
    }
    if let Some(placement) = &script.placement {
        report("setPlacement", bridge.set_placement(placement).await);
    }
    report("present", bridge.present(&script.survey, false).await);
    tokio::time::sleep(script.linger).await;
    report("dismiss", bridge.dismiss().await);
    Ok(())
}

fn report(command: &str, result: OperationResult) {
    match result {
        Ok(status) => {
            let status = serde_json::to_string(&status).unwrap_or_default();
            info!(command, status = %status, "Command acknowledged");
        }
        Err(e) => warn!(
            command,
            code = %e.code(),
            recoverable = e.is_recoverable(),
            error = %e,
            "Command failed"
        ),
    }
}

/// Print every observer event as one JSON line until the bridge closes.
pub fn print_events(bridge: &Bridge) -> JoinHandle<()> {
    let mut events = bridge.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    println!("{}", serde_json::to_string(&event).unwrap_or_default());
                    if event == BridgeEvent::Close {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event printer fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use clap::Parser;
    use pulse_bridge::{BridgeOptions, ControllerState};
    use pulse_player::PlayerOptions;
    use pulse_protocol::{ErrorCode, Window};

    use super::*;
    use crate::frame::{LoopbackHost, PlayerBehavior};

    fn start(behavior: PlayerBehavior, options: BridgeOptions) -> (Bridge, Arc<LoopbackHost>) {
        let (host, inbox) = Window::open(options.host_origin.clone());
        let frames = Arc::new(LoopbackHost::new(host, PlayerOptions::default(), behavior));
        let bridge = Bridge::spawn(options, frames.clone(), inbox);
        (bridge, frames)
    }

    fn script() -> Script {
        Script {
            survey: "1234".into(),
            theme: Some(ApplyThemePayload::stylesheet("https://cdn.example/theme.css")),
            placement: Some("tl".into()),
            linger: Duration::from_millis(500),
        }
    }

    fn collect(mut events: tokio::sync::broadcast::Receiver<BridgeEvent>) -> Vec<BridgeEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        seen
    }

    #[test]
    fn script_builds_theme_from_switches() {
        let args = Args::try_parse_from(["pulse-preview", "--brand", "#00ff00"]).unwrap();
        let script = Script::from_args(&args);
        let theme = script.theme.unwrap();
        assert_eq!(theme.href, None);
        assert_eq!(theme.tokens.unwrap().brand.as_deref(), Some("#00ff00"));

        let bare = Script::from_args(&Args::try_parse_from(["pulse-preview"]).unwrap());
        assert_eq!(bare.theme, None);
    }

    #[tokio::test(start_paused = true)]
    async fn full_session_against_a_responsive_player() {
        let responsive = PlayerBehavior::Responsive {
            widget_delay: Duration::ZERO,
        };
        let (bridge, frames) = start(responsive, BridgeOptions::default());
        let events = bridge.subscribe();

        run(&bridge, FrameTarget::new("/player/index.html"), &script())
            .await
            .unwrap();
        assert_eq!(bridge.state(), ControllerState::Idle);
        assert!(frames.is_mounted());

        bridge.teardown().await;
        assert!(!frames.is_mounted());

        let seen = collect(events);
        assert_eq!(seen.iter().filter(|e| **e == BridgeEvent::Ready).count(), 1);
        assert!(seen.iter().any(|e| matches!(
            e,
            BridgeEvent::Status(status) if status.event.as_deref() == Some("present-called")
        )));
        assert!(seen.iter().all(|e| !matches!(e, BridgeEvent::Error(_))));
        assert_eq!(seen.last(), Some(&BridgeEvent::Close));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_frame_fails_the_handshake() {
        let (bridge, _frames) = start(PlayerBehavior::Unresponsive, BridgeOptions::default());

        let err = run(&bridge, FrameTarget::new("/player/index.html"), &script())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PlayerTimeout);
        bridge.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_widget_still_presents() {
        let slow = PlayerBehavior::Responsive {
            widget_delay: Duration::from_millis(1500),
        };
        let (bridge, _frames) = start(slow, BridgeOptions::default());

        bridge
            .initialize(FrameTarget::new("/player/index.html"))
            .await
            .unwrap();
        let status = bridge.present("1234", false).await.unwrap();
        assert_eq!(status.event.as_deref(), Some("present-called"));
        assert!(status.widget.is_some_and(|w| w.visible));
        bridge.teardown().await;
    }
}
