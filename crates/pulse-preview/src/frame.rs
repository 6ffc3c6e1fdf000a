//! In-process frame host: each mount opens a player window backed by a
//! simulated page.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use pulse_bridge::{derive_player_origin, BridgeError, FrameHandle, FrameHost, FrameTarget};
use pulse_player::{PageSeams, ParentLink, Player, PlayerOptions, SimConfig, SimulatedPage};
use pulse_protocol::{InboundMessage, Window, WindowId};
use tokio::sync::mpsc;
use tracing::info;

/// How the mounted player behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerBehavior {
    /// A working player whose widget finishes loading after `widget_delay`.
    Responsive { widget_delay: Duration },
    /// The frame loads but nothing inside it ever answers.
    Unresponsive,
}

struct Mounted {
    window: WindowId,
    _player: Option<Player>,
    _silent_inbox: Option<mpsc::UnboundedReceiver<InboundMessage>>,
}

pub struct LoopbackHost {
    host: Window,
    player: PlayerOptions,
    behavior: PlayerBehavior,
    mounted: Mutex<Option<Mounted>>,
}

impl LoopbackHost {
    /// `host` is the window the controller lives in.
    pub fn new(host: Window, player: PlayerOptions, behavior: PlayerBehavior) -> Self {
        Self {
            host,
            player,
            behavior,
            mounted: Mutex::new(None),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Mounted>> {
        self.mounted.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FrameHost for LoopbackHost {
    fn mount(&self, target: &FrameTarget) -> Result<FrameHandle, BridgeError> {
        let origin = derive_player_origin(&target.src, self.host.origin())?;
        let (window, inbox) = Window::open(origin.clone());

        let mounted = match self.behavior {
            PlayerBehavior::Unresponsive => {
                info!(origin = %origin, "Mounted a silent frame");
                Mounted {
                    window: window.id(),
                    _player: None,
                    _silent_inbox: Some(inbox),
                }
            }
            PlayerBehavior::Responsive { widget_delay } => {
                let (page, page_events) = SimulatedPage::new(SimConfig::default());
                if widget_delay.is_zero() {
                    page.mark_widget_ready();
                } else {
                    page.boot_after(widget_delay);
                }
                let parent = ParentLink::from_proxy(self.host.proxy_from(&window));
                let player = Player::spawn(
                    self.player.clone(),
                    PageSeams::from_page(page),
                    parent,
                    inbox,
                    page_events,
                );
                info!(
                    origin = %origin,
                    widget_delay_ms = widget_delay.as_millis() as u64,
                    "Mounted player"
                );
                Mounted {
                    window: window.id(),
                    _player: Some(player),
                    _silent_inbox: None,
                }
            }
        };

        *self.slot() = Some(mounted);
        Ok(FrameHandle {
            window: window.id(),
            port: Arc::new(window.proxy_from(&self.host)),
            src: target.src.clone(),
        })
    }

    fn unmount(&self, handle: &FrameHandle) {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|m| m.window == handle.window) {
            *slot = None;
            info!(src = %handle.src, "Unmounted player");
        }
    }
}
