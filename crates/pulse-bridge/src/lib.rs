//! Host-side half of the pulse bridge.
//!
//! Mounts the survey player frame, drives it with correlated commands and
//! recovers from timeouts. See [`Bridge`] for the public API.

pub mod controller;
pub mod error;
pub mod events;
pub mod frame;
pub mod heartbeat;
pub mod pending;
pub mod state;

pub use controller::{Bridge, BridgeOptions};
pub use error::BridgeError;
pub use events::BridgeEvent;
pub use frame::{derive_player_origin, FrameHandle, FrameHost, FrameTarget};
pub use pending::OperationResult;
pub use state::{ControllerState, StateChange};
