//! Host-side controller.
//!
//! A [`Bridge`] handle fronts one background task that owns the player
//! frame, performs the `hello`/`init`/`ready` handshake, correlates every
//! command with its acknowledgement and probes the player with periodic
//! pings. Callers get one future per command; observers get state changes,
//! statuses and errors through [`Bridge::subscribe`].

mod actor;
mod client;
mod handler;
mod types;


pub use client::{Bridge, BridgeOptions};
