//! Wire protocol shared by the host-side bridge and the embedded player.
//!
//! Every message on the cross-window channel is an [`Envelope`]:
//! `{ v, id?, type, payload?, origin }`. This crate owns:
//! - The envelope codec and message kinds
//! - Typed payloads for each command and reply
//! - The closed set of error codes
//! - Capability sets exchanged during `hello`
//! - The cross-window channel abstraction (windows, proxies, origin filters)

pub mod capabilities;
pub mod channel;
pub mod envelope;
pub mod errors;
pub mod geometry;
pub mod payloads;

pub use capabilities::CapabilitySet;
pub use channel::{
    ChannelError, InboundFilter, InboundMessage, PostTarget, Window, WindowId, WindowProxy,
};
pub use envelope::{DecodeError, Endpoint, Envelope, MessageKind, PROTOCOL_VERSION};
pub use errors::{ErrorCode, ErrorPayload};
pub use geometry::{GeometrySnapshot, Placement, WidgetGeometry};
pub use payloads::{
    ApplyThemePayload, HelloPayload, InitPayload, PresentPayload, ReadyPayload,
    SetPlacementPayload, StatusPayload, ThemeTokens, TriggerPayload,
};
