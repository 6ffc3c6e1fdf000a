pub mod errors;
pub mod id;
pub mod types;

pub use errors::ConfigError;
pub use id::CorrelationId;
pub use types::{Bounds, Viewport};
