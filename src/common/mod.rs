//! Common utilities and types shared across the application.

pub mod clock;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, GatewayError, GatewayResult};
pub use types::{ChatMode, GameMessage, GroupId, MessageKind, OwnerId};
