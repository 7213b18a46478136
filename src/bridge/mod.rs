//! Bridge between the game's chat logs and the messaging platform.
//!
//! ## Module Structure
//!
//! - `parser`: Raw log line to `GameMessage`
//! - `filter`: Inbound and outbound content policy
//! - `dedup`: Sliding-window duplicate suppression
//! - `session`: Owner and group session registry
//! - `formatter`: Placeholder templates and batch rendering
//! - `ports`: Traits the bridge is wired against
//! - `orchestrator`: Poll loop, session commands and relay (`Bridge` struct)

pub mod dedup;
pub mod filter;
pub mod formatter;
pub mod orchestrator;
pub mod parser;
pub mod ports;
pub mod session;

// Re-export main types for convenience
pub use dedup::MessageDeduplicator;
pub use filter::{FilterPolicy, MessageFilter, RejectReason};
pub use formatter::{BatchFormatter, FormatContext, MessageFormatter};
pub use orchestrator::{
    Bridge, BridgeDeps, BridgeStatus, CycleReport, GlobalStats, RelayOutcome, StartOutcome,
    StopOutcome, SwitchOutcome,
};
pub use ports::{DiscardHistory, HistorySink, OutboundGateway, SourcePoller};
pub use session::{Session, UserSessionManager, WorldTarget};
