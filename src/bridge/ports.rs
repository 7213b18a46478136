//! Collaborator contracts the bridge is wired against.
//!
//! The bridge never talks HTTP itself; the binary plugs in the adapters from
//! `crate::adapters`, tests plug in in-memory fakes.

use async_trait::async_trait;

use crate::common::error::GatewayResult;
use crate::common::types::{GroupId, OwnerId};

/// Read side of the server-management API.
#[async_trait]
pub trait SourcePoller: Send + Sync {
    /// Names of all configured clusters.
    async fn list_clusters(&self) -> GatewayResult<Vec<String>>;

    /// Names of the worlds hosted by `cluster_id`.
    async fn list_worlds(&self, cluster_id: &str) -> GatewayResult<Vec<String>>;

    /// The most recent `max_lines` chat log lines of a world, oldest first.
    async fn fetch_chat_lines(
        &self,
        cluster_id: &str,
        world_id: &str,
        max_lines: usize,
    ) -> GatewayResult<Vec<String>>;
}

/// Write side: announcements into the game and messages onto the platform.
#[async_trait]
pub trait OutboundGateway: Send + Sync {
    async fn send_announce(&self, cluster_id: &str, world_id: &str, text: &str) -> GatewayResult<()>;

    async fn send_private(&self, owner_id: OwnerId, text: &str) -> GatewayResult<()>;

    async fn send_group(&self, group_id: GroupId, text: &str) -> GatewayResult<()>;
}

/// Append-only record of messages relayed into the game.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn append_outbound(
        &self,
        owner_id: OwnerId,
        display_name: &str,
        content: &str,
    ) -> GatewayResult<()>;
}

/// A sink that keeps nothing, for deployments without history.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardHistory;

#[async_trait]
impl HistorySink for DiscardHistory {
    async fn append_outbound(&self, _: OwnerId, _: &str, _: &str) -> GatewayResult<()> {
        Ok(())
    }
}
