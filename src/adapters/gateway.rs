//! Outbound gateway backed by the management API and the OneBot endpoint.

use std::sync::Arc;

use async_trait::async_trait;

use crate::bridge::ports::OutboundGateway;
use crate::common::error::GatewayResult;
use crate::common::types::{GroupId, OwnerId};

use super::dmp::DmpClient;
use super::onebot::OneBotClient;

/// Game announcements go through `game`, platform messages through `platform`.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    game: Arc<DmpClient>,
    platform: OneBotClient,
}

impl HttpGateway {
    pub fn new(game: Arc<DmpClient>, platform: OneBotClient) -> Self {
        Self { game, platform }
    }
}

#[async_trait]
impl OutboundGateway for HttpGateway {
    async fn send_announce(&self, cluster_id: &str, world_id: &str, text: &str) -> GatewayResult<()> {
        self.game.announce(cluster_id, world_id, text).await
    }

    async fn send_private(&self, owner_id: OwnerId, text: &str) -> GatewayResult<()> {
        self.platform.send_private_msg(owner_id, text).await
    }

    async fn send_group(&self, group_id: GroupId, text: &str) -> GatewayResult<()> {
        self.platform.send_group_msg(group_id, text).await
    }
}
