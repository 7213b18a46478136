//! OneBot v11 HTTP client for the messaging platform.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::error::{GatewayError, GatewayResult};
use crate::common::types::{GroupId, OwnerId};
use crate::config::types::PlatformConfig;

use super::{build_http_client, join_url};

#[derive(Debug, Serialize)]
struct PrivateMessage<'a> {
    user_id: OwnerId,
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct GroupMessage<'a> {
    group_id: GroupId,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ActionResponse {
    status: String,
    retcode: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    wording: String,
}

impl ActionResponse {
    fn check(self, operation: &'static str) -> GatewayResult<()> {
        if self.retcode == 0 && self.status != "failed" {
            return Ok(());
        }
        let message = if self.wording.is_empty() {
            self.message
        } else {
            self.wording
        };
        Err(GatewayError::Api {
            operation,
            code: self.retcode,
            message,
        })
    }
}

/// Sends private and group messages through a OneBot HTTP endpoint.
#[derive(Debug, Clone)]
pub struct OneBotClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl OneBotClient {
    pub fn new(config: &PlatformConfig, timeout: Duration) -> GatewayResult<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: config.base_url.clone(),
            access_token: config.access_token.clone().filter(|t| !t.is_empty()),
        })
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        action: &str,
        body: &B,
    ) -> GatewayResult<()> {
        let mut request = self.http.post(join_url(&self.base_url, action)).json(body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response: ActionResponse = request.send().await?.error_for_status()?.json().await?;
        response.check(operation)
    }

    pub async fn send_private_msg(&self, user_id: OwnerId, message: &str) -> GatewayResult<()> {
        self.call("send_private", "/send_private_msg", &PrivateMessage { user_id, message })
            .await?;
        debug!(user_id, "Private message sent");
        Ok(())
    }

    pub async fn send_group_msg(&self, group_id: GroupId, message: &str) -> GatewayResult<()> {
        self.call("send_group", "/send_group_msg", &GroupMessage { group_id, message })
            .await?;
        debug!(group_id, "Group message sent");
        Ok(())
    }
}
