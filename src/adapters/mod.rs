//! Concrete collaborators for the binary: HTTP clients and the history file.

pub mod dmp;
pub mod gateway;
pub mod history;
pub mod onebot;

use std::time::Duration;

use crate::common::error::GatewayResult;

pub use dmp::DmpClient;
pub use gateway::HttpGateway;
pub use history::JsonlHistorySink;
pub use onebot::OneBotClient;

/// Connect timeout is capped separately so a dead host fails fast.
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a reqwest client with timeout settings.
pub(crate) fn build_http_client(timeout: Duration) -> GatewayResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(MAX_CONNECT_TIMEOUT))
        .build()?;
    Ok(client)
}

/// Join a base URL and an absolute path without doubling the slash.
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}
