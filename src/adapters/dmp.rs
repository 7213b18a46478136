//! Client for the dedicated-server management API.
//!
//! Every response is wrapped in a `{code, message, data}` envelope; anything
//! other than code 200 is reported as [`GatewayError::Api`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bridge::ports::SourcePoller;
use crate::common::error::{GatewayError, GatewayResult};
use crate::config::types::ApiConfig;

use super::{build_http_client, join_url};

const SUCCESS_CODE: i64 = 200;
const DEFAULT_LANGUAGE: &str = "zh";
const LANGUAGE_HEADER: &str = "X-I18n-Lang";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(alias = "msg")]
    message: Option<String>,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_data(self, operation: &'static str) -> GatewayResult<Option<T>> {
        if self.code != SUCCESS_CODE {
            return Err(GatewayError::Api {
                operation,
                code: self.code,
                message: self.message.unwrap_or_default(),
            });
        }
        Ok(self.data)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterInfo {
    cluster_name: String,
    #[serde(default)]
    worlds: Vec<WorldEntry>,
}

/// Worlds come back either as bare names or as objects, depending on the server version.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum WorldEntry {
    Name(String),
    Detailed {
        #[serde(alias = "worldName", alias = "name")]
        world: String,
    },
}

impl WorldEntry {
    fn into_name(self) -> String {
        match self {
            WorldEntry::Name(name) => name,
            WorldEntry::Detailed { world } => world,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    extra_data: &'a str,
    cluster_name: &'a str,
    world_name: &'a str,
}

/// HTTP client for the management API.
#[derive(Debug, Clone)]
pub struct DmpClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    language: String,
}

impl DmpClient {
    pub fn new(config: &ApiConfig, timeout: Duration) -> GatewayResult<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: config.base_url.clone(),
            token: config.token.clone(),
            language: config
                .language
                .clone()
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        })
    }

    /// The token goes in as-is; the API does not use the `Bearer` scheme.
    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(AUTHORIZATION, &self.token)
            .header(LANGUAGE_HEADER, &self.language)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> GatewayResult<Option<T>> {
        let response = self
            .authorized(self.http.get(join_url(&self.base_url, path)))
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        let envelope: Envelope<T> = response.json().await?;
        envelope.into_data(operation)
    }

    async fn clusters(&self) -> GatewayResult<Vec<ClusterInfo>> {
        Ok(self
            .get("list_clusters", "/setting/clusters", &[])
            .await?
            .unwrap_or_default())
    }

    /// Broadcast `text` as a server announcement in one world.
    pub async fn announce(&self, cluster_id: &str, world_id: &str, text: &str) -> GatewayResult<()> {
        let request = ExecRequest {
            kind: "announce",
            extra_data: text,
            cluster_name: cluster_id,
            world_name: world_id,
        };

        let response = self
            .authorized(self.http.post(join_url(&self.base_url, "/home/exec")))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let envelope: Envelope<serde_json::Value> = response.json().await?;
        envelope.into_data("send_announce")?;

        debug!(cluster = cluster_id, world = world_id, "Announcement accepted");
        Ok(())
    }
}

#[async_trait]
impl SourcePoller for DmpClient {
    async fn list_clusters(&self) -> GatewayResult<Vec<String>> {
        Ok(self
            .clusters()
            .await?
            .into_iter()
            .map(|cluster| cluster.cluster_name)
            .collect())
    }

    async fn list_worlds(&self, cluster_id: &str) -> GatewayResult<Vec<String>> {
        let worlds = self
            .clusters()
            .await?
            .into_iter()
            .find(|cluster| cluster.cluster_name == cluster_id)
            .map(|cluster| cluster.worlds.into_iter().map(WorldEntry::into_name).collect())
            .unwrap_or_default();
        Ok(worlds)
    }

    async fn fetch_chat_lines(
        &self,
        cluster_id: &str,
        world_id: &str,
        max_lines: usize,
    ) -> GatewayResult<Vec<String>> {
        let line = max_lines.to_string();
        let query = [
            ("clusterName", cluster_id),
            ("worldName", world_id),
            ("line", line.as_str()),
            ("type", "chat"),
        ];
        Ok(self
            .get("fetch_chat_lines", "/logs/log_value", &query)
            .await?
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_server::serve_once;

    fn client(base_url: &str) -> DmpClient {
        let config = ApiConfig {
            base_url: base_url.to_string(),
            token: "secret-token".to_string(),
            language: None,
        };
        DmpClient::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_envelope_error_code() {
        let envelope: Envelope<Vec<String>> =
            serde_json::from_str(r#"{"code": 401, "message": "bad token", "data": null}"#).unwrap();
        match envelope.into_data("list_clusters") {
            Err(GatewayError::Api { code, message, .. }) => {
                assert_eq!(code, 401);
                assert_eq!(message, "bad token");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_world_entries_accept_both_shapes() {
        let cluster: ClusterInfo = serde_json::from_str(
            r#"{"clusterName": "Cluster_1", "worlds": ["Master", {"worldName": "Caves"}]}"#,
        )
        .unwrap();
        let names: Vec<String> = cluster.worlds.into_iter().map(WorldEntry::into_name).collect();
        assert_eq!(names, vec!["Master", "Caves"]);
    }

    #[tokio::test]
    async fn test_list_worlds_for_cluster() {
        let (url, server) = serve_once(
            200,
            r#"{"code":200,"data":[{"clusterName":"A","worlds":["Master"]},{"clusterName":"B","worlds":["Master","Caves"]}]}"#,
        )
        .await;

        let worlds = client(&url).list_worlds("B").await.unwrap();
        assert_eq!(worlds, vec!["Master", "Caves"]);

        let request = server.await.unwrap();
        assert_eq!(request.request_line(), "GET /setting/clusters HTTP/1.1");
        assert_eq!(request.header("authorization"), Some("secret-token"));
        assert_eq!(request.header("x-i18n-lang"), Some("zh"));
    }

    #[tokio::test]
    async fn test_fetch_chat_lines_query() {
        let (url, server) = serve_once(
            200,
            r#"{"code":200,"data":["[08:00:00]: [Say] (KU_ab) Alice: hi"]}"#,
        )
        .await;

        let lines = client(&url).fetch_chat_lines("Cluster_1", "Master", 50).await.unwrap();
        assert_eq!(lines.len(), 1);

        let request = server.await.unwrap();
        let line = request.request_line();
        assert!(line.starts_with("GET /logs/log_value?"));
        assert!(line.contains("clusterName=Cluster_1"));
        assert!(line.contains("worldName=Master"));
        assert!(line.contains("line=50"));
        assert!(line.contains("type=chat"));
    }

    #[tokio::test]
    async fn test_announce_payload() {
        let (url, server) = serve_once(200, r#"{"code":200,"message":"ok","data":null}"#).await;

        tokio_test::assert_ok!(
            client(&url)
                .announce("Cluster_1", "Master", "[QQ] Carol: hi")
                .await
        );

        let request = server.await.unwrap();
        assert_eq!(request.request_line(), "POST /home/exec HTTP/1.1");
        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "type": "announce",
                "extraData": "[QQ] Carol: hi",
                "clusterName": "Cluster_1",
                "worldName": "Master",
            })
        );
    }

    #[tokio::test]
    async fn test_announce_rejected() {
        let (url, server) = serve_once(200, r#"{"code":500,"message":"world offline"}"#).await;

        let err = client(&url).announce("c", "w", "hi").await.unwrap_err();
        assert!(err.to_string().contains("world offline"));
        server.await.unwrap();
    }
}
