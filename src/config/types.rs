//! Configuration type definitions.

use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,
    pub api: ApiConfig,
    pub platform: PlatformConfig,
    pub history: Option<HistoryConfig>,
}

/// Synchronization engine settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Master switch; when false no session can be started.
    pub enabled: bool,
    pub allow_private: bool,
    pub allow_group: bool,
    pub sync_interval_seconds: u64,
    pub dedupe_window_seconds: u64,
    /// Lines fetched from the tail of each world log per cycle.
    pub fetch_lines: usize,
    pub max_batch_size: usize,
    /// Maximum outbound message length in characters.
    pub max_outbound_length: usize,
    pub suppress_system: bool,
    pub suppress_bridged_echo: bool,
    /// Marker that outbound messages carry into the game, used to drop their echo.
    pub echo_marker: String,
    pub blocked_words: Vec<String>,
    pub blocked_authors: Vec<String>,
    /// Regex patterns blocked in both directions.
    pub blocked_patterns: Vec<String>,
    /// Empty means "first cluster reported by the management API".
    pub default_cluster: String,
    pub default_world: String,
    pub chat_template: String,
    pub system_template: String,
    pub join_template: Option<String>,
    pub leave_template: Option<String>,
    pub death_template: Option<String>,
    pub outbound_template: String,
    pub request_timeout_seconds: u64,
    pub session_idle_timeout_minutes: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_private: true,
            allow_group: true,
            sync_interval_seconds: 5,
            dedupe_window_seconds: 60,
            fetch_lines: 50,
            max_batch_size: 10,
            max_outbound_length: 200,
            suppress_system: false,
            suppress_bridged_echo: true,
            echo_marker: "[QQ]".to_string(),
            blocked_words: Vec::new(),
            blocked_authors: Vec::new(),
            blocked_patterns: Vec::new(),
            default_cluster: String::new(),
            default_world: "Master".to_string(),
            chat_template: "[%world] %author: %content".to_string(),
            system_template: "[%world] %content".to_string(),
            join_template: None,
            leave_template: None,
            death_template: None,
            outbound_template: "[QQ] %author: %content".to_string(),
            request_timeout_seconds: 10,
            session_idle_timeout_minutes: 30,
        }
    }
}

/// Dedicated-server management API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: String,
    /// Value of the `X-I18n-Lang` header.
    pub language: Option<String>,
}

/// Messaging platform HTTP endpoint (OneBot v11 style).
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    pub base_url: String,
    pub access_token: Option<String>,
}

/// Append-only history of outbound messages.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    pub path: String,
}
