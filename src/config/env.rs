//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `CAMPFIRE_API_URL` - management API base URL
//! - `CAMPFIRE_API_TOKEN` - management API token
//! - `CAMPFIRE_PLATFORM_URL` - messaging platform base URL
//! - `CAMPFIRE_PLATFORM_TOKEN` - messaging platform access token

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "CAMPFIRE";

/// Apply environment variable overrides to a config.
///
/// This allows tokens to be provided via environment variables instead of
/// the config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(url) = env::var(format!("{}_API_URL", ENV_PREFIX)) {
        config.api.base_url = url;
    }
    if let Ok(token) = env::var(format!("{}_API_TOKEN", ENV_PREFIX)) {
        config.api.token = token;
    }
    if let Ok(url) = env::var(format!("{}_PLATFORM_URL", ENV_PREFIX)) {
        config.platform.base_url = url;
    }
    if let Ok(token) = env::var(format!("{}_PLATFORM_TOKEN", ENV_PREFIX)) {
        config.platform.access_token = Some(token);
    }

    config
}

/// Get the config file path from environment or use default.
///
/// Checks `CAMPFIRE_CONFIG`, otherwise returns "campfire.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "campfire.conf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    fn make_test_config() -> Config {
        Config {
            bridge: BridgeConfig::default(),
            api: ApiConfig {
                base_url: "http://localhost:8082".to_string(),
                token: "original_token".to_string(),
                language: None,
            },
            platform: PlatformConfig {
                base_url: "http://localhost:5700".to_string(),
                access_token: None,
            },
            history: None,
        }
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(ENV_PREFIX, "CAMPFIRE");
    }

    #[test]
    fn test_apply_env_overrides_no_vars() {
        env::remove_var("CAMPFIRE_API_URL");
        env::remove_var("CAMPFIRE_API_TOKEN");
        env::remove_var("CAMPFIRE_PLATFORM_URL");
        env::remove_var("CAMPFIRE_PLATFORM_TOKEN");

        let result = apply_env_overrides(make_test_config());

        assert_eq!(result.api.token, "original_token");
        assert!(result.platform.access_token.is_none());
    }
}
