//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Placeholder shipped in the sample configuration.
const TOKEN_PLACEHOLDER: &str = "YOUR_API_TOKEN_HERE";

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();
    let bridge = &config.bridge;

    // Cadence and limits
    if bridge.sync_interval_seconds < 1 {
        errors.push("bridge.sync_interval_seconds must be at least 1".to_string());
    }
    if bridge.dedupe_window_seconds < 1 {
        errors.push("bridge.dedupe_window_seconds must be at least 1".to_string());
    }
    if bridge.fetch_lines < 1 {
        errors.push("bridge.fetch_lines must be at least 1".to_string());
    }
    if bridge.max_batch_size < 1 {
        errors.push("bridge.max_batch_size must be at least 1".to_string());
    }
    if bridge.max_outbound_length < 1 {
        errors.push("bridge.max_outbound_length must be at least 1".to_string());
    }
    if bridge.request_timeout_seconds < 1 {
        errors.push("bridge.request_timeout_seconds must be at least 1".to_string());
    }

    // Templates
    let templates = [
        ("chat_template", Some(&bridge.chat_template)),
        ("system_template", Some(&bridge.system_template)),
        ("outbound_template", Some(&bridge.outbound_template)),
        ("join_template", bridge.join_template.as_ref()),
        ("leave_template", bridge.leave_template.as_ref()),
        ("death_template", bridge.death_template.as_ref()),
    ];
    for (name, template) in templates {
        if let Some(template) = template {
            if template.trim().is_empty() {
                errors.push(format!("bridge.{} must not be empty", name));
            }
        }
    }
    if bridge.suppress_bridged_echo {
        if bridge.echo_marker.is_empty() {
            errors.push("bridge.echo_marker is required when suppress_bridged_echo is on".to_string());
        } else if !bridge.outbound_template.contains(&bridge.echo_marker) {
            // Relayed text would not carry the marker and would bounce back to the platform.
            errors.push(format!(
                "bridge.outbound_template must contain echo_marker '{}' when suppress_bridged_echo is on",
                bridge.echo_marker
            ));
        }
    }
    for (i, word) in bridge.blocked_words.iter().enumerate() {
        if word.is_empty() {
            errors.push(format!("bridge.blocked_words[{}] is empty and would block everything", i));
        }
    }

    // Filter patterns (try to compile them)
    for (i, pattern) in bridge.blocked_patterns.iter().enumerate() {
        if fancy_regex::Regex::new(pattern).is_err() {
            errors.push(format!(
                "bridge.blocked_patterns[{}] is not a valid regex: '{}'",
                i, pattern
            ));
        }
    }

    // Collaborators
    if config.api.base_url.is_empty() {
        errors.push("api.base_url is required".to_string());
    }
    if config.api.token.is_empty() {
        errors.push("api.token is required".to_string());
    }
    if config.api.token == TOKEN_PLACEHOLDER {
        errors.push("api.token has not been configured (still using placeholder)".to_string());
    }
    if config.platform.base_url.is_empty() {
        errors.push("platform.base_url is required".to_string());
    }
    if let Some(ref history) = config.history {
        if history.path.is_empty() {
            errors.push("history.path must not be empty".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}
