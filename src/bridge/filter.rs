//! Inbound and outbound message policy.
//!
//! The policy is an immutable snapshot taken from configuration. Words are
//! matched as case-sensitive substrings; optional regex patterns are compiled
//! once and invalid ones are logged and skipped.

use std::collections::HashSet;
use std::fmt;

use fancy_regex::Regex;
use tracing::{debug, warn};

use crate::common::types::{GameMessage, MessageKind, OwnerId};
use crate::config::types::BridgeConfig;

/// Why an outbound message was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Longer than the configured limit (characters).
    TooLong { length: usize, limit: usize },
    /// Contains a blocked word or matches a blocked pattern.
    BlockedContent,
    /// Nothing left to send.
    Empty,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::TooLong { length, limit } => {
                write!(f, "message too long ({} > {} characters)", length, limit)
            }
            RejectReason::BlockedContent => f.write_str("message contains blocked content"),
            RejectReason::Empty => f.write_str("message is empty"),
        }
    }
}

/// Immutable filter settings.
#[derive(Debug, Clone, Default)]
pub struct FilterPolicy {
    pub blocked_words: Vec<String>,
    pub blocked_authors: HashSet<String>,
    /// Regex patterns applied in both directions.
    pub blocked_patterns: Vec<String>,
    pub suppress_system: bool,
    pub suppress_bridged_echo: bool,
    pub echo_marker: String,
    pub max_outbound_length: usize,
}

impl FilterPolicy {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            blocked_words: config.blocked_words.clone(),
            blocked_authors: config.blocked_authors.iter().cloned().collect(),
            blocked_patterns: config.blocked_patterns.clone(),
            suppress_system: config.suppress_system,
            suppress_bridged_echo: config.suppress_bridged_echo,
            echo_marker: config.echo_marker.clone(),
            max_outbound_length: config.max_outbound_length,
        }
    }
}

/// A compiled regex pattern with its original string for debugging.
#[derive(Debug, Clone)]
struct CompiledPattern {
    original: String,
    regex: Regex,
}

/// Stateless evaluator over a [`FilterPolicy`].
#[derive(Debug, Clone)]
pub struct MessageFilter {
    policy: FilterPolicy,
    patterns: Vec<CompiledPattern>,
}

impl MessageFilter {
    pub fn new(policy: FilterPolicy) -> Self {
        let patterns = compile_patterns(&policy.blocked_patterns);
        Self { policy, patterns }
    }

    /// Whether a game message may be delivered to the platform.
    pub fn allow_inbound(&self, msg: &GameMessage) -> bool {
        if self.policy.suppress_system && msg.kind == MessageKind::System {
            return false;
        }
        if self.policy.suppress_bridged_echo && self.is_echo(msg) {
            debug!(author = %msg.author, "Dropping bridged echo");
            return false;
        }
        if self.policy.blocked_authors.contains(&msg.author) {
            return false;
        }
        !self.contains_blocked(&msg.content)
    }

    /// Whether a platform message may be sent into the game.
    pub fn allow_outbound(&self, content: &str, author_id: OwnerId) -> bool {
        self.check_outbound(content, author_id).is_ok()
    }

    /// Like [`allow_outbound`](Self::allow_outbound) but says why.
    pub fn check_outbound(&self, content: &str, author_id: OwnerId) -> Result<(), RejectReason> {
        if content.trim().is_empty() {
            return Err(RejectReason::Empty);
        }
        let length = content.chars().count();
        if length > self.policy.max_outbound_length {
            debug!(author_id, length, "Outbound message over length limit");
            return Err(RejectReason::TooLong {
                length,
                limit: self.policy.max_outbound_length,
            });
        }
        if self.contains_blocked(content) {
            debug!(author_id, "Outbound message contains blocked content");
            return Err(RejectReason::BlockedContent);
        }
        Ok(())
    }

    fn is_echo(&self, msg: &GameMessage) -> bool {
        let marker = self.policy.echo_marker.as_str();
        !marker.is_empty() && (msg.content.contains(marker) || msg.author.contains(marker))
    }

    fn contains_blocked(&self, text: &str) -> bool {
        if self
            .policy
            .blocked_words
            .iter()
            .any(|word| !word.is_empty() && text.contains(word.as_str()))
        {
            return true;
        }

        self.patterns.iter().any(|p| {
            p.regex.is_match(text).unwrap_or_else(|e| {
                warn!("Regex match error for pattern '{}': {}", p.original, e);
                false
            })
        })
    }
}

/// Compile a list of regex pattern strings, skipping invalid ones.
fn compile_patterns(patterns: &[String]) -> Vec<CompiledPattern> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(regex) => Some(CompiledPattern {
                original: pattern.clone(),
                regex,
            }),
            Err(e) => {
                warn!("Invalid filter regex pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}
