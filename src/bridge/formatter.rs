//! Message formatting for display.
//!
//! Handles placeholder substitution in message format strings.
//! Supports placeholders: %timestamp, %cluster, %world, %author, %content, %owner

use crate::common::types::{GameMessage, MessageKind};
use crate::config::types::BridgeConfig;

/// Default format for join announcements.
pub const DEFAULT_JOIN_TEMPLATE: &str = "[%world] %author joined the game";

/// Default format for leave announcements.
pub const DEFAULT_LEAVE_TEMPLATE: &str = "[%world] %author left the game";

/// Default format for death announcements.
pub const DEFAULT_DEATH_TEMPLATE: &str = "[%world] %content";

/// Message formatter that substitutes placeholders in format strings.
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    /// Format string for this formatter.
    format: String,
}

impl MessageFormatter {
    /// Create a new formatter with the given format string.
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }

    /// Format a message with the given context.
    ///
    /// Substitutes the following placeholders:
    /// - `%timestamp` - Time of the line or of sending (HH:MM:SS)
    /// - `%cluster` - Cluster name
    /// - `%world` - World name
    /// - `%author` - Player or platform display name
    /// - `%content` - The actual message content
    /// - `%owner` - Platform id of the sending session (outbound only)
    pub fn format(&self, ctx: &FormatContext) -> String {
        // %content goes last so placeholder-like text inside a message stays literal.
        self.format
            .replace("%timestamp", &ctx.timestamp)
            .replace("%cluster", &ctx.cluster)
            .replace("%world", &ctx.world)
            .replace("%author", &ctx.author)
            .replace("%owner", &ctx.owner)
            .replace("%content", &ctx.content)
    }
}

/// Context for message formatting.
#[derive(Debug, Clone, Default)]
pub struct FormatContext {
    pub timestamp: String,
    pub cluster: String,
    pub world: String,
    pub author: String,
    pub content: String,
    pub owner: String,
}

impl FormatContext {
    /// Create a new format context.
    pub fn new(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    /// Set the timestamp.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Set cluster and world.
    pub fn with_location(mut self, cluster: impl Into<String>, world: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self.world = world.into();
        self
    }

    /// Set the owner id.
    pub fn with_owner(mut self, owner: impl ToString) -> Self {
        self.owner = owner.to_string();
        self
    }
}

impl From<&GameMessage> for FormatContext {
    fn from(msg: &GameMessage) -> Self {
        FormatContext::new(&msg.author, &msg.content)
            .with_timestamp(msg.time_str())
            .with_location(&msg.cluster_id, &msg.world_id)
    }
}

/// Kind-specific templates for inbound batches.
#[derive(Debug, Clone)]
pub struct BatchFormatter {
    chat: MessageFormatter,
    system: MessageFormatter,
    join: MessageFormatter,
    leave: MessageFormatter,
    death: MessageFormatter,
    max_batch_size: usize,
}

impl BatchFormatter {
    pub fn from_config(config: &BridgeConfig) -> Self {
        let or_default = |template: &Option<String>, default: &str| {
            MessageFormatter::new(template.clone().unwrap_or_else(|| default.to_string()))
        };

        Self {
            chat: MessageFormatter::new(&config.chat_template),
            system: MessageFormatter::new(&config.system_template),
            join: or_default(&config.join_template, DEFAULT_JOIN_TEMPLATE),
            leave: or_default(&config.leave_template, DEFAULT_LEAVE_TEMPLATE),
            death: or_default(&config.death_template, DEFAULT_DEATH_TEMPLATE),
            max_batch_size: config.max_batch_size.max(1),
        }
    }

    fn formatter_for(&self, kind: MessageKind) -> &MessageFormatter {
        match kind {
            MessageKind::Chat => &self.chat,
            MessageKind::System => &self.system,
            MessageKind::Join => &self.join,
            MessageKind::Leave => &self.leave,
            MessageKind::Death => &self.death,
        }
    }

    /// Format one message with the template for its kind.
    pub fn format_message(&self, msg: &GameMessage) -> String {
        self.formatter_for(msg.kind).format(&FormatContext::from(msg))
    }

    /// Render a batch, one line per message, capped at the batch size.
    ///
    /// Messages past the cap are summarised as `... +N more`.
    pub fn format_batch(&self, messages: &[GameMessage]) -> String {
        let mut lines: Vec<String> = messages
            .iter()
            .take(self.max_batch_size)
            .map(|msg| self.format_message(msg))
            .collect();

        if messages.len() > self.max_batch_size {
            lines.push(format!("... +{} more", messages.len() - self.max_batch_size));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn msg(kind: MessageKind, author: &str, content: &str) -> GameMessage {
        GameMessage::new(
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            "c1",
            "Master",
            author,
            content,
            kind,
            "",
        )
    }

    #[test]
    fn test_basic_format() {
        let formatter = MessageFormatter::new("[%world] %author: %content");
        let ctx = FormatContext::new("Alice", "hello").with_location("c1", "Caves");
        assert_eq!(formatter.format(&ctx), "[Caves] Alice: hello");
    }

    #[test]
    fn test_all_placeholders() {
        let formatter = MessageFormatter::new("%timestamp %cluster/%world %author(%owner): %content");
        let ctx = FormatContext::new("Bob", "hi")
            .with_timestamp("12:00:00")
            .with_location("c1", "w1")
            .with_owner(42u64);
        assert_eq!(formatter.format(&ctx), "12:00:00 c1/w1 Bob(42): hi");
    }

    #[test]
    fn test_content_placeholders_stay_literal() {
        let formatter = MessageFormatter::new("%author: %content");
        let ctx = FormatContext::new("Bob", "I typed %author here");
        assert_eq!(formatter.format(&ctx), "Bob: I typed %author here");
    }

    #[test]
    fn test_kind_specific_templates() {
        let formatter = BatchFormatter::from_config(&BridgeConfig::default());
        assert_eq!(
            formatter.format_message(&msg(MessageKind::Chat, "Alice", "hello")),
            "[Master] Alice: hello"
        );
        assert_eq!(
            formatter.format_message(&msg(MessageKind::System, "System", "Saved")),
            "[Master] Saved"
        );
        assert_eq!(
            formatter.format_message(&msg(MessageKind::Join, "Willow", "Willow")),
            "[Master] Willow joined the game"
        );
        assert_eq!(
            formatter.format_message(&msg(MessageKind::Leave, "Willow", "Willow")),
            "[Master] Willow left the game"
        );
        assert_eq!(
            formatter.format_message(&msg(MessageKind::Death, "Wes", "Wes was killed by Spider.")),
            "[Master] Wes was killed by Spider."
        );
    }

    #[test]
    fn test_configured_join_template() {
        let config = BridgeConfig {
            join_template: Some("+ %author".to_string()),
            ..BridgeConfig::default()
        };
        let formatter = BatchFormatter::from_config(&config);
        assert_eq!(formatter.format_message(&msg(MessageKind::Join, "Wendy", "Wendy")), "+ Wendy");
    }

    #[test]
    fn test_batch_truncation() {
        let config = BridgeConfig {
            max_batch_size: 2,
            chat_template: "%author: %content".to_string(),
            ..BridgeConfig::default()
        };
        let formatter = BatchFormatter::from_config(&config);
        let batch = vec![
            msg(MessageKind::Chat, "A", "1"),
            msg(MessageKind::Chat, "B", "2"),
            msg(MessageKind::Chat, "C", "3"),
            msg(MessageKind::Chat, "D", "4"),
        ];
        assert_eq!(formatter.format_batch(&batch), "A: 1\nB: 2\n... +2 more");
        assert_eq!(formatter.format_batch(&batch[..2]), "A: 1\nB: 2");
    }
}
