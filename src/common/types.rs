//! Shared types used across the application.

use std::fmt;

use chrono::NaiveTime;
use sha2::{Digest, Sha256};

/// Messaging platform identity of a session owner.
pub type OwnerId = u64;

/// Messaging platform group identifier.
pub type GroupId = u64;

/// Kind of a game log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Chat,
    System,
    Join,
    Leave,
    Death,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Chat => "chat",
            MessageKind::System => "system",
            MessageKind::Join => "join",
            MessageKind::Leave => "leave",
            MessageKind::Death => "death",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single classified line from a world's chat log.
///
/// Built once per cycle by the parser and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameMessage {
    /// Time-of-day token from the log line.
    pub timestamp: NaiveTime,
    pub cluster_id: String,
    pub world_id: String,
    pub author: String,
    pub content: String,
    pub kind: MessageKind,
    /// The line exactly as fetched.
    pub raw_line: String,
    /// Hex SHA-256 over (timestamp, cluster, world, author, content).
    pub content_hash: String,
}

impl GameMessage {
    pub fn new(
        timestamp: NaiveTime,
        cluster_id: impl Into<String>,
        world_id: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
        kind: MessageKind,
        raw_line: impl Into<String>,
    ) -> Self {
        let cluster_id = cluster_id.into();
        let world_id = world_id.into();
        let author = author.into();
        let content = content.into();
        let content_hash = content_hash(timestamp, &cluster_id, &world_id, &author, &content);

        Self {
            timestamp,
            cluster_id,
            world_id,
            author,
            content,
            kind,
            raw_line: raw_line.into(),
            content_hash,
        }
    }

    /// Timestamp rendered the way it appears in the log (HH:MM:SS).
    pub fn time_str(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }
}

/// Deterministic hash used both for deduplication and as a delivery idempotency key.
pub fn content_hash(
    timestamp: NaiveTime,
    cluster_id: &str,
    world_id: &str,
    author: &str,
    content: &str,
) -> String {
    let mut hasher = Sha256::new();
    for part in [
        timestamp.format("%H:%M:%S").to_string().as_str(),
        cluster_id,
        world_id,
        author,
        content,
    ] {
        hasher.update(part.as_bytes());
        // Unit separator keeps ("ab", "c") and ("a", "bc") apart.
        hasher.update([0x1fu8]);
    }
    format!("{:x}", hasher.finalize())
}

/// How a session receives inbound batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatMode {
    /// Batches go to the owner directly.
    Private,
    /// Batches go to the group; one copy per group regardless of member count.
    Group(GroupId),
}

impl ChatMode {
    pub fn group_id(&self) -> Option<GroupId> {
        match self {
            ChatMode::Private => None,
            ChatMode::Group(id) => Some(*id),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, ChatMode::Group(_))
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatMode::Private => f.write_str("private"),
            ChatMode::Group(id) => write!(f, "group {}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = GameMessage::new(t(8, 0, 0), "c1", "w1", "Alice", "hello", MessageKind::Chat, "x");
        let b = GameMessage::new(t(8, 0, 0), "c1", "w1", "Alice", "hello", MessageKind::Chat, "y");
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.content_hash.len(), 64);
    }

    #[test]
    fn test_hash_covers_location_and_time() {
        let base = content_hash(t(8, 0, 0), "c1", "w1", "Alice", "hello");
        assert_ne!(base, content_hash(t(8, 0, 1), "c1", "w1", "Alice", "hello"));
        assert_ne!(base, content_hash(t(8, 0, 0), "c2", "w1", "Alice", "hello"));
        assert_ne!(base, content_hash(t(8, 0, 0), "c1", "w2", "Alice", "hello"));
    }

    #[test]
    fn test_hash_field_boundaries() {
        assert_ne!(
            content_hash(t(8, 0, 0), "c1", "w1", "ab", "c"),
            content_hash(t(8, 0, 0), "c1", "w1", "a", "bc")
        );
    }

    #[test]
    fn test_chat_mode_accessors() {
        assert_eq!(ChatMode::Private.group_id(), None);
        assert_eq!(ChatMode::Group(7).group_id(), Some(7));
        assert!(ChatMode::Group(7).is_group());
        assert_eq!(ChatMode::Group(7).to_string(), "group 7");
    }
}
