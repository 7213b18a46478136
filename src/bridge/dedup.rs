//! Sliding-window message deduplication.
//!
//! Ages are measured on the monotonic runtime clock, so a wall-clock step
//! (DST change, NTP correction) neither flushes nor pins the window.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

/// A hash and the moment it was first seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupEntry {
    pub content_hash: String,
    pub first_seen_at: Instant,
}

/// Remembers content hashes for a fixed window.
///
/// Entries are kept in insertion order, so pruning only ever pops from the
/// front. Nothing is persisted; a restart starts empty.
pub struct MessageDeduplicator {
    window: Duration,
    entries: VecDeque<DedupEntry>,
    seen: HashSet<String>,
}

impl MessageDeduplicator {
    pub fn new(window_seconds: u64) -> Self {
        Self {
            window: Duration::from_secs(window_seconds),
            entries: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Record `hash` and report whether it was already seen inside the window.
    pub fn is_duplicate(&mut self, hash: &str) -> bool {
        let now = Instant::now();
        self.prune(now);

        if self.seen.contains(hash) {
            return true;
        }

        self.seen.insert(hash.to_string());
        self.entries.push_back(DedupEntry {
            content_hash: hash.to_string(),
            first_seen_at: now,
        });
        false
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.entries.front() {
            if now.saturating_duration_since(front.first_seen_at) <= self.window {
                break;
            }
            if let Some(expired) = self.entries.pop_front() {
                self.seen.remove(&expired.content_hash);
            }
        }
    }
}

impl std::fmt::Debug for MessageDeduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageDeduplicator")
            .field("window", &self.window)
            .field("entries", &self.entries.len())
            .finish()
    }
}
