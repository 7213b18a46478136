//! Registry of active bridge sessions.
//!
//! Sessions are indexed twice: by owner, and by destination group for the
//! sessions in group mode. Both indices are only ever changed together by
//! [`UserSessionManager::create`] and [`UserSessionManager::remove`]; a mode
//! switch is a `remove` followed by a `create`, never an in-place edit.
//!
//! Activity is stamped with the monotonic runtime clock; idle timeouts are
//! intervals, not wall-clock times.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::common::types::{ChatMode, GroupId, OwnerId};

/// Cluster/world that a session's outbound messages are announced to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldTarget {
    pub cluster: String,
    pub world: String,
}

impl WorldTarget {
    pub fn new(cluster: impl Into<String>, world: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            world: world.into(),
        }
    }
}

/// A standing opt-in route between a platform identity and the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub owner_id: OwnerId,
    pub mode: ChatMode,
    pub target: WorldTarget,
    pub last_activity_at: Instant,
    pub active: bool,
}

impl Session {
    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity_at) > timeout
    }
}

/// Owner and group indices over the live sessions.
#[derive(Default)]
pub struct UserSessionManager {
    sessions: BTreeMap<OwnerId, Session>,
    groups: BTreeMap<GroupId, BTreeSet<OwnerId>>,
}

impl UserSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for `owner_id`.
    ///
    /// Callers check for an existing session first; if one is there anyway it
    /// is unlinked before the new one goes in so the group index stays exact.
    pub fn create(&mut self, owner_id: OwnerId, mode: ChatMode, target: WorldTarget) -> Session {
        if self.sessions.contains_key(&owner_id) {
            warn!(owner_id, "Replacing an existing session");
            self.remove(owner_id);
        }

        let session = Session {
            owner_id,
            mode,
            target,
            last_activity_at: Instant::now(),
            active: true,
        };

        if let Some(group_id) = mode.group_id() {
            self.groups.entry(group_id).or_default().insert(owner_id);
        }
        self.sessions.insert(owner_id, session.clone());

        info!(
            owner_id,
            mode = %mode,
            cluster = %session.target.cluster,
            world = %session.target.world,
            "Session created"
        );
        session
    }

    pub fn get(&self, owner_id: OwnerId) -> Option<&Session> {
        self.sessions.get(&owner_id)
    }

    /// Drop the session for `owner_id`, returning it if there was one.
    pub fn remove(&mut self, owner_id: OwnerId) -> Option<Session> {
        let session = self.sessions.remove(&owner_id)?;

        if let Some(group_id) = session.mode.group_id() {
            if let Some(members) = self.groups.get_mut(&group_id) {
                members.remove(&owner_id);
                if members.is_empty() {
                    self.groups.remove(&group_id);
                }
            }
        }

        info!(owner_id, mode = %session.mode, "Session removed");
        Some(session)
    }

    /// Snapshot of all active sessions, ordered by owner.
    pub fn active_sessions(&self) -> Vec<Session> {
        self.sessions.values().filter(|s| s.active).cloned().collect()
    }

    /// Owners whose group-mode sessions deliver to `group_id`.
    pub fn sessions_for_group(&self, group_id: GroupId) -> BTreeSet<OwnerId> {
        self.groups.get(&group_id).cloned().unwrap_or_default()
    }

    /// Groups that currently have at least one member session.
    pub fn groups(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.groups.keys().copied()
    }

    /// Mark `owner_id` as active now.
    pub fn touch(&mut self, owner_id: OwnerId) {
        let now = Instant::now();
        if let Some(session) = self.sessions.get_mut(&owner_id) {
            session.last_activity_at = now;
        }
    }

    /// Mark every member session of `group_id` as active now.
    pub fn touch_group(&mut self, group_id: GroupId) {
        let Some(members) = self.groups.get(&group_id) else {
            return;
        };
        let now = Instant::now();
        for owner_id in members {
            if let Some(session) = self.sessions.get_mut(owner_id) {
                session.last_activity_at = now;
            }
        }
    }

    /// Remove sessions idle for longer than `timeout`; returns who was removed.
    pub fn sweep_idle(&mut self, timeout: Duration) -> Vec<OwnerId> {
        let now = Instant::now();
        let expired: Vec<OwnerId> = self
            .sessions
            .values()
            .filter(|s| s.is_idle(now, timeout))
            .map(|s| s.owner_id)
            .collect();

        for owner_id in &expired {
            self.remove(*owner_id);
        }
        if !expired.is_empty() {
            info!("Swept {} idle session(s)", expired.len());
        }
        expired
    }

    /// Drop every session.
    pub fn clear(&mut self) {
        self.sessions.clear();
        self.groups.clear();
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl std::fmt::Debug for UserSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserSessionManager")
            .field("sessions", &self.sessions)
            .field("groups", &self.groups)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const MINUTE: Duration = Duration::from_secs(60);

    fn target() -> WorldTarget {
        WorldTarget::new("c1", "w1")
    }

    #[test]
    fn test_create_and_get() {
        let mut manager = UserSessionManager::new();
        let session = manager.create(1, ChatMode::Private, target());
        assert_eq!(session.owner_id, 1);
        assert!(session.active);
        assert_eq!(manager.get(1), Some(&session));
        assert!(manager.get(2).is_none());
    }

    #[test]
    fn test_group_index_tracks_members() {
        let mut manager = UserSessionManager::new();
        manager.create(1, ChatMode::Group(100), target());
        manager.create(2, ChatMode::Group(100), target());
        manager.create(3, ChatMode::Private, target());

        assert_eq!(manager.sessions_for_group(100), BTreeSet::from([1, 2]));
        assert_eq!(manager.groups().collect::<Vec<_>>(), vec![100]);

        manager.remove(1);
        assert_eq!(manager.sessions_for_group(100), BTreeSet::from([2]));
    }

    #[test]
    fn test_removing_last_member_drops_group_key() {
        let mut manager = UserSessionManager::new();
        manager.create(1, ChatMode::Group(100), target());
        manager.remove(1);

        assert!(manager.sessions_for_group(100).is_empty());
        assert_eq!(manager.groups().count(), 0);
        assert!(manager.is_empty());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut manager = UserSessionManager::new();
        assert!(manager.remove(42).is_none());
    }

    #[test]
    fn test_mode_switch_by_remove_then_create() {
        let mut manager = UserSessionManager::new();
        manager.create(1, ChatMode::Group(100), target());
        manager.remove(1);
        manager.create(1, ChatMode::Private, target());

        assert_eq!(manager.get(1).unwrap().mode, ChatMode::Private);
        assert_eq!(manager.groups().count(), 0);
    }

    #[test]
    fn test_create_over_existing_keeps_index_exact() {
        let mut manager = UserSessionManager::new();
        manager.create(1, ChatMode::Group(100), target());
        manager.create(1, ChatMode::Group(200), target());

        assert!(manager.sessions_for_group(100).is_empty());
        assert_eq!(manager.sessions_for_group(200), BTreeSet::from([1]));
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_idle() {
        let mut manager = UserSessionManager::new();
        manager.create(1, ChatMode::Private, target());
        manager.create(2, ChatMode::Group(100), target());
        advance(20 * MINUTE).await;
        manager.touch(2);
        advance(15 * MINUTE).await;

        let removed = manager.sweep_idle(30 * MINUTE);
        assert_eq!(removed, vec![1]);
        assert!(manager.get(1).is_none());
        assert!(manager.get(2).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_group_refreshes_members() {
        let mut manager = UserSessionManager::new();
        manager.create(1, ChatMode::Group(100), target());
        manager.create(2, ChatMode::Group(100), target());
        advance(29 * MINUTE).await;
        manager.touch_group(100);
        advance(29 * MINUTE).await;

        assert!(manager.sweep_idle(30 * MINUTE).is_empty());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_active_sessions_snapshot() {
        let mut manager = UserSessionManager::new();
        manager.create(2, ChatMode::Private, target());
        manager.create(1, ChatMode::Group(5), target());

        let owners: Vec<_> = manager.active_sessions().iter().map(|s| s.owner_id).collect();
        assert_eq!(owners, vec![1, 2]);

        manager.clear();
        assert!(manager.active_sessions().is_empty());
        assert_eq!(manager.groups().count(), 0);
    }
}
