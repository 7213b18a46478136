//! Bridge orchestrator that ties the game logs and the messaging platform together.
//!
//! Owns the poll loop (game -> platform), the session commands, and the
//! synchronous relay path (platform -> game). Filtering, deduplication and
//! formatting are delegated to the sibling modules.

use std::collections::BTreeSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDateTime;
use futures::future::join_all;
use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::common::clock::Clock;
use crate::common::error::{GatewayError, GatewayResult};
use crate::common::types::{ChatMode, GameMessage, GroupId, OwnerId};
use crate::config::types::BridgeConfig;

use super::dedup::MessageDeduplicator;
use super::filter::{FilterPolicy, MessageFilter, RejectReason};
use super::formatter::{BatchFormatter, FormatContext, MessageFormatter};
use super::parser;
use super::ports::{HistorySink, OutboundGateway, SourcePoller};
use super::session::{Session, UserSessionManager, WorldTarget};

/// How long `stop` waits for the poll task to wind down.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// External collaborators the bridge is wired to.
#[derive(Clone)]
pub struct BridgeDeps {
    pub poller: Arc<dyn SourcePoller>,
    pub gateway: Arc<dyn OutboundGateway>,
    pub history: Arc<dyn HistorySink>,
    pub clock: Arc<dyn Clock>,
}

/// Result of `start_session`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started(Session),
    AlreadyActive,
    ModeDisabled,
    BridgeDisabled,
}

/// Result of `stop_session`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotActive,
}

/// Result of `switch_mode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    Switched(Session),
    AlreadyInMode,
    ModeDisabled,
    NotActive,
}

/// Result of `relay_outbound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Announced in the game.
    Delivered,
    /// Refused by policy; the game was not contacted.
    Rejected(RejectReason),
    /// The owner has no active session.
    NoSession,
    /// The game-side call failed or timed out.
    Failed(String),
}

/// Bridge-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalStats {
    pub running: bool,
    pub total_sessions: usize,
    pub private_sessions: usize,
    pub group_sessions: usize,
    pub sync_interval_seconds: u64,
    pub cycles: u64,
    pub messages_delivered: u64,
    pub delivery_failures: u64,
    pub relayed_outbound: u64,
}

/// Per-owner view returned by `get_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeStatus {
    pub active: bool,
    pub mode: Option<ChatMode>,
    pub target_cluster: Option<String>,
    pub target_world: Option<String>,
    pub global: GlobalStats,
}

/// What one poll cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// New messages that survived parse, filter and dedup.
    pub collected: usize,
    /// Destinations a batch was sent to successfully.
    pub delivered: usize,
    /// Destinations whose send failed.
    pub failed: usize,
}

/// Where a batch goes: each private owner, and each distinct group once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Destinations {
    pub private: Vec<OwnerId>,
    pub groups: BTreeSet<GroupId>,
}

impl Destinations {
    pub fn from_sessions(sessions: &[Session]) -> Self {
        let mut destinations = Destinations::default();
        for session in sessions.iter().filter(|s| s.active) {
            match session.mode {
                ChatMode::Private => destinations.private.push(session.owner_id),
                ChatMode::Group(group_id) => {
                    destinations.groups.insert(group_id);
                }
            }
        }
        destinations
    }

    pub fn len(&self) -> usize {
        self.private.len() + self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
struct Counters {
    cycles: AtomicU64,
    messages_delivered: AtomicU64,
    delivery_failures: AtomicU64,
    relayed_outbound: AtomicU64,
}

/// State shared between the poll task and the command surface.
struct BridgeCore {
    config: BridgeConfig,
    filter: MessageFilter,
    formatter: BatchFormatter,
    outbound_formatter: MessageFormatter,
    request_timeout: Duration,
    deps: BridgeDeps,
    sessions: Mutex<UserSessionManager>,
    dedup: Mutex<MessageDeduplicator>,
    floor_time: Mutex<Option<NaiveDateTime>>,
    running: AtomicBool,
    counters: Counters,
}

/// The running poll task.
struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// The main bridge that orchestrates message flow.
pub struct Bridge {
    core: Arc<BridgeCore>,
    task: Option<PollTask>,
}

impl Bridge {
    /// Create a stopped bridge.
    pub fn new(config: &BridgeConfig, deps: BridgeDeps) -> Self {
        let core = BridgeCore {
            filter: MessageFilter::new(FilterPolicy::from_config(config)),
            formatter: BatchFormatter::from_config(config),
            outbound_formatter: MessageFormatter::new(&config.outbound_template),
            request_timeout: Duration::from_secs(config.request_timeout_seconds.max(1)),
            sessions: Mutex::new(UserSessionManager::new()),
            dedup: Mutex::new(MessageDeduplicator::new(config.dedupe_window_seconds)),
            floor_time: Mutex::new(None),
            running: AtomicBool::new(false),
            counters: Counters::default(),
            config: config.clone(),
            deps,
        };

        Self {
            core: Arc::new(core),
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Start polling from a fresh baseline.
    ///
    /// Sessions and dedup state from any previous run are discarded and the
    /// floor time is set to now, so lines older than this call are never delivered.
    pub async fn start(&mut self) {
        if self.task.is_some() {
            debug!("Bridge already running");
            return;
        }

        let floor = self.core.reset_baseline().await;
        self.core.running.store(true, Ordering::SeqCst);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(Arc::clone(&self.core), cancel.clone()));
        self.task = Some(PollTask { cancel, handle });

        info!(
            floor_time = %floor.format("%H:%M:%S"),
            interval = self.core.config.sync_interval_seconds,
            "Bridge started; ignoring log lines before floor time"
        );
    }

    /// Cancel the poll loop and wait for it to exit.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        task.cancel.cancel();
        match tokio::time::timeout(STOP_GRACE, task.handle).await {
            Ok(Ok(())) => info!("Bridge stopped"),
            Ok(Err(e)) => warn!("Poll task ended abnormally: {}", e),
            Err(_) => warn!("Poll task did not stop within {:?}", STOP_GRACE),
        }
        self.core.running.store(false, Ordering::SeqCst);
    }

    /// Run one poll cycle immediately, outside the timer.
    pub async fn run_cycle(&self) -> anyhow::Result<CycleReport> {
        self.core.run_cycle().await
    }

    /// Opt `owner_id` into bridging.
    pub async fn start_session(&self, owner_id: OwnerId, mode: ChatMode) -> StartOutcome {
        self.core.start_session(owner_id, mode).await
    }

    /// Opt `owner_id` out of bridging.
    pub async fn stop_session(&self, owner_id: OwnerId) -> StopOutcome {
        self.core.stop_session(owner_id).await
    }

    /// Move an existing session to another mode or group.
    pub async fn switch_mode(&self, owner_id: OwnerId, new_mode: ChatMode) -> SwitchOutcome {
        self.core.switch_mode(owner_id, new_mode).await
    }

    pub async fn get_status(&self, owner_id: OwnerId) -> BridgeStatus {
        self.core.get_status(owner_id).await
    }

    /// Send a platform message into the game on behalf of `owner_id`.
    pub async fn relay_outbound(
        &self,
        owner_id: OwnerId,
        display_name: &str,
        content: &str,
    ) -> RelayOutcome {
        self.core.relay_outbound(owner_id, display_name, content).await
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.cancel.cancel();
        }
    }
}

/// Poll until cancelled. Cycle errors and panics are logged, never propagated.
async fn poll_loop(core: Arc<BridgeCore>, cancel: CancellationToken) {
    let interval = Duration::from_secs(core.config.sync_interval_seconds.max(1));

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = AssertUnwindSafe(core.run_cycle()).catch_unwind() => match outcome {
                Ok(Ok(report)) => {
                    if report.collected > 0 {
                        debug!(
                            collected = report.collected,
                            delivered = report.delivered,
                            failed = report.failed,
                            "Cycle complete"
                        );
                    }
                }
                Ok(Err(e)) => error!("Sync cycle failed: {:#}", e),
                Err(_) => error!("Sync cycle panicked; continuing"),
            },
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("Poll loop exited");
}

/// Bound a collaborator call by `after`.
async fn with_timeout<T, F>(after: Duration, operation: &'static str, call: F) -> GatewayResult<T>
where
    F: Future<Output = GatewayResult<T>>,
{
    tokio::time::timeout(after, call)
        .await
        .unwrap_or_else(|_| Err(GatewayError::Timeout { operation, after }))
}

impl BridgeCore {
    /// Drop all session and dedup state and move the floor time to now.
    async fn reset_baseline(&self) -> NaiveDateTime {
        let now = self.deps.clock.now();
        self.sessions.lock().await.clear();
        self.dedup.lock().await.clear();
        *self.floor_time.lock().await = Some(now);
        now
    }

    fn mode_allowed(&self, mode: ChatMode) -> bool {
        match mode {
            ChatMode::Private => self.config.allow_private,
            ChatMode::Group(_) => self.config.allow_group,
        }
    }

    // ---------------------------------------------------------------
    // Game -> platform
    // ---------------------------------------------------------------

    /// One cycle. Idle sessions are swept even when collection fails.
    async fn run_cycle(&self) -> anyhow::Result<CycleReport> {
        let floor = *self.floor_time.lock().await;
        let collected = self.collect_batch(floor).await;
        self.counters.cycles.fetch_add(1, Ordering::Relaxed);

        let report = match collected {
            Ok(batch) => Ok(self.deliver(&batch).await),
            Err(e) => Err(e),
        };

        let idle_timeout =
            Duration::from_secs(self.config.session_idle_timeout_minutes.saturating_mul(60));
        self.sessions.lock().await.sweep_idle(idle_timeout);

        report
    }

    async fn deliver(&self, batch: &[GameMessage]) -> CycleReport {
        let mut report = CycleReport {
            collected: batch.len(),
            ..CycleReport::default()
        };

        let sessions = self.sessions.lock().await.active_sessions();
        if !batch.is_empty() && !sessions.is_empty() {
            let (delivered, failed) = self.distribute(batch, &sessions).await;
            report.delivered = delivered;
            report.failed = failed;
        }
        report
    }

    /// Fetch, parse, filter and dedup the log tails of every world.
    async fn collect_batch(&self, floor: Option<NaiveDateTime>) -> anyhow::Result<Vec<GameMessage>> {
        let poller = &self.deps.poller;
        let clusters = with_timeout(self.request_timeout, "list_clusters", poller.list_clusters())
            .await
            .context("Failed to list clusters")?;

        let mut locations = Vec::new();
        for cluster in clusters.into_iter().filter(|c| !c.is_empty()) {
            match with_timeout(self.request_timeout, "list_worlds", poller.list_worlds(&cluster)).await {
                Ok(worlds) => {
                    for world in worlds.into_iter().filter(|w| !w.is_empty()) {
                        locations.push((cluster.clone(), world));
                    }
                }
                Err(e) => warn!(cluster = %cluster, "Failed to list worlds: {}", e),
            }
        }

        let fetches = locations.iter().map(|(cluster, world)| async move {
            let lines = with_timeout(
                self.request_timeout,
                "fetch_chat_lines",
                poller.fetch_chat_lines(cluster, world, self.config.fetch_lines),
            )
            .await;
            (cluster, world, lines)
        });
        let results = join_all(fetches).await;

        let mut batch = Vec::new();
        let mut dedup = self.dedup.lock().await;
        for (cluster, world, lines) in results {
            let lines = match lines {
                Ok(lines) => lines,
                Err(e) => {
                    warn!(cluster = %cluster, world = %world, "Failed to fetch chat lines: {}", e);
                    continue;
                }
            };

            for line in &lines {
                let Some(msg) = parser::parse(line, cluster, world, floor) else {
                    continue;
                };
                if !self.filter.allow_inbound(&msg) {
                    debug!(cluster = %cluster, world = %world, "FILTERED game -> platform: {}", line);
                    continue;
                }
                if dedup.is_duplicate(&msg.content_hash) {
                    continue;
                }
                debug!(
                    cluster = %cluster,
                    world = %world,
                    hash = &msg.content_hash[..8],
                    "Collected {}: {}",
                    msg.author,
                    msg.content
                );
                batch.push(msg);
            }
        }

        Ok(batch)
    }

    /// Send the batch to every destination; returns (delivered, failed).
    async fn distribute(&self, batch: &[GameMessage], sessions: &[Session]) -> (usize, usize) {
        let destinations = Destinations::from_sessions(sessions);
        let text = self.formatter.format_batch(batch);
        let gateway = &self.deps.gateway;
        let mut delivered = 0;
        let mut failed = 0;

        for &owner_id in &destinations.private {
            match with_timeout(self.request_timeout, "send_private", gateway.send_private(owner_id, &text)).await {
                Ok(()) => {
                    delivered += 1;
                    self.sessions.lock().await.touch(owner_id);
                }
                Err(e) => {
                    failed += 1;
                    warn!(owner_id, timed_out = e.is_timeout(), "Failed to deliver batch: {}", e);
                }
            }
        }

        for &group_id in &destinations.groups {
            match with_timeout(self.request_timeout, "send_group", gateway.send_group(group_id, &text)).await {
                Ok(()) => {
                    delivered += 1;
                    self.sessions.lock().await.touch_group(group_id);
                }
                Err(e) => {
                    failed += 1;
                    warn!(group_id, timed_out = e.is_timeout(), "Failed to deliver batch: {}", e);
                }
            }
        }

        self.counters
            .messages_delivered
            .fetch_add((batch.len() * delivered) as u64, Ordering::Relaxed);
        self.counters
            .delivery_failures
            .fetch_add(failed as u64, Ordering::Relaxed);

        info!(
            messages = batch.len(),
            private = destinations.private.len(),
            groups = destinations.groups.len(),
            failed,
            "Game -> platform batch distributed"
        );
        (delivered, failed)
    }

    // ---------------------------------------------------------------
    // Sessions
    // ---------------------------------------------------------------

    async fn start_session(&self, owner_id: OwnerId, mode: ChatMode) -> StartOutcome {
        if !self.config.enabled {
            return StartOutcome::BridgeDisabled;
        }
        if !self.mode_allowed(mode) {
            return StartOutcome::ModeDisabled;
        }
        if self.sessions.lock().await.get(owner_id).is_some() {
            return StartOutcome::AlreadyActive;
        }

        let target = self.resolve_target().await;

        let mut sessions = self.sessions.lock().await;
        // Another command may have won the race while the target was resolved.
        if sessions.get(owner_id).is_some() {
            return StartOutcome::AlreadyActive;
        }
        StartOutcome::Started(sessions.create(owner_id, mode, target))
    }

    async fn stop_session(&self, owner_id: OwnerId) -> StopOutcome {
        match self.sessions.lock().await.remove(owner_id) {
            Some(_) => StopOutcome::Stopped,
            None => StopOutcome::NotActive,
        }
    }

    async fn switch_mode(&self, owner_id: OwnerId, new_mode: ChatMode) -> SwitchOutcome {
        let mut sessions = self.sessions.lock().await;
        let Some(current) = sessions.get(owner_id) else {
            return SwitchOutcome::NotActive;
        };
        if !self.mode_allowed(new_mode) {
            return SwitchOutcome::ModeDisabled;
        }
        if current.mode == new_mode {
            return SwitchOutcome::AlreadyInMode;
        }

        // Remove then recreate under one lock so the group index never sees
        // the owner in two places.
        let target = current.target.clone();
        sessions.remove(owner_id);
        SwitchOutcome::Switched(sessions.create(owner_id, new_mode, target))
    }

    async fn get_status(&self, owner_id: OwnerId) -> BridgeStatus {
        let sessions = self.sessions.lock().await;
        let active = sessions.active_sessions();
        let own = sessions.get(owner_id);

        BridgeStatus {
            active: own.is_some_and(|s| s.active),
            mode: own.map(|s| s.mode),
            target_cluster: own.map(|s| s.target.cluster.clone()),
            target_world: own.map(|s| s.target.world.clone()),
            global: GlobalStats {
                running: self.running.load(Ordering::SeqCst),
                total_sessions: active.len(),
                private_sessions: active.iter().filter(|s| !s.mode.is_group()).count(),
                group_sessions: active.iter().filter(|s| s.mode.is_group()).count(),
                sync_interval_seconds: self.config.sync_interval_seconds,
                cycles: self.counters.cycles.load(Ordering::Relaxed),
                messages_delivered: self.counters.messages_delivered.load(Ordering::Relaxed),
                delivery_failures: self.counters.delivery_failures.load(Ordering::Relaxed),
                relayed_outbound: self.counters.relayed_outbound.load(Ordering::Relaxed),
            },
        }
    }

    /// Pick the cluster/world a new session announces to.
    ///
    /// Configured defaults win; blanks are filled from the management API.
    async fn resolve_target(&self) -> WorldTarget {
        let poller = &self.deps.poller;
        let mut cluster = self.config.default_cluster.clone();
        let mut world = self.config.default_world.clone();

        if cluster.is_empty() {
            match with_timeout(self.request_timeout, "list_clusters", poller.list_clusters()).await {
                Ok(clusters) => cluster = clusters.into_iter().next().unwrap_or_default(),
                Err(e) => warn!("Could not pick a default cluster: {}", e),
            }
        }
        if world.is_empty() && !cluster.is_empty() {
            match with_timeout(self.request_timeout, "list_worlds", poller.list_worlds(&cluster)).await {
                Ok(worlds) => world = worlds.into_iter().next().unwrap_or_default(),
                Err(e) => warn!(cluster = %cluster, "Could not pick a default world: {}", e),
            }
        }

        WorldTarget::new(cluster, world)
    }

    // ---------------------------------------------------------------
    // Platform -> game
    // ---------------------------------------------------------------

    async fn relay_outbound(&self, owner_id: OwnerId, display_name: &str, content: &str) -> RelayOutcome {
        let target = {
            let sessions = self.sessions.lock().await;
            match sessions.get(owner_id) {
                Some(session) if session.active => session.target.clone(),
                _ => return RelayOutcome::NoSession,
            }
        };

        if let Err(reason) = self.filter.check_outbound(content, owner_id) {
            info!(owner_id, "FILTERED platform -> game: {}", reason);
            return RelayOutcome::Rejected(reason);
        }

        let ctx = FormatContext::new(display_name, content)
            .with_timestamp(self.deps.clock.now().format("%H:%M:%S").to_string())
            .with_location(&target.cluster, &target.world)
            .with_owner(owner_id);
        let text = self.outbound_formatter.format(&ctx);

        let sent = with_timeout(
            self.request_timeout,
            "send_announce",
            self.deps.gateway.send_announce(&target.cluster, &target.world, &text),
        )
        .await;

        if let Err(e) = sent {
            warn!(
                owner_id,
                cluster = %target.cluster,
                world = %target.world,
                "Failed to relay message into game: {}",
                e
            );
            return RelayOutcome::Failed(e.to_string());
        }

        info!(
            owner_id,
            cluster = %target.cluster,
            world = %target.world,
            "Platform -> game: {}",
            text
        );
        self.counters.relayed_outbound.fetch_add(1, Ordering::Relaxed);
        self.sessions.lock().await.touch(owner_id);

        let recorded = with_timeout(
            self.request_timeout,
            "append_outbound",
            self.deps.history.append_outbound(owner_id, display_name, content),
        )
        .await;
        if let Err(e) = recorded {
            warn!(owner_id, "Message delivered but not recorded in history: {}", e);
        }

        RelayOutcome::Delivered
    }
}
