//! Replica refresh agent.
//!
//! # Responsibilities
//! - Hold the replica's current snapshot and swap in newer ones
//! - Pull on demand (rate limited) or on a timer (automatic mode)
//! - Guarantee at most one refresh cycle in flight
//! - Announce this replica to its upstream

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time;

use crate::client::{ConfigClient, RpcError, RpcResult};
use crate::observability::metrics;
use crate::replica::candidates::resolve_candidates;
use crate::replica::gateway::GatewayResolver;
use crate::replica::{RefreshError, RefreshResult};
use crate::resilience::timeouts::with_timeout;
use crate::store::{Snapshot, Version};
use crate::tree::codec::decode_snapshot;
use crate::tree::{ConfigTree, TreeError};

/// Runtime settings of a [`RefreshAgent`].
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub own_url: Option<String>,
    pub master_url: Option<String>,
    pub servers: Vec<String>,
    pub gateway_url: Option<String>,
    pub gateway_option: Option<String>,
    pub refresh_interval: Duration,
    /// Minimum spacing of on-demand attempts after a cycle found no server.
    pub retry_interval: Duration,
    pub propagation_interval: Duration,
    pub auto_publish: bool,
    pub call_timeout: Duration,
    /// How long a forced refresh waits for one already in flight.
    pub force_wait: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            own_url: None,
            master_url: None,
            servers: Vec::new(),
            gateway_url: None,
            gateway_option: None,
            refresh_interval: Duration::from_secs(300),
            retry_interval: Duration::from_secs(30),
            propagation_interval: Duration::from_secs(60),
            auto_publish: true,
            call_timeout: Duration::from_secs(10),
            force_wait: Duration::from_secs(5),
        }
    }
}

/// What a refresh request ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A newer snapshot was installed.
    Updated { version: Version },
    /// At least one server answered and none was newer.
    UpToDate,
    /// Nothing was attempted.
    Skipped(SkipReason),
    /// Another cycle was in flight and finished within the wait.
    Joined,
    /// Another cycle was in flight and did not finish within the wait.
    GaveUp,
}

impl RefreshOutcome {
    /// Metric and wire label.
    pub fn label(&self) -> &'static str {
        match self {
            RefreshOutcome::Updated { .. } => "updated",
            RefreshOutcome::UpToDate => "up_to_date",
            RefreshOutcome::Skipped(SkipReason::Disabled) => "skipped_disabled",
            RefreshOutcome::Skipped(SkipReason::Automatic) => "skipped_automatic",
            RefreshOutcome::Skipped(SkipReason::Fresh) => "skipped_fresh",
            RefreshOutcome::Skipped(SkipReason::InFlight) => "skipped_in_flight",
            RefreshOutcome::Skipped(SkipReason::Backoff) => "skipped_backoff",
            RefreshOutcome::Joined => "joined",
            RefreshOutcome::GaveUp => "gave_up",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    Automatic,
    Fresh,
    InFlight,
    /// The last attempt found no server and the retry interval has not passed.
    Backoff,
}

#[derive(Debug, Error)]
enum CandidateError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("{server}: undecodable snapshot: {source}")]
    Payload { server: String, source: TreeError },
}

/// Keeps a replica's tree converging towards its upstream.
pub struct RefreshAgent<C: ConfigClient> {
    client: C,
    config: AgentConfig,
    gateway: GatewayResolver,
    local: ArcSwap<Snapshot>,
    last_refresh: Mutex<Option<Instant>>,
    /// Set when a cycle ends with no server available, cleared on success.
    last_failure: Mutex<Option<Instant>>,
    /// Held for the duration of one refresh cycle.
    in_flight: tokio::sync::Mutex<()>,
    enabled: AtomicBool,
    automatic: AtomicBool,
}

impl<C: ConfigClient> RefreshAgent<C> {
    pub fn new(client: C, config: AgentConfig) -> Self {
        let gateway = GatewayResolver::new(config.gateway_url.clone(), config.gateway_option.clone());
        Self {
            client,
            config,
            gateway,
            local: ArcSwap::from_pointee(Snapshot::empty()),
            last_refresh: Mutex::new(None),
            last_failure: Mutex::new(None),
            in_flight: tokio::sync::Mutex::new(()),
            enabled: AtomicBool::new(true),
            automatic: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.local.load_full()
    }

    pub fn tree(&self) -> Arc<ConfigTree> {
        self.local.load().tree.clone()
    }

    pub fn version(&self) -> Version {
        self.local.load().version.clone()
    }

    /// Time since the last cycle that reached a server.
    pub fn last_refresh_elapsed(&self) -> Option<Duration> {
        read_stamp(&self.last_refresh).map(|at| at.elapsed())
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    /// Stop refreshing. The automatic loop exits at its next tick.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_automatic(&self) -> bool {
        self.automatic.load(Ordering::SeqCst)
    }

    /// Refresh only if the last one is older than the refresh interval.
    ///
    /// Never waits: a cycle already in flight makes this a no-op. After a
    /// cycle that found no server, further attempts are spaced by
    /// `retry_interval`.
    pub async fn refresh_if_needed(&self) -> RefreshResult<RefreshOutcome> {
        if !self.is_enabled() {
            return Ok(RefreshOutcome::Skipped(SkipReason::Disabled));
        }
        if self.is_automatic() {
            return Ok(RefreshOutcome::Skipped(SkipReason::Automatic));
        }
        if let Some(reason) = self.idle_reason() {
            return Ok(RefreshOutcome::Skipped(reason));
        }

        let Ok(_guard) = self.in_flight.try_lock() else {
            return Ok(RefreshOutcome::Skipped(SkipReason::InFlight));
        };
        // A cycle may have completed between the check and the lock.
        if let Some(reason) = self.idle_reason() {
            return Ok(RefreshOutcome::Skipped(reason));
        }
        self.record(self.pull_and_apply().await)
    }

    /// Run one cycle now, ignoring the refresh interval.
    ///
    /// If a cycle is already in flight, waits up to `force_wait` for it
    /// instead of starting a second one.
    pub async fn force_refresh(&self) -> RefreshResult<RefreshOutcome> {
        if !self.is_enabled() {
            return Ok(RefreshOutcome::Skipped(SkipReason::Disabled));
        }

        if let Ok(_guard) = self.in_flight.try_lock() {
            return self.record(self.pull_and_apply().await);
        }

        let outcome = match time::timeout(self.config.force_wait, self.in_flight.lock()).await {
            Ok(_guard) => RefreshOutcome::Joined,
            Err(_) => {
                tracing::warn!(
                    wait = ?self.config.force_wait,
                    "Refresh in flight did not finish in time, giving up"
                );
                RefreshOutcome::GaveUp
            }
        };
        self.record(Ok(outcome))
    }

    /// One refresh cycle: ask candidates in order, install the first newer
    /// snapshot found.
    ///
    /// Callers outside this type should go through `refresh_if_needed` or
    /// `force_refresh`, which add single-flight protection.
    pub async fn pull_and_apply(&self) -> RefreshResult<RefreshOutcome> {
        let current = self.local.load_full();
        let candidates = resolve_candidates(
            self.gateway.resolve(&current.tree),
            &self.config.servers,
            self.config.master_url.as_deref(),
            self.config.own_url.as_deref(),
            &mut rand::thread_rng(),
        );
        if candidates.is_empty() {
            stamp(&self.last_failure, Some(Instant::now()));
            return Err(RefreshError::NoServerAvailable {
                tried: 0,
                last_error: "no servers configured".to_string(),
            });
        }

        let mut answered = false;
        let mut last_error = String::new();

        for server in &candidates {
            match self.try_candidate(server, &current.version).await {
                Ok(Some(snapshot)) => {
                    if let Some(version) = self.install(snapshot, server) {
                        self.touch();
                        return Ok(RefreshOutcome::Updated { version });
                    }
                    answered = true;
                }
                Ok(None) => {
                    tracing::debug!(server = %server, version = %current.version, "Server has nothing newer");
                    answered = true;
                }
                Err(e) => {
                    tracing::warn!(server = %server, error = %e, "Refresh candidate failed");
                    metrics::record_candidate_failure();
                    last_error = e.to_string();
                }
            }
        }

        if answered {
            self.touch();
            return Ok(RefreshOutcome::UpToDate);
        }

        tracing::error!(
            tried = candidates.len(),
            error = %last_error,
            "No server available for refresh, keeping current configuration"
        );
        stamp(&self.last_failure, Some(Instant::now()));
        Err(RefreshError::NoServerAvailable {
            tried: candidates.len(),
            last_error,
        })
    }

    /// Announce `own_url` and the local version to the upstream.
    pub async fn publish(&self, own_url: &str) -> RpcResult<()> {
        let Some(upstream) = self.upstream() else {
            tracing::debug!("No upstream to publish to");
            return Ok(());
        };
        let version = self.version();
        let budget = self.config.call_timeout;

        with_timeout(
            &upstream,
            budget,
            self.client.publish_slave(&upstream, own_url, Some(&version), budget),
        )
        .await?;
        tracing::debug!(upstream = %upstream, version = %version, "Published to upstream");
        Ok(())
    }

    /// Pull every propagation interval until disabled or shut down.
    ///
    /// Every tick also re-announces this replica upstream, so an upstream
    /// that restarted learns about it again without waiting for a commit.
    /// While this runs, `refresh_if_needed` becomes a no-op.
    pub async fn run_automatic(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        self.automatic.store(true, Ordering::SeqCst);
        let own_url = self.config.own_url.clone().filter(|_| self.config.auto_publish);

        tracing::info!(
            interval = ?self.config.propagation_interval,
            own_url = own_url.as_deref().unwrap_or("-"),
            "Automatic refresh starting"
        );

        if let Some(url) = &own_url {
            if let Err(e) = self.publish(url).await {
                tracing::warn!(error = %e, "Initial publish failed");
            }
        }

        let mut ticker = time::interval(self.config.propagation_interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.is_enabled() {
                        tracing::info!("Refresh disabled, stopping automatic loop");
                        break;
                    }
                    self.automatic_cycle(own_url.as_deref()).await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Automatic refresh received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        self.automatic.store(false, Ordering::SeqCst);
    }

    async fn automatic_cycle(self: &Arc<Self>, own_url: Option<&str>) {
        let agent = Arc::clone(self);
        // Spawned so a panic in one cycle does not end the loop.
        let cycle = tokio::spawn(async move {
            let _guard = agent.in_flight.lock().await;
            let result = agent.pull_and_apply().await;
            agent.record(result)
        });

        match cycle.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Automatic refresh cycle failed"),
            Err(e) => tracing::error!(error = %e, "Automatic refresh cycle aborted"),
        }

        if let Some(url) = own_url {
            if let Err(e) = self.publish(url).await {
                tracing::warn!(error = %e, "Publish to upstream failed");
            }
        }
    }

    async fn try_candidate(
        &self,
        server: &str,
        local: &Version,
    ) -> Result<Option<Snapshot>, CandidateError> {
        let budget = self.config.call_timeout;

        let remote = with_timeout(server, budget, self.client.get_version(server, budget)).await?;
        if !remote.is_newer_than(local) {
            return Ok(None);
        }

        let reply = with_timeout(
            server,
            budget,
            self.client.get_snapshot(server, Some(local), budget),
        )
        .await?;
        let Some(data) = reply.data else {
            return Ok(None);
        };
        if !reply.version.is_newer_than(local) {
            return Ok(None);
        }

        let tree = decode_snapshot(&data).map_err(|source| CandidateError::Payload {
            server: server.to_string(),
            source,
        })?;
        Ok(Some(Snapshot::from_parts(reply.version, tree, data)))
    }

    /// Swap in `snapshot` unless something at least as new is installed.
    fn install(&self, snapshot: Snapshot, server: &str) -> Option<Version> {
        let incoming = Arc::new(snapshot);
        let previous = self.local.rcu(|current| {
            if incoming.version.is_newer_than(&current.version) {
                Arc::clone(&incoming)
            } else {
                Arc::clone(current)
            }
        });
        if !incoming.version.is_newer_than(&previous.version) {
            return None;
        }

        let changes = previous.tree.diff(&incoming.tree);
        tracing::info!(
            server = %server,
            from = %previous.version,
            to = %incoming.version,
            changes = changes.len(),
            "Installed newer configuration"
        );
        metrics::record_version_change();
        Some(incoming.version.clone())
    }

    fn record(&self, result: RefreshResult<RefreshOutcome>) -> RefreshResult<RefreshOutcome> {
        match &result {
            Ok(outcome) => metrics::record_refresh(outcome.label()),
            Err(_) => metrics::record_refresh("no_server"),
        }
        result
    }

    fn upstream(&self) -> Option<String> {
        let current = self.local.load();
        self.gateway
            .resolve(&current.tree)
            .or_else(|| self.config.master_url.clone())
            .or_else(|| self.config.servers.first().cloned())
    }

    fn idle_reason(&self) -> Option<SkipReason> {
        if read_stamp(&self.last_refresh).is_some_and(|at| at.elapsed() < self.config.refresh_interval) {
            return Some(SkipReason::Fresh);
        }
        if read_stamp(&self.last_failure).is_some_and(|at| at.elapsed() < self.config.retry_interval) {
            return Some(SkipReason::Backoff);
        }
        None
    }

    fn touch(&self) {
        stamp(&self.last_refresh, Some(Instant::now()));
        stamp(&self.last_failure, None);
    }
}

fn read_stamp(slot: &Mutex<Option<Instant>>) -> Option<Instant> {
    *slot.lock().unwrap_or_else(|e| e.into_inner())
}

fn stamp(slot: &Mutex<Option<Instant>>, value: Option<Instant>) {
    *slot.lock().unwrap_or_else(|e| e.into_inner()) = value;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::Identity;
    use crate::store::{CommitMode, HistoryRecord, SnapshotReply, StoreConfig, VersionedStore};
    use std::collections::HashMap;

    #[derive(Clone)]
    enum Fake {
        Up(Arc<VersionedStore>),
        Down,
        Hang,
    }

    #[derive(Default)]
    struct FakeClient {
        servers: Mutex<HashMap<String, Fake>>,
        version_calls: Mutex<HashMap<String, usize>>,
        snapshot_calls: Mutex<usize>,
        published: Mutex<Vec<(String, String)>>,
        delay: Duration,
    }

    impl FakeClient {
        fn with(servers: &[(&str, Fake)]) -> Self {
            Self {
                servers: Mutex::new(servers.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()),
                ..Default::default()
            }
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn lookup(&self, server: &str) -> Fake {
            self.servers.lock().unwrap().get(server).cloned().unwrap_or(Fake::Down)
        }

        fn version_calls(&self, server: &str) -> usize {
            self.version_calls.lock().unwrap().get(server).copied().unwrap_or(0)
        }

        fn unreachable(server: &str) -> RpcError {
            RpcError::Transport {
                server: server.to_string(),
                message: "connection refused".to_string(),
            }
        }

        async fn reach(&self, server: &str) -> RpcResult<Arc<VersionedStore>> {
            let fake = self.lookup(server);
            tokio::time::sleep(self.delay).await;
            match fake {
                Fake::Up(store) => Ok(store),
                Fake::Down => Err(Self::unreachable(server)),
                Fake::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(Self::unreachable(server))
                }
            }
        }
    }

    impl ConfigClient for FakeClient {
        async fn get_version(&self, server: &str, _timeout: Duration) -> RpcResult<Version> {
            *self.version_calls.lock().unwrap().entry(server.to_string()).or_default() += 1;
            Ok(self.reach(server).await?.version())
        }

        async fn get_snapshot(
            &self,
            server: &str,
            since: Option<&Version>,
            _timeout: Duration,
        ) -> RpcResult<SnapshotReply> {
            *self.snapshot_calls.lock().unwrap() += 1;
            let store = self.reach(server).await?;
            Ok(match since {
                Some(v) => store.compressed_snapshot_if_newer(v),
                None => store.compressed_snapshot(),
            })
        }

        async fn publish_slave(
            &self,
            server: &str,
            url: &str,
            _version: Option<&Version>,
            _timeout: Duration,
        ) -> RpcResult<()> {
            self.reach(server).await?;
            self.published
                .lock()
                .unwrap()
                .push((server.to_string(), url.to_string()));
            Ok(())
        }

        async fn commit(
            &self,
            server: &str,
            _payload: &[u8],
            _mode: CommitMode,
            _timeout: Duration,
        ) -> RpcResult<Version> {
            Err(Self::unreachable(server))
        }

        async fn commit_history(
            &self,
            server: &str,
            _limit: usize,
            _timeout: Duration,
        ) -> RpcResult<Vec<HistoryRecord>> {
            Err(Self::unreachable(server))
        }

        async fn historical_snapshot(
            &self,
            server: &str,
            _version: &Version,
            _timeout: Duration,
        ) -> RpcResult<Vec<u8>> {
            Err(Self::unreachable(server))
        }

        async fn rollback(&self, server: &str, _version: &Version, _timeout: Duration) -> RpcResult<Version> {
            Err(Self::unreachable(server))
        }
    }

    fn master(text: &str) -> Arc<VersionedStore> {
        let tree = ConfigTree::load(text).unwrap();
        Arc::new(VersionedStore::new(StoreConfig::default(), tree).unwrap())
    }

    fn config() -> AgentConfig {
        AgentConfig {
            master_url: Some("http://master".into()),
            call_timeout: Duration::from_millis(100),
            force_wait: Duration::from_millis(50),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_converges_to_master() {
        let store = master("Systems\n{\n  DB = host1\n}\n");
        let client = FakeClient::with(&[("http://master", Fake::Up(store.clone()))]);
        let agent = RefreshAgent::new(client, config());

        let outcome = agent.refresh_if_needed().await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Updated { version: store.version() });
        assert_eq!(agent.version(), store.version());
        assert_eq!(agent.tree().get_option("/Systems/DB"), Some("host1"));
        assert_eq!(agent.snapshot().compressed, store.snapshot().compressed);
        assert!(agent.last_refresh_elapsed().is_some());

        // Within the interval nothing is contacted.
        assert_eq!(
            agent.refresh_if_needed().await.unwrap(),
            RefreshOutcome::Skipped(SkipReason::Fresh)
        );
        assert_eq!(agent.client.version_calls("http://master"), 1);
    }

    #[tokio::test]
    async fn test_up_to_date_fetches_no_snapshot() {
        let store = master("A = 1\n");
        let client = FakeClient::with(&[("http://master", Fake::Up(store.clone()))]);
        let agent = RefreshAgent::new(client, config());

        agent.force_refresh().await.unwrap();
        assert_eq!(*agent.client.snapshot_calls.lock().unwrap(), 1);

        assert_eq!(agent.force_refresh().await.unwrap(), RefreshOutcome::UpToDate);
        assert_eq!(*agent.client.snapshot_calls.lock().unwrap(), 1);
        assert_eq!(agent.version(), store.version());
    }

    #[tokio::test]
    async fn test_follows_new_commits() {
        let store = master("A = 1\n");
        let client = FakeClient::with(&[("http://master", Fake::Up(store.clone()))]);
        let agent = RefreshAgent::new(client, config());
        agent.force_refresh().await.unwrap();

        let tree = ConfigTree::load("B = 2\n").unwrap();
        let v2 = store
            .commit_tree(tree, CommitMode::Merge, &Identity::writer("admin"))
            .unwrap();

        assert_eq!(
            agent.force_refresh().await.unwrap(),
            RefreshOutcome::Updated { version: v2.clone() }
        );
        assert_eq!(agent.tree().get_option("/A"), Some("1"));
        assert_eq!(agent.tree().get_option("/B"), Some("2"));
    }

    #[tokio::test]
    async fn test_single_flight() {
        let store = master("A = 1\n");
        let client = FakeClient::with(&[("http://master", Fake::Up(store))])
            .delayed(Duration::from_millis(50));
        let agent = RefreshAgent::new(client, config());

        let (first, second) = tokio::join!(agent.refresh_if_needed(), agent.refresh_if_needed());

        assert!(matches!(first.unwrap(), RefreshOutcome::Updated { .. }));
        assert_eq!(second.unwrap(), RefreshOutcome::Skipped(SkipReason::InFlight));
        assert_eq!(agent.client.version_calls("http://master"), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_joins_or_gives_up() {
        let store = master("A = 1\n");
        let client = FakeClient::with(&[("http://master", Fake::Up(store))])
            .delayed(Duration::from_millis(80));

        let agent = RefreshAgent::new(client, config());
        let (first, second) = tokio::join!(agent.force_refresh(), agent.force_refresh());
        assert!(matches!(first.unwrap(), RefreshOutcome::Updated { .. }));
        assert_eq!(second.unwrap(), RefreshOutcome::GaveUp);

        let patient = RefreshAgent::new(
            FakeClient::with(&[("http://master", Fake::Up(master("A = 1\n")))])
                .delayed(Duration::from_millis(20)),
            AgentConfig {
                force_wait: Duration::from_secs(2),
                ..config()
            },
        );
        let (first, second) = tokio::join!(patient.force_refresh(), patient.force_refresh());
        assert!(matches!(first.unwrap(), RefreshOutcome::Updated { .. }));
        assert_eq!(second.unwrap(), RefreshOutcome::Joined);
        assert_eq!(patient.client.version_calls("http://master"), 1);
    }

    #[tokio::test]
    async fn test_gateway_is_sole_candidate() {
        let store = master("A = 1\n");
        let client = FakeClient::with(&[
            ("http://gw", Fake::Up(store.clone())),
            ("http://master", Fake::Up(store.clone())),
            ("http://s1", Fake::Up(store)),
        ]);
        let agent = RefreshAgent::new(
            client,
            AgentConfig {
                gateway_url: Some("http://gw".into()),
                servers: vec!["http://s1".into()],
                ..config()
            },
        );

        agent.force_refresh().await.unwrap();
        assert_eq!(agent.client.version_calls("http://gw"), 1);
        assert_eq!(agent.client.version_calls("http://s1"), 0);
        assert_eq!(agent.client.version_calls("http://master"), 0);
    }

    #[tokio::test]
    async fn test_falls_back_past_failed_candidates() {
        let store = master("A = 1\n");
        let client = FakeClient::with(&[
            ("http://dead", Fake::Down),
            ("http://slow", Fake::Hang),
            ("http://master", Fake::Up(store.clone())),
        ]);
        let agent = RefreshAgent::new(
            client,
            AgentConfig {
                servers: vec!["http://dead".into(), "http://slow".into()],
                ..config()
            },
        );

        let outcome = agent.force_refresh().await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Updated { version: store.version() });
        assert_eq!(agent.client.version_calls("http://master"), 1);
    }

    #[tokio::test]
    async fn test_no_server_available_keeps_state() {
        let client = FakeClient::with(&[("http://master", Fake::Down), ("http://s1", Fake::Hang)]);
        let agent = RefreshAgent::new(
            client,
            AgentConfig {
                servers: vec!["http://s1".into()],
                ..config()
            },
        );

        let err = agent.force_refresh().await.unwrap_err();
        let RefreshError::NoServerAvailable { tried, .. } = err;
        assert_eq!(tried, 2);
        assert!(agent.version().is_zero());
        assert!(agent.last_refresh_elapsed().is_none());
    }

    #[tokio::test]
    async fn test_nothing_configured() {
        let agent = RefreshAgent::new(FakeClient::default(), AgentConfig::default());
        assert_eq!(
            agent.force_refresh().await.unwrap_err(),
            RefreshError::NoServerAvailable {
                tried: 0,
                last_error: "no servers configured".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_disabled_does_nothing() {
        let store = master("A = 1\n");
        let client = FakeClient::with(&[("http://master", Fake::Up(store))]);
        let agent = RefreshAgent::new(client, config());
        agent.disable();

        assert_eq!(
            agent.refresh_if_needed().await.unwrap(),
            RefreshOutcome::Skipped(SkipReason::Disabled)
        );
        assert_eq!(
            agent.force_refresh().await.unwrap(),
            RefreshOutcome::Skipped(SkipReason::Disabled)
        );
        assert_eq!(agent.client.version_calls("http://master"), 0);

        agent.enable();
        assert!(matches!(
            agent.refresh_if_needed().await.unwrap(),
            RefreshOutcome::Updated { .. }
        ));
    }

    #[tokio::test]
    async fn test_automatic_mode_publishes_and_follows() {
        let store = master("A = 1\n");
        let client = FakeClient::with(&[("http://master", Fake::Up(store.clone()))]);
        let agent = Arc::new(RefreshAgent::new(
            client,
            AgentConfig {
                own_url: Some("http://replica".into()),
                propagation_interval: Duration::from_millis(20),
                ..config()
            },
        ));

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(Arc::clone(&agent).run_automatic(rx));

        let v2 = store
            .commit_tree(ConfigTree::load("B = 2\n").unwrap(), CommitMode::Merge, &Identity::writer("admin"))
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while agent.version() != v2 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(agent.version(), v2);
        assert!(agent.is_automatic());
        assert_eq!(
            agent.refresh_if_needed().await.unwrap(),
            RefreshOutcome::Skipped(SkipReason::Automatic)
        );

        let published = agent.client.published.lock().unwrap().clone();
        assert!(published.contains(&("http://master".to_string(), "http://replica".to_string())));

        tx.send(()).unwrap();
        handle.await.unwrap();
        assert!(!agent.is_automatic());
    }

    #[tokio::test]
    async fn test_automatic_mode_republishes_without_updates() {
        let store = master("A = 1\n");
        let client = FakeClient::with(&[("http://master", Fake::Up(store.clone()))]);
        let agent = Arc::new(RefreshAgent::new(
            client,
            AgentConfig {
                own_url: Some("http://replica".into()),
                propagation_interval: Duration::from_millis(20),
                ..config()
            },
        ));

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(Arc::clone(&agent).run_automatic(rx));

        // One update at most; every later tick finds the master unchanged.
        let deadline = Instant::now() + Duration::from_secs(5);
        while agent.client.published.lock().unwrap().len() < 5 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(agent.client.published.lock().unwrap().len() >= 5);
        assert_eq!(agent.version(), store.version());

        tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_sweeps_are_spaced_by_retry_interval() {
        let store = master("A = 1\n");
        let client = FakeClient::with(&[("http://master", Fake::Down)]);
        let agent = RefreshAgent::new(
            client,
            AgentConfig {
                retry_interval: Duration::from_millis(100),
                ..config()
            },
        );

        assert!(agent.refresh_if_needed().await.is_err());
        for _ in 0..5 {
            assert_eq!(
                agent.refresh_if_needed().await.unwrap(),
                RefreshOutcome::Skipped(SkipReason::Backoff)
            );
        }
        assert_eq!(agent.client.version_calls("http://master"), 1);

        // A forced refresh is not held back.
        assert!(agent.force_refresh().await.is_err());
        assert_eq!(agent.client.version_calls("http://master"), 2);

        agent
            .client
            .servers
            .lock()
            .unwrap()
            .insert("http://master".to_string(), Fake::Up(store.clone()));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(
            agent.refresh_if_needed().await.unwrap(),
            RefreshOutcome::Updated { version: store.version() }
        );
        assert_eq!(
            agent.refresh_if_needed().await.unwrap(),
            RefreshOutcome::Skipped(SkipReason::Fresh)
        );
    }
}
