//! The node directory.
//!
//! [`NodeDirectory`] owns the current [`DirectorySnapshot`] and replaces it on
//! every successful refresh. Reads never wait on the network: the refresh
//! path fetches into a local snapshot and only then publishes it.
//!
//! Refreshes are serialized. A refresh requested while another one is running
//! fails immediately with [`ClustersetError::RefreshInProgress`]; the
//! background task treats that as a skipped tick.
//!
//! A failed refresh leaves the previous snapshot in place. Once the directory
//! has published a snapshot it never goes back to not-ready.
//!
//! Directories may share a [`SnapshotStore`]. Each serializes only its own
//! refreshes; the store hands out versions, so they stay unique and
//! increasing across all writers.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::config::{DirectoryConfig, ResolverConfig};
use crate::error::{ClustersetError, Result};
use crate::resolver::Resolver;
use crate::snapshot::{Clock, DirectorySnapshot, LockedSnapshotStore, SnapshotStore, SystemClock};
use crate::source::DirectorySource;

/// Counters describing refresh activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStats {
    /// Refreshes that reached the source.
    pub attempts: u64,
    /// Refreshes that published a snapshot.
    pub successes: u64,
    /// Refreshes that failed.
    pub failures: u64,
    /// Failures since the last success.
    pub consecutive_failures: u64,
    /// Message of the most recent failure.
    pub last_error: Option<String>,
    /// When the last snapshot was published.
    pub last_success_at: Option<DateTime<Utc>>,
}

/// Cached, periodically refreshed view of the mesh nodes.
pub struct NodeDirectory<S> {
    source: S,
    config: DirectoryConfig,
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    refresh_lock: tokio::sync::Mutex<()>,
    stats: Mutex<RefreshStats>,
    // Next tick of the background task, while one is running.
    next_tick_at: Mutex<Option<DateTime<Utc>>>,
}

impl<S> std::fmt::Debug for NodeDirectory<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDirectory")
            .field("config", &self.config)
            .field("version", &self.store.load().map(|s| s.version()))
            .field("stats", &*self.stats.lock())
            .finish_non_exhaustive()
    }
}

impl<S: DirectorySource> NodeDirectory<S> {
    /// Creates a directory that has not been refreshed yet.
    pub fn new(source: S, config: DirectoryConfig) -> Self {
        Self {
            source,
            config,
            store: Arc::new(LockedSnapshotStore::new()),
            clock: Arc::new(SystemClock),
            refresh_lock: tokio::sync::Mutex::new(()),
            stats: Mutex::new(RefreshStats::default()),
            next_tick_at: Mutex::new(None),
        }
    }

    /// Publishes snapshots into `store` instead of a private one.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = store;
        self
    }

    /// Uses `clock` for snapshot timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// The underlying directory source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The store snapshots are published into.
    #[must_use]
    pub fn store(&self) -> Arc<dyn SnapshotStore> {
        Arc::clone(&self.store)
    }

    /// Builds a resolver reading from this directory.
    #[must_use]
    pub fn resolver(&self, config: &ResolverConfig) -> Resolver {
        Resolver::new(self.store(), config)
    }

    /// Returns the latest snapshot without waiting on any refresh.
    pub fn current(&self) -> Result<Arc<DirectorySnapshot>> {
        self.store.load().ok_or(ClustersetError::DirectoryNotReady)
    }

    /// Returns true once a refresh has succeeded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.store.load().is_some()
    }

    /// Refresh counters.
    #[must_use]
    pub fn stats(&self) -> RefreshStats {
        self.stats.lock().clone()
    }

    /// Fetches all nodes and publishes a new snapshot.
    ///
    /// The fetch is bounded by the configured refresh timeout and abandoned
    /// when `cancel` fires. On any failure the current snapshot is untouched.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<Arc<DirectorySnapshot>> {
        let Ok(_guard) = self.refresh_lock.try_lock() else {
            debug!("Refresh requested while another is running");
            return Err(ClustersetError::RefreshInProgress);
        };

        self.stats.lock().attempts += 1;

        let filter = self.config.filter();
        let timeout = self.config.refresh_timeout();
        let fetched = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ClustersetError::RefreshCancelled),
            listed = tokio::time::timeout(timeout, self.source.list_nodes(&filter)) => match listed {
                Ok(Ok(nodes)) => Ok(nodes),
                Ok(Err(err)) => Err(ClustersetError::from_source(err)),
                Err(_) => Err(ClustersetError::refresh_timeout(self.config.refresh_timeout_secs)),
            },
        };

        let nodes = match fetched {
            Ok(nodes) => nodes,
            Err(err) => {
                let consecutive = self.record_failure(&err);
                warn!(
                    error = %err,
                    consecutive_failures = consecutive,
                    stale_version = ?self.store.load().map(|s| s.version()),
                    "Directory refresh failed, keeping previous snapshot"
                );
                return Err(err);
            }
        };

        let fetched_at = self.clock.now();
        let next_refresh_at = (*self.next_tick_at.lock())
            .filter(|at| *at > fetched_at)
            .unwrap_or_else(|| self.after_interval(fetched_at));
        let received = nodes.len();

        let snapshot = self.store.publish_next(DirectorySnapshot::new(
            0,
            fetched_at,
            next_refresh_at,
            nodes,
        ));
        let version = snapshot.version();

        {
            let mut stats = self.stats.lock();
            stats.successes += 1;
            stats.consecutive_failures = 0;
            stats.last_success_at = Some(fetched_at);
        }

        info!(
            version,
            nodes = snapshot.len(),
            online = snapshot.online_count(),
            dropped = received - snapshot.len(),
            "Published directory snapshot"
        );

        Ok(snapshot)
    }

    fn after_interval(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        let interval = TimeDelta::from_std(self.config.refresh_interval()).unwrap_or(TimeDelta::zero());
        from.checked_add_signed(interval).unwrap_or(from)
    }

    fn record_failure(&self, err: &ClustersetError) -> u64 {
        let mut stats = self.stats.lock();
        stats.failures += 1;
        stats.consecutive_failures += 1;
        stats.last_error = Some(err.to_string());
        stats.consecutive_failures
    }

    /// Starts refreshing in the background, once immediately and then on
    /// every interval tick.
    ///
    /// The task stops when `cancel` is cancelled or the returned handle is
    /// shut down or dropped.
    pub fn spawn_refresh_task(self: &Arc<Self>, cancel: CancellationToken) -> RefreshTask {
        let cancel = cancel.child_token();
        let directory = Arc::clone(self);
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            directory.run_refresh_loop(task_cancel).await;
        });

        RefreshTask {
            guard: cancel.drop_guard(),
            handle,
        }
    }

    async fn run_refresh_loop(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.refresh_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.config.refresh_interval_secs,
            timeout_secs = self.config.refresh_timeout_secs,
            "Directory refresh task started"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            *self.next_tick_at.lock() = Some(self.after_interval(self.clock.now()));

            match self.refresh(&cancel).await {
                Ok(_) => {}
                Err(ClustersetError::RefreshInProgress) => {
                    debug!("Skipping scheduled refresh, one is already running");
                }
                Err(ClustersetError::RefreshCancelled) => break,
                // Already logged by `refresh`; the next tick retries.
                Err(_) => {}
            }
        }

        *self.next_tick_at.lock() = None;
        info!("Directory refresh task stopped");
    }
}

/// Handle to the background refresh task. Dropping it stops the task.
#[derive(Debug)]
pub struct RefreshTask {
    guard: DropGuard,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    /// Token that stops the task when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        self.guard.token()
    }

    /// Returns true once the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the task and waits for it to exit.
    pub async fn shutdown(self) {
        self.guard.disarm().cancel();
        if let Err(err) = self.handle.await {
            warn!(error = %err, "Directory refresh task did not exit cleanly");
        }
    }
}
