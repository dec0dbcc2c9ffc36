//! Sync scheduler implementation
//!
//! Runs as a tokio task: one pass over every configured partition, then a
//! sleep, forever. A pass in which every partition failed adds the error
//! backoff on top of the regular interval.

use crate::config::IndexerConfig;
use crate::metagraph::SnapshotPayload;
use crate::metrics;
use crate::storage::SnapshotStore;
use crate::upstream::UpstreamClient;
use crate::{IndexerError, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Default event channel capacity
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Partitions synced on every pass, in order
    pub partitions: Vec<u16>,

    /// Sleep between passes
    pub interval: Duration,

    /// Extra sleep after a failed pass
    pub error_backoff: Duration,

    pub event_channel_capacity: usize,
}

impl SyncConfig {
    pub fn new(partitions: Vec<u16>) -> Self {
        let defaults = IndexerConfig::default();
        Self {
            partitions,
            interval: defaults.sync_interval(),
            error_backoff: defaults.error_backoff(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }

    /// Take partitions and timings from the indexer configuration
    pub fn from_indexer(config: &IndexerConfig) -> Self {
        Self {
            partitions: config.partitions.clone(),
            interval: config.sync_interval(),
            error_backoff: config.error_backoff(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

/// What the scheduler is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
}

/// Events emitted by the scheduler
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    PassStarted,

    /// A partition's snapshot was replaced
    PartitionSynced {
        netuid: u16,
        version: i64,
        neurons: usize,
    },

    /// A partition kept its previous snapshot
    PartitionFailed { netuid: u16, error: String },

    /// At least one partition synced
    PassCompleted { synced: usize, failed: usize },

    /// Every partition failed
    PassFailed { error: String },
}

/// Outcome of one pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassReport {
    pub synced: Vec<u16>,
    pub failed: Vec<(u16, String)>,
}

impl PassReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Periodic metagraph synchronizer
pub struct SyncScheduler {
    config: SyncConfig,
    upstream: Arc<dyn UpstreamClient>,
    store: Arc<dyn SnapshotStore>,
    event_tx: broadcast::Sender<SyncEvent>,
    state_tx: watch::Sender<SyncState>,
}

impl SyncScheduler {
    pub fn new(
        config: SyncConfig,
        upstream: Arc<dyn UpstreamClient>,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        let (state_tx, _) = watch::channel(SyncState::Idle);

        Self {
            config,
            upstream,
            store,
            event_tx,
            state_tx,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> SyncState {
        *self.state_tx.borrow()
    }

    /// Get an event subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    fn send_event(&self, event: SyncEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::trace!("Sync event sent but no receivers subscribed");
        }
    }

    fn set_state(&self, state: SyncState) {
        self.state_tx.send_replace(state);
        metrics::set_syncing(state == SyncState::Syncing);
    }

    /// Sync every partition once
    ///
    /// Fails with [`IndexerError::UpstreamUnavailable`] only when no partition
    /// could be synced.
    pub async fn run_pass(&self) -> Result<PassReport> {
        self.set_state(SyncState::Syncing);
        self.send_event(SyncEvent::PassStarted);

        let mut report = PassReport::default();

        for &netuid in &self.config.partitions {
            let started = Instant::now();

            match self.sync_partition(netuid).await {
                Ok((version, neurons)) => {
                    let elapsed = started.elapsed().as_secs_f64();
                    metrics::record_sync_duration(netuid, elapsed);
                    metrics::set_neurons(netuid, neurons);
                    tracing::info!(netuid, version, neurons, elapsed_secs = elapsed, "Partition synced");

                    report.synced.push(netuid);
                    self.send_event(SyncEvent::PartitionSynced {
                        netuid,
                        version,
                        neurons,
                    });
                }
                Err(e) => {
                    metrics::record_partition_error(netuid, error_kind(&e));
                    tracing::warn!(netuid, error = %e, "Partition sync failed; keeping previous snapshot");

                    report.failed.push((netuid, e.to_string()));
                    self.send_event(SyncEvent::PartitionFailed {
                        netuid,
                        error: e.to_string(),
                    });
                }
            }
        }

        self.set_state(SyncState::Idle);

        if report.synced.is_empty() && !report.failed.is_empty() {
            let detail = report
                .failed
                .iter()
                .map(|(netuid, error)| format!("netuid {}: {}", netuid, error))
                .collect::<Vec<_>>()
                .join("; ");
            metrics::record_sync_pass("failed");
            self.send_event(SyncEvent::PassFailed {
                error: detail.clone(),
            });
            return Err(IndexerError::UpstreamUnavailable(format!(
                "every partition failed: {}",
                detail
            )));
        }

        metrics::record_sync_pass(if report.is_complete() { "ok" } else { "partial" });
        self.send_event(SyncEvent::PassCompleted {
            synced: report.synced.len(),
            failed: report.failed.len(),
        });

        Ok(report)
    }

    /// Fetch, convert and store one partition, returning the stored version
    /// and the neuron count
    async fn sync_partition(&self, netuid: u16) -> Result<(i64, usize)> {
        let snapshot = self.upstream.fetch_snapshot(netuid).await?;
        let payload = SnapshotPayload::from_upstream(&snapshot)?;
        let json = payload.to_json()?;

        let version = self
            .store
            .upsert_latest(netuid, &json, Utc::now().timestamp_millis())?;

        Ok((version, payload.table_data.len()))
    }

    /// Run passes until the task is cancelled
    pub async fn run(&self) {
        tracing::info!(
            partitions = ?self.config.partitions,
            interval_secs = self.config.interval.as_secs_f64(),
            "Sync scheduler started"
        );

        loop {
            match self.run_pass().await {
                Ok(report) => {
                    tracing::debug!(
                        synced = report.synced.len(),
                        failed = report.failed.len(),
                        "Sync pass finished"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, backoff_secs = self.config.error_backoff.as_secs_f64(), "Sync pass failed");
                    tokio::time::sleep(self.config.error_backoff).await;
                }
            }

            tokio::time::sleep(self.config.interval).await;
        }
    }

    /// Start [`SyncScheduler::run`] on the current runtime
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }
}

fn error_kind(error: &IndexerError) -> &'static str {
    match error {
        IndexerError::UpstreamUnavailable(_) | IndexerError::Http(_) => "upstream_unavailable",
        IndexerError::Upstream(_) => "upstream",
        IndexerError::InvalidSnapshot(_) | IndexerError::Json(_) => "invalid_snapshot",
        IndexerError::StoreWriteFailure(_) | IndexerError::Database(_) => "store",
        _ => "other",
    }
}
