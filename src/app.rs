//! Process-wide application context
//!
//! Built once at startup and shared by the sync task and the HTTP handlers.

use crate::cache::CacheRegistry;
use crate::config::{validate_config_result, IndexerConfig};
use crate::stats::MetricsAggregator;
use crate::storage::{SnapshotStore, SqliteSnapshotStore};
use crate::sync::{SyncConfig, SyncScheduler};
use crate::upstream::{JsonRpcUpstreamClient, UpstreamClient};
use crate::Result;
use std::sync::Arc;

pub struct AppContext {
    pub config: IndexerConfig,
    pub store: Arc<dyn SnapshotStore>,
    pub upstream: Arc<dyn UpstreamClient>,
    pub stats: MetricsAggregator,
}

impl AppContext {
    /// Assemble a context from already-built parts
    pub fn new(
        config: IndexerConfig,
        upstream: Arc<dyn UpstreamClient>,
        store: Arc<dyn SnapshotStore>,
    ) -> Self {
        let stats = MetricsAggregator::new(upstream.clone(), CacheRegistry::new(&config.cache));
        Self {
            config,
            store,
            upstream,
            stats,
        }
    }

    /// Validate the configuration, then open the store and the upstream client
    pub fn from_config(config: IndexerConfig) -> Result<Self> {
        validate_config_result(&config)?;

        let store: Arc<dyn SnapshotStore> = Arc::new(SqliteSnapshotStore::new(&config.storage)?);
        let upstream: Arc<dyn UpstreamClient> =
            Arc::new(JsonRpcUpstreamClient::new(&config.upstream)?);

        tracing::info!(
            partitions = ?config.partitions,
            endpoint = %config.upstream.endpoint,
            database = %config.storage.path.display(),
            "Application context ready"
        );

        Ok(Self::new(config, upstream, store))
    }

    /// Scheduler writing into this context's store
    pub fn scheduler(&self) -> SyncScheduler {
        SyncScheduler::new(
            SyncConfig::from_indexer(&self.config),
            self.upstream.clone(),
            self.store.clone(),
        )
    }
}
