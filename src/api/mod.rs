//! Read-only query surface
//!
//! [`ReadApi`] answers snapshot and statistics queries. It never writes:
//! snapshots come from the store as the sync task left them, statistics come
//! through the aggregator's caches. [`ApiServer`] exposes it over HTTP.

mod server;

pub use server::{ApiError, ApiServer};

use crate::app::AppContext;
use crate::stats::CurrentStats;
use crate::storage::StoredSnapshot;
use crate::upstream::DelegateInfo;
use crate::{IndexerError, Result};
use std::sync::Arc;

/// Cheaply cloneable handle over the shared [`AppContext`]
#[derive(Clone)]
pub struct ReadApi {
    ctx: Arc<AppContext>,
}

impl ReadApi {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Partition keys that may be queried
    pub fn partitions(&self) -> &[u16] {
        &self.ctx.config.partitions
    }

    /// Latest stored snapshot of an allowed partition
    ///
    /// Keys outside the allowed set are rejected without reading the store.
    pub fn get_snapshot(&self, netuid: u16) -> Result<StoredSnapshot> {
        if !self.ctx.config.is_allowed(netuid) {
            tracing::debug!(netuid, "Rejected snapshot request for disallowed netuid");
            return Err(IndexerError::PartitionNotAllowed(netuid.into()));
        }
        self.ctx.store.get_latest(netuid)
    }

    pub async fn current_stats(&self) -> Result<CurrentStats> {
        self.ctx.stats.current_stats().await
    }

    pub async fn transfer_fee(&self) -> Result<u64> {
        self.ctx.stats.transfer_fee().await
    }

    pub async fn total_stake(&self) -> Result<u64> {
        self.ctx.stats.total_stake().await
    }

    pub async fn total_issuance(&self) -> Result<u64> {
        self.ctx.stats.total_issuance().await
    }

    pub async fn total_stake_percentage(&self) -> Result<f64> {
        self.ctx.stats.total_stake_percentage().await
    }

    pub async fn total_delegated_stake(&self) -> Result<u64> {
        self.ctx.stats.total_delegated_stake().await
    }

    pub async fn delegates(&self) -> Result<Arc<Vec<DelegateInfo>>> {
        self.ctx.stats.delegates().await
    }

    pub async fn average_validator_apr(&self) -> Result<f64> {
        self.ctx.stats.average_validator_apr().await
    }
}
