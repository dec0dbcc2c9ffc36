//! Snapshot persistence
//!
//! The store keeps the latest snapshot per partition. Each write carries a
//! version; the store only ever moves a partition's version forward, so
//! `get_latest` always returns the highest-version payload written.

mod sqlite;

use crate::Result;
use chrono::{DateTime, Utc};

pub use sqlite::SqliteSnapshotStore;

/// A persisted snapshot as read back from the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSnapshot {
    pub netuid: u16,
    /// Serialized payload, byte-for-byte as written
    pub payload: String,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

/// Keyed store with "upsert latest by partition" semantics
pub trait SnapshotStore: Send + Sync {
    /// Atomically replace the partition's snapshot. Returns the version stored,
    /// which is bumped past the previous one if `version` would not advance it.
    fn upsert_latest(&self, netuid: u16, payload: &str, version: i64) -> Result<i64>;

    /// Latest snapshot of a partition, `NotFound` if none was written yet
    fn get_latest(&self, netuid: u16) -> Result<StoredSnapshot>;

    /// Partitions that have a stored snapshot
    fn partitions(&self) -> Result<Vec<u16>>;
}
