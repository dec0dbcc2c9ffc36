//! Configuration system
//!
//! Loads ~/.config/metagraph-indexer/config.yaml with support for:
//! - The allowed partition set (netuids) synced and served
//! - Sync interval and error backoff
//! - Per-operation cache TTL and capacity
//! - Upstream endpoint, storage location and HTTP server settings

mod indexer_config;
pub mod validation;

pub use indexer_config::{
    CacheOverride, CacheSettings, IndexerConfig, ServerSettings, StorageSettings, SyncSettings,
    TransferFeeProbe, UpstreamSettings,
};
pub use validation::{validate_config, validate_config_result, ValidationError};
