//! Error types for the metagraph indexer
//!
//! One enum covers the sync domain (upstream and persistence failures) and the
//! request domain (missing snapshots, degenerate projections). Uses thiserror.

use crate::upstream::retry::{RetryDecision, RetryableError};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for indexer operations
pub type Result<T> = std::result::Result<T, IndexerError>;

/// Error type for indexer operations
#[derive(Error, Debug)]
pub enum IndexerError {
    /// Configuration errors (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network/RPC failure talking to the upstream node
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Upstream answered, but with an error object or an unusable payload
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// No snapshot stored yet for the requested partition
    #[error("Not found: {0}")]
    NotFound(String),

    /// Partition key is outside the configured allowed set
    #[error("netuid {0} not allowed")]
    PartitionNotAllowed(i64),

    /// Degenerate input to the yield projection or a ratio with a zero denominator
    #[error("Invalid projection input: {0}")]
    InvalidProjectionInput(String),

    /// Upstream rowset violates the snapshot invariants
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Persistence failure while writing a snapshot
    #[error("Store write failure: {0}")]
    StoreWriteFailure(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),

    /// Anyhow errors (for more context)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

impl IndexerError {
    /// Whether this failure came from the upstream node rather than from us
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            IndexerError::UpstreamUnavailable(_) | IndexerError::Upstream(_) | IndexerError::Http(_)
        )
    }
}

impl RetryableError for IndexerError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            IndexerError::UpstreamUnavailable(_) => RetryDecision::Retry,
            IndexerError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    RetryDecision::Retry
                } else if let Some(status) = e.status() {
                    match status.as_u16() {
                        429 => RetryDecision::RetryAfter(Duration::from_secs(5)),
                        500..=599 => RetryDecision::Retry,
                        _ => RetryDecision::NoRetry,
                    }
                } else {
                    RetryDecision::Retry
                }
            }
            IndexerError::Config(_)
            | IndexerError::Upstream(_)
            | IndexerError::NotFound(_)
            | IndexerError::PartitionNotAllowed(_)
            | IndexerError::InvalidProjectionInput(_)
            | IndexerError::InvalidSnapshot(_)
            | IndexerError::StoreWriteFailure(_)
            | IndexerError::Io(_)
            | IndexerError::Json(_)
            | IndexerError::Yaml(_)
            | IndexerError::Database(_)
            | IndexerError::Other(_)
            | IndexerError::Anyhow(_) => RetryDecision::NoRetry,
        }
    }
}
