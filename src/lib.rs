//! metagraph-indexer - Periodic metagraph snapshots behind a cached read API
//!
//! A background task pulls the metagraph of each configured partition from an
//! upstream node and stores the latest snapshot per partition. A small HTTP API
//! serves those snapshots together with network-wide statistics computed from
//! short-lived cached upstream reads.
//!
//! # Architecture
//!
//! - **upstream**: Network client contract and its JSON-RPC implementation
//! - **metagraph**: Snapshot payload built from an upstream metagraph
//! - **storage**: Latest-snapshot-per-partition persistence (SQLite)
//! - **sync**: Background scheduler writing snapshots
//! - **cache**: TTL caches with single-flight computation
//! - **stats**: Derived statistics and yield projection
//! - **api**: Read API and its HTTP routes
//! - **config**: YAML configuration and validation

// Core modules
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub mod api;
pub mod app;
pub mod cache;
pub mod metagraph;
pub mod stats;
pub mod storage;
pub mod sync;
pub mod upstream;

// Re-exports
pub use error::{IndexerError, Result};
