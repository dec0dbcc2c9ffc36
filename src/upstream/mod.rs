//! Upstream network client
//!
//! The indexer only reads from the network. [`UpstreamClient`] is the contract
//! the sync loop and the stats aggregator depend on; [`JsonRpcUpstreamClient`]
//! implements it over HTTP JSON-RPC. Every call may fail transiently.

#[cfg(test)]
pub(crate) mod fake;
mod jsonrpc;
pub mod retry;
mod types;

use crate::Result;
use async_trait::async_trait;

pub use jsonrpc::JsonRpcUpstreamClient;
pub use types::{AxonInfo, Balance, DelegateInfo, NeuronInfo, UpstreamSnapshot, RAO_PER_TAO};

/// Read-only operations against the network
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Full metagraph of one partition
    async fn fetch_snapshot(&self, netuid: u16) -> Result<UpstreamSnapshot>;

    /// Estimated fee of a small transfer, in rao
    async fn transfer_fee(&self) -> Result<u64>;

    /// Total stake across the network, in rao
    async fn total_stake(&self) -> Result<u64>;

    /// Total issuance, in rao
    async fn total_issuance(&self) -> Result<u64>;

    async fn delegates(&self) -> Result<Vec<DelegateInfo>>;
}
