//! Enumerated registry of the cached upstream operations

use super::ttl::{CachePolicy, TtlCache};
use crate::config::CacheSettings;
use crate::upstream::DelegateInfo;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Every upstream read that goes through a cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachedOperation {
    TransferFee,
    TotalStake,
    TotalIssuance,
    TotalDelegatedStake,
    Delegates,
}

impl CachedOperation {
    pub const ALL: [CachedOperation; 5] = [
        CachedOperation::TransferFee,
        CachedOperation::TotalStake,
        CachedOperation::TotalIssuance,
        CachedOperation::TotalDelegatedStake,
        CachedOperation::Delegates,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CachedOperation::TransferFee => "transfer_fee",
            CachedOperation::TotalStake => "total_stake",
            CachedOperation::TotalIssuance => "total_issuance",
            CachedOperation::TotalDelegatedStake => "total_delegated_stake",
            CachedOperation::Delegates => "delegates",
        }
    }
}

/// One independent cache per operation, built once at startup
///
/// The operations take no parameters, so each cache is keyed by `()`.
pub struct CacheRegistry {
    pub transfer_fee: TtlCache<(), u64>,
    pub total_stake: TtlCache<(), u64>,
    pub total_issuance: TtlCache<(), u64>,
    pub total_delegated_stake: TtlCache<(), u64>,
    pub delegates: TtlCache<(), Arc<Vec<DelegateInfo>>>,
}

impl CacheRegistry {
    /// Build the registry from configured settings
    pub fn new(settings: &CacheSettings) -> Self {
        Self::from_policies(|operation| settings.policy_for(operation))
    }

    /// Build the registry, asking `policy` for each operation's limits
    pub fn from_policies(policy: impl Fn(CachedOperation) -> CachePolicy) -> Self {
        use CachedOperation::*;

        Self {
            transfer_fee: TtlCache::new(TransferFee.as_str(), policy(TransferFee)),
            total_stake: TtlCache::new(TotalStake.as_str(), policy(TotalStake)),
            total_issuance: TtlCache::new(TotalIssuance.as_str(), policy(TotalIssuance)),
            total_delegated_stake: TtlCache::new(
                TotalDelegatedStake.as_str(),
                policy(TotalDelegatedStake),
            ),
            delegates: TtlCache::new(Delegates.as_str(), policy(Delegates)),
        }
    }

    /// Effective policy of one operation
    pub fn policy(&self, operation: CachedOperation) -> CachePolicy {
        match operation {
            CachedOperation::TransferFee => self.transfer_fee.policy(),
            CachedOperation::TotalStake => self.total_stake.policy(),
            CachedOperation::TotalIssuance => self.total_issuance.policy(),
            CachedOperation::TotalDelegatedStake => self.total_delegated_stake.policy(),
            CachedOperation::Delegates => self.delegates.policy(),
        }
    }

}
