//! Network-wide statistics over cached upstream reads

use super::yield_projection::calculate_apr;
use crate::cache::CacheRegistry;
use crate::upstream::{Balance, DelegateInfo, UpstreamClient};
use crate::{IndexerError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Reference stake for the APR projection; it cancels out of the ratio
pub const APR_REFERENCE_STAKE: f64 = 10_000.0;

/// Issuance added per simulated day, in tao
pub const DAILY_INFLATION: u64 = 7200;

pub const PROJECTION_DAYS: u32 = 365;

/// Snapshot of every derived statistic, as served by `/current-stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentStats {
    pub transfer_fee: u64,
    pub total_stake: u64,
    pub total_issuance: u64,
    pub total_stake_percentage: f64,
    pub total_delegated_stake: u64,
    #[serde(rename = "averageValidatorAPR")]
    pub average_validator_apr: f64,
}

/// Derived statistics, each primitive read going through its own cache
pub struct MetricsAggregator {
    upstream: Arc<dyn UpstreamClient>,
    caches: CacheRegistry,
}

impl MetricsAggregator {
    pub fn new(upstream: Arc<dyn UpstreamClient>, caches: CacheRegistry) -> Self {
        Self { upstream, caches }
    }

    pub fn caches(&self) -> &CacheRegistry {
        &self.caches
    }

    pub async fn transfer_fee(&self) -> Result<u64> {
        self.caches
            .transfer_fee
            .get_or_compute((), || self.upstream.transfer_fee())
            .await
    }

    pub async fn total_stake(&self) -> Result<u64> {
        self.caches
            .total_stake
            .get_or_compute((), || self.upstream.total_stake())
            .await
    }

    pub async fn total_issuance(&self) -> Result<u64> {
        self.caches
            .total_issuance
            .get_or_compute((), || self.upstream.total_issuance())
            .await
    }

    /// Registered delegates, largest total stake first
    pub async fn delegates(&self) -> Result<Arc<Vec<DelegateInfo>>> {
        self.caches
            .delegates
            .get_or_compute((), || async {
                let mut delegates = self.upstream.delegates().await?;
                delegates.sort_by(|a, b| b.total_stake.cmp(&a.total_stake));
                Ok::<_, IndexerError>(Arc::new(delegates))
            })
            .await
    }

    /// Share of issuance currently staked, as a percentage
    pub async fn total_stake_percentage(&self) -> Result<f64> {
        let (stake, issuance) = tokio::try_join!(self.total_stake(), self.total_issuance())?;

        if issuance == 0 {
            return Err(IndexerError::InvalidProjectionInput(
                "total issuance is zero".to_string(),
            ));
        }

        Ok(stake as f64 / issuance as f64 * 100.0)
    }

    /// Sum of every delegate's total stake, in rao
    ///
    /// Also logs how much of that total the delegate owners stake on
    /// themselves. That figure is diagnostic only.
    pub async fn total_delegated_stake(&self) -> Result<u64> {
        self.caches
            .total_delegated_stake
            .get_or_compute((), || async {
                let delegates = self.delegates().await?;

                let mut total_delegated = Balance::ZERO;
                let mut total_owner = Balance::ZERO;
                for delegate in delegates.iter() {
                    total_delegated = total_delegated.saturating_add(Balance::from_rao(delegate.total_stake));
                    total_owner = total_owner.saturating_add(Balance::from_rao(delegate.owner_stake()));
                }

                tracing::debug!(
                    delegates = delegates.len(),
                    total_owner_stake = %total_owner,
                    total_delegated_stake = %total_delegated,
                    nominated_stake = %Balance::from_rao(total_delegated.rao().saturating_sub(total_owner.rao())),
                    "Computed total delegated stake"
                );

                Ok::<_, IndexerError>(total_delegated.rao())
            })
            .await
    }

    /// Projected yearly return of a validator, scaled by a further 100
    ///
    /// The projection already returns a percentage; the extra factor keeps the
    /// value the dashboard has always displayed.
    pub async fn average_validator_apr(&self) -> Result<f64> {
        let issuance = Balance::from_rao(self.total_issuance().await?).tao();
        let staked_percentage = self.total_stake_percentage().await?;

        let projection = calculate_apr(
            APR_REFERENCE_STAKE,
            issuance,
            DAILY_INFLATION,
            staked_percentage,
            PROJECTION_DAYS,
        )?;

        tracing::debug!(
            apr = projection.apr,
            final_stake = projection.final_stake,
            "Projected validator APR"
        );

        Ok(projection.apr * 100.0)
    }

    /// Every statistic at once
    pub async fn current_stats(&self) -> Result<CurrentStats> {
        let (transfer_fee, total_stake, total_issuance, total_delegated_stake) = tokio::try_join!(
            self.transfer_fee(),
            self.total_stake(),
            self.total_issuance(),
            self.total_delegated_stake(),
        )?;

        Ok(CurrentStats {
            transfer_fee,
            total_stake,
            total_issuance,
            total_stake_percentage: self.total_stake_percentage().await?,
            total_delegated_stake,
            average_validator_apr: self.average_validator_apr().await?,
        })
    }
}
