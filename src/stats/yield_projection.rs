//! Compound yield projection

use crate::{IndexerError, Result};

/// Reward units minted to stakers per simulated day
pub const REWARD_PER_DAY: f64 = 3600.0;

/// Result of a yield simulation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Percentage growth over the simulated period
    pub apr: f64,
    pub final_stake: f64,
}

/// Simulate `days` of daily compounding and return the resulting APR
///
/// Each day the stake earns its share of [`REWARD_PER_DAY`] relative to
/// `issuance * staked_percentage`, then issuance grows by `daily_inflation`.
/// `staked_percentage` is used as a plain multiplier.
///
/// Fails with [`IndexerError::InvalidProjectionInput`] when a step would divide
/// by zero or the simulation stops being finite.
pub fn calculate_apr(
    starting_stake: f64,
    starting_issuance: f64,
    daily_inflation: u64,
    staked_percentage: f64,
    days: u32,
) -> Result<Projection> {
    if !starting_stake.is_finite() || starting_stake <= 0.0 {
        return Err(IndexerError::InvalidProjectionInput(format!(
            "starting stake must be positive, got {}",
            starting_stake
        )));
    }
    if !starting_issuance.is_finite() || starting_issuance < 0.0 {
        return Err(IndexerError::InvalidProjectionInput(format!(
            "starting issuance must be non-negative, got {}",
            starting_issuance
        )));
    }
    if !staked_percentage.is_finite() || staked_percentage < 0.0 {
        return Err(IndexerError::InvalidProjectionInput(format!(
            "staked percentage must be non-negative, got {}",
            staked_percentage
        )));
    }

    let mut stake = starting_stake;
    let mut issuance = starting_issuance;

    for day in 0..days {
        let total_staked = issuance * staked_percentage;
        if total_staked <= 0.0 || !total_staked.is_finite() {
            return Err(IndexerError::InvalidProjectionInput(format!(
                "total staked is {} on day {} (issuance {}, staked percentage {})",
                total_staked, day, issuance, staked_percentage
            )));
        }

        stake += REWARD_PER_DAY * stake / total_staked;
        issuance += daily_inflation as f64;
    }

    if !stake.is_finite() {
        return Err(IndexerError::InvalidProjectionInput(format!(
            "stake overflowed after {} days",
            days
        )));
    }

    Ok(Projection {
        apr: (stake - starting_stake) / starting_stake * 100.0,
        final_stake: stake,
    })
}
