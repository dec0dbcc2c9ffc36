//! Derived network statistics
//!
//! - [`MetricsAggregator`] composes cached upstream reads into stake and
//!   delegation totals
//! - [`calculate_apr`] projects validator yield from issuance and stake share

mod aggregator;
mod yield_projection;

pub use aggregator::{
    CurrentStats, MetricsAggregator, APR_REFERENCE_STAKE, DAILY_INFLATION, PROJECTION_DAYS,
};
pub use yield_projection::{calculate_apr, Projection, REWARD_PER_DAY};
