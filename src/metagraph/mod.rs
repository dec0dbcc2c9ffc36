//! Metagraph snapshot model
//!
//! Turns an [`UpstreamSnapshot`] into the persisted [`SnapshotPayload`]: one
//! [`NodeRecord`] per neuron plus partition-wide totals. The JSON layout is what
//! the dashboard consumes, so field names follow its conventions.

use crate::upstream::UpstreamSnapshot;
use crate::{IndexerError, Result};
use serde::{Deserialize, Serialize};

/// Serialize booleans as 0/1, the way the dashboard expects them
mod bool_as_int {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(u8::deserialize(deserializer)? != 0)
    }
}

/// One neuron inside a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub uid: u32,
    pub stake: f64,
    pub rank: f64,
    pub trust: f64,
    pub consensus: f64,
    pub incentive: f64,
    pub dividends: f64,
    pub emission: f64,
    #[serde(rename = "vtrust")]
    pub validator_trust: f64,
    #[serde(rename = "isValidator", with = "bool_as_int")]
    pub is_validator: bool,
    /// Blocks since the neuron last updated its weights
    #[serde(rename = "updated")]
    pub blocks_since_update: u64,
    #[serde(with = "bool_as_int")]
    pub active: bool,
    /// `ip:port`, present iff the neuron is serving
    pub axon: Option<String>,
    pub hotkey: String,
    pub coldkey: String,
}

/// Persisted state of one partition at sync time
///
/// Aggregates are pre-formatted strings so the stored payload can be served
/// verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPayload {
    pub difficulty: String,
    pub subnet_emission: String,
    pub total_issuance: String,
    pub total_neurons: String,
    pub total_stake: String,
    pub total_rank: String,
    pub total_validator_trust: String,
    pub total_trust: String,
    pub total_consensus: String,
    pub total_incentive: String,
    pub total_dividends: String,
    pub total_emission: String,
    pub table_data: Vec<NodeRecord>,
}

#[derive(Default)]
struct Totals {
    stake: f64,
    rank: f64,
    validator_trust: f64,
    trust: f64,
    consensus: f64,
    incentive: f64,
    dividends: f64,
    emission: f64,
}

impl SnapshotPayload {
    /// Build the payload, enforcing that uids are exactly `0..n`
    pub fn from_upstream(snapshot: &UpstreamSnapshot) -> Result<Self> {
        let mut neurons: Vec<_> = snapshot.neurons.iter().collect();
        neurons.sort_by_key(|n| n.uid);

        for (expected, neuron) in neurons.iter().enumerate() {
            if neuron.uid as usize != expected {
                return Err(IndexerError::InvalidSnapshot(format!(
                    "netuid {}: expected uid {} but found {} (uids must be dense and unique)",
                    snapshot.netuid, expected, neuron.uid
                )));
            }
        }

        let mut totals = Totals::default();
        let mut table_data = Vec::with_capacity(neurons.len());

        for neuron in neurons {
            totals.stake += neuron.total_stake;
            totals.rank += neuron.rank;
            totals.validator_trust += neuron.validator_trust;
            totals.trust += neuron.trust;
            totals.consensus += neuron.consensus;
            totals.incentive += neuron.incentive;
            totals.dividends += neuron.dividends;
            totals.emission += neuron.emission;

            table_data.push(NodeRecord {
                uid: neuron.uid,
                stake: neuron.total_stake,
                rank: neuron.rank,
                trust: neuron.trust,
                consensus: neuron.consensus,
                incentive: neuron.incentive,
                dividends: neuron.dividends,
                emission: neuron.emission,
                validator_trust: neuron.validator_trust,
                is_validator: neuron.validator_permit,
                blocks_since_update: snapshot.block.saturating_sub(neuron.last_update),
                active: neuron.active,
                axon: neuron.axon.address(),
                hotkey: neuron.axon.hotkey.clone(),
                coldkey: neuron.axon.coldkey.clone(),
            });
        }

        Ok(Self {
            difficulty: snapshot.difficulty.to_string(),
            subnet_emission: snapshot.subnet_emission.to_string(),
            total_issuance: snapshot.total_issuance.to_string(),
            total_neurons: table_data.len().to_string(),
            total_stake: format!("{:.5}", totals.stake),
            total_rank: format!("{:.5}", totals.rank),
            total_validator_trust: format!("{:.5}", totals.validator_trust),
            total_trust: format!("{:.5}", totals.trust),
            total_consensus: format!("{:.5}", totals.consensus),
            total_incentive: format!("{:.5}", totals.incentive),
            total_dividends: format!("{:.5}", totals.dividends),
            // Whole sums keep their trailing ".0".
            total_emission: format!("{:?}", totals.emission),
            table_data,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
