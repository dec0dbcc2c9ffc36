//! Wire types returned by the upstream node

use serde::{Deserialize, Serialize};
use std::fmt;

/// Base units (rao) per display unit (tao)
pub const RAO_PER_TAO: u64 = 1_000_000_000;

/// Token amount held in base units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(u64);

impl Balance {
    pub const ZERO: Balance = Balance(0);

    pub fn from_rao(rao: u64) -> Self {
        Self(rao)
    }

    pub fn rao(self) -> u64 {
        self.0
    }

    /// Amount in display units
    pub fn tao(self) -> f64 {
        self.0 as f64 / RAO_PER_TAO as f64
    }

    pub fn saturating_add(self, other: Balance) -> Balance {
        Balance(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "τ{:.9}", self.tao())
    }
}

/// Network endpoint a neuron advertises
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxonInfo {
    pub ip: String,
    pub port: u16,
    pub hotkey: String,
    pub coldkey: String,
    pub is_serving: bool,
}

impl AxonInfo {
    /// `ip:port` when the neuron is serving
    pub fn address(&self) -> Option<String> {
        self.is_serving.then(|| format!("{}:{}", self.ip, self.port))
    }
}

/// One neuron as reported in a metagraph snapshot. Stake and emission are in
/// tao; the remaining metrics are normalized floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronInfo {
    pub uid: u32,
    pub total_stake: f64,
    pub rank: f64,
    pub trust: f64,
    pub consensus: f64,
    pub incentive: f64,
    pub dividends: f64,
    pub emission: f64,
    pub validator_trust: f64,
    pub validator_permit: bool,
    /// Block of the neuron's last weight update
    pub last_update: u64,
    pub active: bool,
    pub axon: AxonInfo,
}

/// Full metagraph of one partition at a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamSnapshot {
    pub netuid: u16,
    pub block: u64,
    pub difficulty: u64,
    pub subnet_emission: Balance,
    pub total_issuance: Balance,
    pub neurons: Vec<NeuronInfo>,
}

/// A delegate and its nominators, stakes in rao
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegateInfo {
    pub hotkey: String,
    pub owner: String,
    pub total_stake: u64,
    /// `(address, stake)` pairs
    pub nominators: Vec<(String, u64)>,
}

impl DelegateInfo {
    /// Stake the owner holds as a nominator of its own delegate, zero if absent
    pub fn owner_stake(&self) -> u64 {
        self.nominators
            .iter()
            .find(|(address, _)| *address == self.owner)
            .map(|(_, stake)| *stake)
            .unwrap_or(0)
    }
}
