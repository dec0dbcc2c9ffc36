//! In-memory upstream used by unit tests

use super::{DelegateInfo, UpstreamClient, UpstreamSnapshot};
use crate::{IndexerError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
pub(crate) struct FakeUpstream {
    snapshots: Mutex<HashMap<u16, UpstreamSnapshot>>,
    failing: Mutex<HashSet<u16>>,
    totals: Mutex<(u64, u64, u64)>,
    delegates: Mutex<Vec<DelegateInfo>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_totals(self, transfer_fee: u64, total_stake: u64, total_issuance: u64) -> Self {
        *self.totals.lock().unwrap() = (transfer_fee, total_stake, total_issuance);
        self
    }

    pub fn with_delegates(self, delegates: Vec<DelegateInfo>) -> Self {
        *self.delegates.lock().unwrap() = delegates;
        self
    }

    pub fn set_snapshot(&self, snapshot: UpstreamSnapshot) {
        self.snapshots.lock().unwrap().insert(snapshot.netuid, snapshot);
    }

    pub fn set_failing(&self, netuid: u16, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(netuid);
        } else {
            set.remove(&netuid);
        }
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    fn record(&self, method: &'static str) {
        *self.calls.lock().unwrap().entry(method).or_insert(0) += 1;
    }
}

#[async_trait]
impl UpstreamClient for FakeUpstream {
    async fn fetch_snapshot(&self, netuid: u16) -> Result<UpstreamSnapshot> {
        self.record("fetch_snapshot");
        if self.failing.lock().unwrap().contains(&netuid) {
            return Err(IndexerError::UpstreamUnavailable(format!("netuid {} unreachable", netuid)));
        }
        self.snapshots
            .lock()
            .unwrap()
            .get(&netuid)
            .cloned()
            .ok_or_else(|| IndexerError::Upstream(format!("netuid {} does not exist", netuid)))
    }

    async fn transfer_fee(&self) -> Result<u64> {
        self.record("transfer_fee");
        Ok(self.totals.lock().unwrap().0)
    }

    async fn total_stake(&self) -> Result<u64> {
        self.record("total_stake");
        Ok(self.totals.lock().unwrap().1)
    }

    async fn total_issuance(&self) -> Result<u64> {
        self.record("total_issuance");
        Ok(self.totals.lock().unwrap().2)
    }

    async fn delegates(&self) -> Result<Vec<DelegateInfo>> {
        self.record("delegates");
        Ok(self.delegates.lock().unwrap().clone())
    }
}
