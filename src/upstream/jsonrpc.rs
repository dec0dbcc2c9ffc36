//! JSON-RPC 2.0 over HTTP implementation of [`UpstreamClient`]

use super::retry::{with_retry, RetryConfig};
use super::{DelegateInfo, UpstreamClient, UpstreamSnapshot};
use crate::config::{TransferFeeProbe, UpstreamSettings};
use crate::{metrics, IndexerError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// HTTP JSON-RPC client for the upstream node
#[derive(Debug)]
pub struct JsonRpcUpstreamClient {
    endpoint: String,
    client: reqwest::Client,
    retry: RetryConfig,
    fee_probe: TransferFeeProbe,
    next_id: AtomicU64,
}

impl JsonRpcUpstreamClient {
    /// Build a client for the configured endpoint
    ///
    /// # Errors
    /// Fails with `Config` if the endpoint is not an http(s) URL or the HTTP
    /// client cannot be constructed.
    pub fn new(settings: &UpstreamSettings) -> Result<Self> {
        let endpoint = settings.endpoint.trim_end_matches('/').to_string();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(IndexerError::Config(format!(
                "Upstream endpoint must be http(s): {}",
                settings.endpoint
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| IndexerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            client,
            retry: RetryConfig::with_max_retries(settings.max_retries),
            fee_probe: settings.transfer_fee_probe.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let start = Instant::now();
        let result = with_retry(&self.retry, method, || self.call_once(method, &params)).await;
        metrics::record_upstream_call(method, start.elapsed().as_secs_f64());
        result
    }

    async fn call_once<T: DeserializeOwned>(&self, method: &str, params: &Value) -> Result<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    IndexerError::UpstreamUnavailable(format!("{}: {}", method, e))
                } else {
                    IndexerError::Http(e)
                }
            })?
            .error_for_status()?;

        let body: RpcResponse<T> = response.json().await?;
        match (body.result, body.error) {
            (_, Some(err)) => Err(IndexerError::Upstream(format!(
                "{} failed ({}): {}",
                method, err.code, err.message
            ))),
            (Some(result), None) => Ok(result),
            (None, None) => Err(IndexerError::Upstream(format!(
                "{} returned neither result nor error",
                method
            ))),
        }
    }
}

#[async_trait]
impl UpstreamClient for JsonRpcUpstreamClient {
    async fn fetch_snapshot(&self, netuid: u16) -> Result<UpstreamSnapshot> {
        self.call("metagraph_getSnapshot", json!([netuid])).await
    }

    async fn transfer_fee(&self) -> Result<u64> {
        let params = json!({
            "dest": self.fee_probe.dest,
            "value": self.fee_probe.value_rao,
        });
        self.call("balances_transferFee", params).await
    }

    async fn total_stake(&self) -> Result<u64> {
        self.call("subtensor_totalStake", json!([])).await
    }

    async fn total_issuance(&self) -> Result<u64> {
        self.call("balances_totalIssuance", json!([])).await
    }

    async fn delegates(&self) -> Result<Vec<DelegateInfo>> {
        self.call("delegateInfo_getDelegates", json!([])).await
    }
}
