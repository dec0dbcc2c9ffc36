//! Prometheus metrics
//!
//! Observability for the sync loop, the TTL caches and upstream calls.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram_vec, CounterVec,
    Encoder, Gauge, GaugeVec, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Histogram: fetch-transform-persist duration per partition (seconds)
    pub static ref SYNC_DURATION: HistogramVec = register_histogram_vec!(
        "metagraph_sync_duration_seconds",
        "Duration of one partition sync",
        &["netuid"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("Failed to create sync_duration metric");

    /// Counter: sync passes by outcome
    pub static ref SYNC_PASSES: CounterVec = register_counter_vec!(
        "metagraph_sync_passes_total",
        "Total sync passes by status",
        &["status"]
    )
    .expect("Failed to create sync_passes metric");

    /// Counter: partition failures by kind
    pub static ref PARTITION_ERRORS: CounterVec = register_counter_vec!(
        "metagraph_sync_partition_errors_total",
        "Partition sync failures by error kind",
        &["netuid", "kind"]
    )
    .expect("Failed to create partition_errors metric");

    /// Gauge: neurons in the latest stored snapshot
    pub static ref NEURONS: GaugeVec = register_gauge_vec!(
        "metagraph_neurons",
        "Neurons in the latest snapshot per partition",
        &["netuid"]
    )
    .expect("Failed to create neurons metric");

    /// Counter: cache lookups by cached operation and result
    pub static ref CACHE_OPERATIONS: CounterVec = register_counter_vec!(
        "metagraph_cache_operations_total",
        "Cache lookups by operation and result",
        &["operation", "result"]
    )
    .expect("Failed to create cache_operations metric");

    /// Histogram: upstream call latency (seconds)
    pub static ref UPSTREAM_CALL_DURATION: HistogramVec = register_histogram_vec!(
        "metagraph_upstream_call_duration_seconds",
        "Upstream RPC call latency",
        &["call"],
        vec![0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to create upstream_call_duration metric");

    /// Gauge: scheduler state (1 = syncing, 0 = idle)
    pub static ref SCHEDULER_STATE: Gauge = register_gauge!(
        "metagraph_scheduler_state",
        "Sync scheduler state (1 = syncing, 0 = idle)"
    )
    .expect("Failed to create scheduler_state metric");
}

pub fn record_sync_duration(netuid: u16, duration_secs: f64) {
    SYNC_DURATION
        .with_label_values(&[&netuid.to_string()])
        .observe(duration_secs);
}

pub fn record_sync_pass(status: &str) {
    SYNC_PASSES.with_label_values(&[status]).inc();
}

pub fn record_partition_error(netuid: u16, kind: &str) {
    PARTITION_ERRORS
        .with_label_values(&[&netuid.to_string(), kind])
        .inc();
}

pub fn set_neurons(netuid: u16, count: usize) {
    NEURONS
        .with_label_values(&[&netuid.to_string()])
        .set(count as f64);
}

pub fn record_cache_hit(operation: &str) {
    CACHE_OPERATIONS.with_label_values(&[operation, "hit"]).inc();
}

pub fn record_cache_miss(operation: &str) {
    CACHE_OPERATIONS.with_label_values(&[operation, "miss"]).inc();
}

pub fn record_upstream_call(call: &str, duration_secs: f64) {
    UPSTREAM_CALL_DURATION
        .with_label_values(&[call])
        .observe(duration_secs);
}

pub fn set_syncing(syncing: bool) {
    SCHEDULER_STATE.set(if syncing { 1.0 } else { 0.0 });
}

/// Encode all metrics as Prometheus text format
pub fn encode_metrics() -> crate::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| crate::IndexerError::Other(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::IndexerError::Other(format!("Metrics are not UTF-8: {}", e)))
}
