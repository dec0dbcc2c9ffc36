//! Integration tests for metagraph-indexer
//!
//! These tests drive the full path from a YAML config through the JSON-RPC
//! client, the sync scheduler and the SQLite store to the HTTP routes, against
//! an in-process mock node.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::{routing::post, Json, Router};
use metagraph_indexer::api::{ApiServer, ReadApi};
use metagraph_indexer::app::AppContext;
use metagraph_indexer::config::IndexerConfig;
use metagraph_indexer::metagraph::SnapshotPayload;
use metagraph_indexer::storage::SnapshotStore;
use metagraph_indexer::upstream::{AxonInfo, Balance, DelegateInfo, NeuronInfo, UpstreamSnapshot};
use metagraph_indexer::IndexerError;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tower::ServiceExt;

const TOTAL_STAKE: u64 = 1_000_000_000_000_000;
const TOTAL_ISSUANCE: u64 = 4_000_000_000_000_000;

/// Metagraphs served by the mock node, keyed by netuid
type Metagraphs = Arc<Mutex<HashMap<u16, UpstreamSnapshot>>>;

fn neuron(uid: u32) -> NeuronInfo {
    NeuronInfo {
        uid,
        total_stake: 1000.0 + uid as f64,
        rank: 0.1,
        trust: 0.2,
        consensus: 0.3,
        incentive: 0.4,
        dividends: 0.5,
        emission: 2.0,
        validator_trust: 0.9,
        validator_permit: uid < 2,
        last_update: 4_950,
        active: true,
        axon: AxonInfo {
            ip: "192.168.1.10".to_string(),
            port: 30_000 + uid as u16,
            hotkey: format!("5Hotkey{}", uid),
            coldkey: format!("5Coldkey{}", uid),
            is_serving: true,
        },
    }
}

fn metagraph(netuid: u16, neurons: u32) -> UpstreamSnapshot {
    UpstreamSnapshot {
        netuid,
        block: 5_000,
        difficulty: 1_000_000,
        subnet_emission: Balance::from_rao(500_000_000),
        total_issuance: Balance::from_rao(TOTAL_ISSUANCE),
        neurons: (0..neurons).map(neuron).collect(),
    }
}

async fn rpc_handler(State(metagraphs): State<Metagraphs>, Json(req): Json<Value>) -> Json<Value> {
    let id = req["id"].clone();
    let result = match req["method"].as_str() {
        Some("metagraph_getSnapshot") => {
            let netuid = req["params"][0].as_u64().unwrap_or(0) as u16;
            metagraphs
                .lock()
                .unwrap()
                .get(&netuid)
                .map(|snapshot| serde_json::to_value(snapshot).unwrap())
        }
        Some("subtensor_totalStake") => Some(json!(TOTAL_STAKE)),
        Some("balances_totalIssuance") => Some(json!(TOTAL_ISSUANCE)),
        Some("balances_transferFee") => Some(json!(125_000)),
        Some("delegateInfo_getDelegates") => Some(json!([
            DelegateInfo {
                hotkey: "5DelegateA".to_string(),
                owner: "5OwnerA".to_string(),
                total_stake: 700,
                nominators: vec![("5OwnerA".to_string(), 100), ("5Other".to_string(), 600)],
            },
            DelegateInfo {
                hotkey: "5DelegateB".to_string(),
                owner: "5OwnerB".to_string(),
                total_stake: 900,
                nominators: vec![("5Other".to_string(), 900)],
            },
        ])),
        _ => None,
    };

    Json(match result {
        Some(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
        None => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32000, "message": "unknown subnet or method"}
        }),
    })
}

async fn spawn_mock_node(metagraphs: Metagraphs) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/", post(rpc_handler))
        .with_state(metagraphs);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Write a config file pointing at `endpoint` and load it back
fn write_config(dir: &Path, endpoint: &str) -> IndexerConfig {
    let path = dir.join("config.yaml");
    let yaml = format!(
        r#"
partitions: [1, 3, 11]
sync:
  interval_secs: 3
  error_backoff_secs: 7
upstream:
  endpoint: "{}"
  max_retries: 0
storage:
  path: "{}"
server:
  bind: "127.0.0.1:0"
"#,
        endpoint,
        dir.join("metagraph.db").display()
    );
    std::fs::write(&path, yaml).unwrap();
    IndexerConfig::load(&path).unwrap()
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

mod config_tests {
    use super::*;

    #[test]
    fn test_config_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.yaml");

        let mut config = IndexerConfig::new();
        config.partitions = vec![1, 11];
        config.save(&path).unwrap();

        let loaded = IndexerConfig::load(&path).unwrap();
        assert_eq!(loaded.partitions, vec![1, 11]);
        assert_eq!(loaded.sync.interval_secs, 3);
        assert_eq!(loaded.cache.ttl_secs, 300);
    }

    #[test]
    fn test_missing_config_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = IndexerConfig::load(temp_dir.path().join("absent.yaml"));
        assert!(matches!(result, Err(IndexerError::Config(_))));
    }
}

mod end_to_end_tests {
    use super::*;

    #[tokio::test]
    async fn test_sync_then_serve() {
        let temp_dir = TempDir::new().unwrap();
        let metagraphs: Metagraphs = Arc::new(Mutex::new(HashMap::new()));
        metagraphs.lock().unwrap().insert(1, metagraph(1, 4));
        metagraphs.lock().unwrap().insert(11, metagraph(11, 2));

        let endpoint = spawn_mock_node(metagraphs.clone()).await;
        let config = write_config(temp_dir.path(), &endpoint);
        let ctx = Arc::new(AppContext::from_config(config).unwrap());

        // netuid 3 is unknown to the node: the pass still succeeds for 1 and 11.
        let report = ctx.scheduler().run_pass().await.unwrap();
        assert_eq!(report.synced, vec![1, 11]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 3);

        let router = ApiServer::new(ReadApi::new(ctx.clone())).router();

        let (status, body) = get(router.clone(), "/metagraph/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_neurons"], "4");
        assert_eq!(body["table_data"][0]["updated"], 50);
        assert_eq!(body["table_data"][0]["isValidator"], 1);
        assert_eq!(body["table_data"][3]["isValidator"], 0);
        assert_eq!(body["table_data"][2]["axon"], "192.168.1.10:30002");

        let (status, _) = get(router.clone(), "/metagraph/3").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get(router.clone(), "/metagraph/4").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "netuid not allowed");

        let (status, body) = get(router.clone(), "/current-stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transferFee"], 125_000);
        assert_eq!(body["totalStake"], TOTAL_STAKE);
        assert_eq!(body["totalIssuance"], TOTAL_ISSUANCE);
        assert_eq!(body["totalStakePercentage"], 25.0);
        assert_eq!(body["totalDelegatedStake"], 1_600);
        assert!(body["averageValidatorAPR"].as_f64().unwrap() > 0.0);

        let (_, body) = get(router, "/delegates").await;
        assert_eq!(body["delegates"][0]["hotkey"], "5DelegateB");
    }

    #[tokio::test]
    async fn test_failed_partition_keeps_last_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let metagraphs: Metagraphs = Arc::new(Mutex::new(HashMap::new()));
        for netuid in [1, 3, 11] {
            metagraphs.lock().unwrap().insert(netuid, metagraph(netuid, 3));
        }

        let endpoint = spawn_mock_node(metagraphs.clone()).await;
        let config = write_config(temp_dir.path(), &endpoint);
        let ctx = Arc::new(AppContext::from_config(config).unwrap());
        let scheduler = ctx.scheduler();
        let api = ReadApi::new(ctx.clone());

        scheduler.run_pass().await.unwrap();
        let first = api.get_snapshot(3).unwrap();

        {
            let mut metagraphs = metagraphs.lock().unwrap();
            metagraphs.remove(&3);
            metagraphs.insert(1, metagraph(1, 5));
        }
        let report = scheduler.run_pass().await.unwrap();
        assert_eq!(report.synced, vec![1, 11]);

        let stale = api.get_snapshot(3).unwrap();
        assert_eq!(stale.payload, first.payload);
        assert_eq!(stale.version, first.version);

        let fresh = SnapshotPayload::from_json(&api.get_snapshot(1).unwrap().payload).unwrap();
        assert_eq!(fresh.table_data.len(), 5);
    }

    #[tokio::test]
    async fn test_unreachable_node_fails_the_pass() {
        let temp_dir = TempDir::new().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let config = write_config(temp_dir.path(), &endpoint);
        let ctx = AppContext::from_config(config).unwrap();

        let err = ctx.scheduler().run_pass().await.unwrap_err();
        assert!(matches!(err, IndexerError::UpstreamUnavailable(_)));
        assert!(ctx.store.partitions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshots_survive_restart() {
        let temp_dir = TempDir::new().unwrap();
        let metagraphs: Metagraphs = Arc::new(Mutex::new(HashMap::new()));
        metagraphs.lock().unwrap().insert(11, metagraph(11, 2));
        let endpoint = spawn_mock_node(metagraphs).await;

        {
            let config = write_config(temp_dir.path(), &endpoint);
            let ctx = AppContext::from_config(config).unwrap();
            ctx.scheduler().run_pass().await.unwrap();
        }

        let config = write_config(temp_dir.path(), &endpoint);
        let api = ReadApi::new(Arc::new(AppContext::from_config(config).unwrap()));
        let payload = SnapshotPayload::from_json(&api.get_snapshot(11).unwrap().payload).unwrap();
        assert_eq!(payload.total_neurons, "2");
    }
}
