//! Indexer configuration file handling

use crate::cache::{CachePolicy, CachedOperation};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Sync loop timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Pause between successful passes, in seconds
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,

    /// Extra pause after a failed pass, in seconds
    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,
}

fn default_sync_interval() -> u64 {
    3
}

fn default_error_backoff() -> u64 {
    7
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_sync_interval(),
            error_backoff_secs: default_error_backoff(),
        }
    }
}

/// Per-operation override of the cache defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
}

/// Cache settings shared by every cached upstream read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Default time-to-live, in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Default number of entries kept per operation
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Overrides keyed by operation (transfer_fee, total_stake, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub overrides: HashMap<CachedOperation, CacheOverride>,
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_cache_capacity() -> usize {
    1
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            capacity: default_cache_capacity(),
            overrides: HashMap::new(),
        }
    }
}

impl CacheSettings {
    /// Resolve the effective policy for one operation
    pub fn policy_for(&self, operation: CachedOperation) -> CachePolicy {
        let over = self.overrides.get(&operation);
        CachePolicy {
            ttl: Duration::from_secs(over.and_then(|o| o.ttl_secs).unwrap_or(self.ttl_secs)),
            capacity: over.and_then(|o| o.capacity).unwrap_or(self.capacity),
        }
    }
}

/// Parameters of the transfer used to estimate the network transfer fee
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferFeeProbe {
    /// Destination address; the upstream picks its own key when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,

    /// Transfer amount in rao
    #[serde(default = "default_probe_value")]
    pub value_rao: u64,
}

fn default_probe_value() -> u64 {
    1
}

impl Default for TransferFeeProbe {
    fn default() -> Self {
        Self {
            dest: None,
            value_rao: default_probe_value(),
        }
    }
}

/// Upstream node connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSettings {
    /// JSON-RPC endpoint (http or https)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-request timeout, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Retries on transient failures, not counting the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub transfer_fee_probe: TransferFeeProbe,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:9944".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            transfer_fee_probe: TransferFeeProbe::default(),
        }
    }
}

/// Snapshot database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Path to the SQLite database file
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,

    /// Enable WAL mode so readers never wait on the sync writer
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

fn default_storage_path() -> PathBuf {
    IndexerConfig::default_dir().join("metagraph.db")
}

fn default_wal_mode() -> bool {
    true
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Allowed CORS origins; an empty list allows any origin
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:3001".to_string(),
        "https://taotensor.netlify.app".to_string(),
    ]
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Indexer configuration
///
/// Represents the complete ~/.config/metagraph-indexer/config.yaml file. Every
/// section is optional; missing fields fall back to their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Partition keys (netuids) that are synced and may be read
    #[serde(default = "default_partitions")]
    pub partitions: Vec<u16>,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub upstream: UpstreamSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub server: ServerSettings,
}

fn default_partitions() -> Vec<u16> {
    vec![1, 3, 11]
}

impl IndexerConfig {
    /// Create a configuration with every default applied
    pub fn new() -> Self {
        Self {
            partitions: default_partitions(),
            sync: SyncSettings::default(),
            cache: CacheSettings::default(),
            upstream: UpstreamSettings::default(),
            storage: StorageSettings::default(),
            server: ServerSettings::default(),
        }
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::IndexerError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading indexer configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            partitions = ?config.partitions,
            endpoint = %config.upstream.endpoint,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving indexer configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Directory holding the config file and the default database
    pub fn default_dir() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("metagraph-indexer");
        path
    }

    /// Get the default config path (~/.config/metagraph-indexer/config.yaml)
    pub fn default_path() -> PathBuf {
        Self::default_dir().join("config.yaml")
    }

    /// Whether a partition key is in the allowed set
    pub fn is_allowed(&self, netuid: u16) -> bool {
        self.partitions.contains(&netuid)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.sync.error_backoff_secs)
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = IndexerConfig::new();
        assert_eq!(config.partitions, vec![1, 3, 11]);
        assert_eq!(config.sync_interval(), Duration::from_secs(3));
        assert_eq!(config.error_backoff(), Duration::from_secs(7));
        assert_eq!(config.cache.ttl_secs, 300);
        assert!(config.storage.path.ends_with("metagraph-indexer/metagraph.db"));
    }

    #[test]
    fn test_is_allowed() {
        let config = IndexerConfig::new();
        assert!(config.is_allowed(3));
        assert!(!config.is_allowed(2));
    }

    #[test]
    fn test_save_and_load() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        let mut config = IndexerConfig::new();
        config.partitions = vec![1, 21];
        config.upstream.endpoint = "https://rpc.example.org".to_string();
        config.save(path).unwrap();

        let loaded = IndexerConfig::load(path).unwrap();
        assert_eq!(loaded.partitions, vec![1, 21]);
        assert_eq!(loaded.upstream.endpoint, "https://rpc.example.org");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "partitions: [5]\nsync:\n  interval_secs: 10\n";
        let config: IndexerConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.partitions, vec![5]);
        assert_eq!(config.sync.interval_secs, 10);
        assert_eq!(config.sync.error_backoff_secs, 7);
        assert_eq!(config.server.bind, "0.0.0.0:8000");
    }

    #[test]
    fn test_cache_overrides() {
        let yaml = r#"
cache:
  ttl_secs: 120
  overrides:
    total_issuance:
      ttl_secs: 30
"#;
        let config: IndexerConfig = serde_yaml::from_str(yaml).unwrap();

        let issuance = config.cache.policy_for(CachedOperation::TotalIssuance);
        assert_eq!(issuance.ttl, Duration::from_secs(30));
        assert_eq!(issuance.capacity, 1);

        let stake = config.cache.policy_for(CachedOperation::TotalStake);
        assert_eq!(stake.ttl, Duration::from_secs(120));
    }

    #[test]
    fn test_load_missing_file() {
        let result = IndexerConfig::load("/nonexistent/config.yaml");
        assert!(matches!(result, Err(crate::IndexerError::Config(_))));
    }
}
