//! Configuration validation
//!
//! Validates indexer configuration for correctness:
//! - At least one partition, no duplicates
//! - Non-zero sync intervals, cache TTLs and capacities
//! - Cache TTLs of at most a year
//! - An http(s) upstream endpoint
//! - A parsable server bind address

use super::indexer_config::IndexerConfig;
use crate::cache::CachedOperation;
use crate::IndexerError;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

/// Longest accepted cache TTL
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate an indexer configuration, collecting every problem found
pub fn validate_config(config: &IndexerConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if config.partitions.is_empty() {
        errors.push(ValidationError::new(
            "partitions",
            "At least one partition must be configured",
        ));
    }

    let mut seen = HashSet::new();
    for netuid in &config.partitions {
        if !seen.insert(netuid) {
            errors.push(ValidationError::new(
                "partitions",
                format!("Duplicate partition: {}", netuid),
            ));
        }
    }

    if config.sync.interval_secs == 0 {
        errors.push(ValidationError::new(
            "sync.interval_secs",
            "Sync interval must be greater than 0",
        ));
    }

    if config.sync.error_backoff_secs == 0 {
        errors.push(ValidationError::new(
            "sync.error_backoff_secs",
            "Error backoff must be greater than 0",
        ));
    }

    for operation in CachedOperation::ALL {
        let policy = config.cache.policy_for(operation);
        if policy.ttl.is_zero() {
            errors.push(ValidationError::new(
                format!("cache.{}", operation.as_str()),
                "TTL must be greater than 0",
            ));
        } else if policy.ttl > MAX_CACHE_TTL {
            errors.push(ValidationError::new(
                format!("cache.{}", operation.as_str()),
                format!("TTL must be at most {} seconds", MAX_CACHE_TTL.as_secs()),
            ));
        }
        if policy.capacity == 0 {
            errors.push(ValidationError::new(
                format!("cache.{}", operation.as_str()),
                "Capacity must be greater than 0",
            ));
        }
    }

    let endpoint = &config.upstream.endpoint;
    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        errors.push(ValidationError::new(
            "upstream.endpoint",
            format!("Invalid endpoint URL: {}", endpoint),
        ));
    }

    if config.server.bind.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind",
            format!("Invalid bind address: {}", config.server.bind),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate configuration and return a Result
pub fn validate_config_result(config: &IndexerConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        IndexerError::Config(format!(
            "Configuration validation failed:\n  - {}",
            messages.join("\n  - ")
        ))
    })
}
