//! Configuration for the retrieval engine
//!
//! Sensible defaults, overridable through `SMRITI_*` environment variables.
//! The loaded configuration is validated and logged at startup.

use std::env;
use tracing::info;

use crate::constants::{
    DEFAULT_BATCH_WORKERS, DEFAULT_EXPANSION_HOPS, DEFAULT_MAX_HOPS, LSH_HASH_BITS,
    LSH_NUM_TABLES, SERVICE_CALL_TIMEOUT_MS,
};
use crate::errors::{RecallError, RecallResult};
use crate::fusion::fusion_weight_sum;
use crate::scoring::weight_sum;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Embedding dimension the vector index is built for
    pub vector_dim: usize,

    /// Number of LSH hash tables
    pub lsh_tables: usize,

    /// Bits per LSH hash
    pub lsh_hash_bits: usize,

    /// Optional fixed seed for the LSH hyperplanes (deterministic indices)
    pub lsh_seed: Option<u64>,

    /// Graph-expansion hops during hybrid fusion
    pub expansion_hops: usize,

    /// Hop bound for path queries
    pub max_path_hops: usize,

    /// Concurrent query bound for batch retrieval
    pub batch_workers: usize,

    /// Deadline per external service call, in milliseconds
    pub service_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vector_dim: 384,
            lsh_tables: LSH_NUM_TABLES,
            lsh_hash_bits: LSH_HASH_BITS,
            lsh_seed: None,
            expansion_hops: DEFAULT_EXPANSION_HOPS,
            max_path_hops: DEFAULT_MAX_HOPS,
            batch_workers: DEFAULT_BATCH_WORKERS,
            service_timeout_ms: SERVICE_CALL_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    /// Load configuration with environment overrides
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(dim) = read_env_usize("SMRITI_VECTOR_DIM") {
            config.vector_dim = dim;
        }
        if let Some(tables) = read_env_usize("SMRITI_LSH_TABLES") {
            config.lsh_tables = tables;
        }
        if let Some(bits) = read_env_usize("SMRITI_LSH_BITS") {
            config.lsh_hash_bits = bits;
        }
        if let Some(hops) = read_env_usize("SMRITI_EXPANSION_HOPS") {
            config.expansion_hops = hops;
        }
        if let Some(hops) = read_env_usize("SMRITI_MAX_PATH_HOPS") {
            config.max_path_hops = hops;
        }
        if let Some(workers) = read_env_usize("SMRITI_BATCH_WORKERS") {
            config.batch_workers = workers;
        }
        if let Some(timeout) = read_env_usize("SMRITI_SERVICE_TIMEOUT_MS") {
            config.service_timeout_ms = timeout as u64;
        }

        info!(
            vector_dim = config.vector_dim,
            lsh_tables = config.lsh_tables,
            lsh_hash_bits = config.lsh_hash_bits,
            expansion_hops = config.expansion_hops,
            max_path_hops = config.max_path_hops,
            batch_workers = config.batch_workers,
            service_timeout_ms = config.service_timeout_ms,
            "engine configuration loaded"
        );
        config
    }

    /// Validate structural invariants at startup
    ///
    /// The scoring and fusion weights are compile-time constants; this
    /// check turns a bad edit into a startup failure instead of a silently
    /// skewed ranking.
    pub fn validate(&self) -> RecallResult<()> {
        if (weight_sum() - 1.0).abs() > 1e-6 {
            return Err(RecallError::InvalidConfig(format!(
                "scoring weights sum to {}, expected 1.0",
                weight_sum()
            )));
        }
        if (fusion_weight_sum() - 1.0).abs() > 1e-6 {
            return Err(RecallError::InvalidConfig(format!(
                "fusion weights sum to {}, expected 1.0",
                fusion_weight_sum()
            )));
        }
        if self.vector_dim == 0 {
            return Err(RecallError::InvalidConfig(
                "vector dimension must be positive".to_string(),
            ));
        }
        if self.lsh_tables == 0 || self.lsh_hash_bits == 0 || self.lsh_hash_bits > 64 {
            return Err(RecallError::InvalidConfig(
                "LSH geometry must have at least one table and 1-64 hash bits".to_string(),
            ));
        }
        if self.batch_workers == 0 {
            return Err(RecallError::InvalidConfig(
                "batch worker bound must be positive".to_string(),
            ));
        }
        if self.service_timeout_ms == 0 {
            return Err(RecallError::InvalidConfig(
                "service call timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_env_usize(var: &str) -> Option<usize> {
    env::var(var).ok().and_then(|raw| raw.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let mut config = EngineConfig::default();
        config.vector_dim = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_hash_rejected() {
        let mut config = EngineConfig::default();
        config.lsh_hash_bits = 65;
        assert!(config.validate().is_err());
    }
}
