//! Smriti
//!
//! Hybrid retrieval engine for a personal knowledge base.
//!
//! # Key Features
//! - Approximate vector search (LSH with metadata pre-filtering)
//! - Multi-dimensional relevance scoring (semantic/temporal/importance/
//!   emotional/entity/intent)
//! - Relationship graph with bi-temporal edges, community detection,
//!   centrality and path reasoning
//! - Hybrid rank fusion of vector, graph, and recency signals
//! - TTL + LRU caching with synchronous write invalidation
//!
//! # Resilience
//! - Bounded retry with exponential backoff on external services
//! - Consecutive-failure short-circuiting with cooldown
//! - Every degraded path returns partial results, never an error

pub mod cache;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod fusion;
pub mod graph;
pub mod scoring;
pub mod services;
pub mod similarity;
pub mod tracing_setup;
pub mod types;
pub mod validation;
pub mod vector_index;

// Re-export dependencies to ensure tests/benchmarks use the same version
pub use chrono;
pub use parking_lot;
pub use uuid;

pub use config::EngineConfig;
pub use engine::{RecallEngine, RelationInference};
pub use errors::{RecallError, RecallResult};
pub use types::{
    MemoryCategory, MemoryId, MemoryRecord, Provenance, QuerySpec, RankedMemory, RetrievalStats,
};
