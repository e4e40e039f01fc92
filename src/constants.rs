//! Documented constants for the retrieval engine
//!
//! This module contains all tunable parameters with justification for their
//! values. Centralizing constants prevents magic numbers and makes tuning
//! easier.

// =============================================================================
// MULTI-DIMENSIONAL SCORING WEIGHTS
// Must sum to exactly 1.0 — enforced by EngineConfig::validate at startup.
// =============================================================================

/// Weight for the semantic (lexical-overlap) dimension
///
/// Largest single weight: the free-text query is the strongest signal of
/// intent when present. When absent the dimension returns a neutral 0.5 so
/// the other dimensions decide the ranking.
pub const WEIGHT_SEMANTIC: f32 = 0.30;

/// Weight for the temporal (recency + window match) dimension
///
/// Recently accessed memories are disproportionately likely to be relevant
/// again; 0.20 keeps recency influential without letting it bury old but
/// important records.
pub const WEIGHT_TEMPORAL: f32 = 0.20;

/// Weight for the importance dimension (importance blended with confidence)
pub const WEIGHT_IMPORTANCE: f32 = 0.20;

/// Weight for the emotional dimension
///
/// Only discriminative when the query carries an emotion predicate;
/// unmatched records still receive a baseline (see
/// [`EMOTION_UNMATCHED_BASELINE`]) so emotion never starves other signals.
pub const WEIGHT_EMOTIONAL: f32 = 0.15;

/// Weight for the entity-overlap dimension
pub const WEIGHT_ENTITY: f32 = 0.10;

/// Weight for the intent-tag dimension
///
/// Smallest weight: intent tags are coarse and often absent, so an exact
/// match is a nudge, not a verdict.
pub const WEIGHT_INTENT: f32 = 0.05;

/// Blend factor for importance vs. confidence inside the importance dimension
///
/// importance_score = 0.7 × importance + 0.3 × confidence.
/// Importance is the stronger editorial signal; confidence guards against
/// boosting records the ingestion pipeline itself doubts.
pub const IMPORTANCE_BLEND: f32 = 0.7;

/// Neutral semantic score when the query has no free text
pub const SEMANTIC_NEUTRAL: f32 = 0.5;

/// Baseline emotional score for records that do not match the emotion
/// predicate
///
/// 0.25 (middle of the 0.2–0.3 band) rather than zero: an emotion mismatch
/// should dampen, never eliminate, an otherwise-relevant result.
pub const EMOTION_UNMATCHED_BASELINE: f32 = 0.25;

/// Intent score when the record's intent tag does not match the query's
pub const INTENT_MISMATCH_SCORE: f32 = 0.3;

// =============================================================================
// TEMPORAL SCORING
// =============================================================================

/// Recency decay constant, in days
///
/// recency = exp(-days_since_last_access / 30). A record untouched for 30
/// days scores e⁻¹ ≈ 0.368; one untouched for 90 days ≈ 0.05. Thirty days
/// matches the cadence of a personal knowledge base where "last month"
/// still feels current.
pub const RECENCY_DECAY_DAYS: f64 = 30.0;

/// Multiplier when the record's creation time falls inside the query's
/// explicit temporal window (capped at 1.0 after multiplication)
pub const TEMPORAL_WINDOW_BOOST: f32 = 1.5;

/// Multiplier when an explicit temporal window is given and the record
/// falls outside it
pub const TEMPORAL_WINDOW_MISS: f32 = 0.5;

/// Half-width of the "N days ago" window, in hours
pub const DAYS_AGO_WINDOW_HOURS: i64 = 12;

// =============================================================================
// HYBRID FUSION WEIGHTS
// Must sum to exactly 1.0 — enforced by EngineConfig::validate at startup.
// =============================================================================

/// Fusion weight for the vector-similarity component
pub const FUSION_WEIGHT_VECTOR: f32 = 0.6;

/// Fusion weight for the graph-centrality component
pub const FUSION_WEIGHT_CENTRALITY: f32 = 0.2;

/// Fusion weight for the recency component
pub const FUSION_WEIGHT_RECENCY: f32 = 0.2;

/// Default number of graph-expansion hops from the vector-hit entity set
pub const DEFAULT_EXPANSION_HOPS: usize = 1;

// =============================================================================
// LSH VECTOR INDEX GEOMETRY
// =============================================================================

/// Number of independent hash tables
///
/// More tables raise recall (a near neighbor only needs to collide in one
/// table) at linear memory cost. 8 tables with 12-bit hashes gives high
/// recall at K=10 on unit-norm embedding distributions.
pub const LSH_NUM_TABLES: usize = 8;

/// Bits per hash (random hyperplanes per table)
///
/// More bits shrink buckets (fewer false candidates) but lower collision
/// probability for true neighbors. 12 bits → 4096 buckets per table.
pub const LSH_HASH_BITS: usize = 12;

/// Capacity of the per-index LRU search-result cache
pub const VECTOR_RESULT_CACHE_CAPACITY: usize = 256;

// =============================================================================
// GRAPH REASONING
// =============================================================================

/// Maximum Louvain local-moving passes
///
/// Convergence on social-scale graphs (thousands of nodes) almost always
/// happens within a handful of passes; 10 is a hard stop against
/// oscillation.
pub const LOUVAIN_MAX_ITERATIONS: usize = 10;

/// Minimum total modularity gain per pass to keep iterating
pub const LOUVAIN_MIN_GAIN: f64 = 1e-6;

/// Communities smaller than this are merged into their best-connected
/// neighbor community
pub const MIN_COMMUNITY_SIZE: usize = 2;

/// Default hop bound for shortest-path search
pub const DEFAULT_MAX_HOPS: usize = 4;

/// Cap on enumerated paths in the all-paths variant
pub const MAX_PATHS_ENUMERATED: usize = 20;

/// Mutual-neighbor thresholds for potential-relationship inference
///
/// ≥5 mutual neighbors → 0.9, ≥3 → 0.7, ≥1 → 0.5, else 0.2. Coarse but
/// deterministic; downstream callers depend on these exact values.
pub const MUTUAL_CONFIDENCE_HIGH: f32 = 0.9;
pub const MUTUAL_CONFIDENCE_MEDIUM: f32 = 0.7;
pub const MUTUAL_CONFIDENCE_LOW: f32 = 0.5;
pub const MUTUAL_CONFIDENCE_NONE: f32 = 0.2;

// =============================================================================
// RETRIEVAL CACHES
// =============================================================================

/// TTL for single-pair relationship lookups, in seconds
///
/// Pair lookups are the hottest and cheapest entries to hold; 10 minutes.
pub const PAIR_CACHE_TTL_SECS: i64 = 600;

/// TTL for per-entity relationship-list lookups, in seconds (5 minutes)
pub const ENTITY_CACHE_TTL_SECS: i64 = 300;

/// TTL for path/query result caches, in seconds (5 minutes)
pub const PATH_CACHE_TTL_SECS: i64 = 300;

/// LRU capacity shared by each cache scope
pub const RELATIONSHIP_CACHE_CAPACITY: usize = 512;

// =============================================================================
// EXTERNAL SERVICE RESILIENCE
// =============================================================================

/// Maximum retry attempts for a transient external failure
pub const BACKOFF_MAX_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds (doubles per retry: 50, 100, 200)
pub const BACKOFF_INITIAL_MS: u64 = 50;

/// Deadline for a single external service call, in milliseconds
///
/// A hung call counts as a failure: the worker is abandoned at the deadline
/// and the caller proceeds to its degraded path. Two seconds comfortably
/// covers a slow embedding round-trip without letting one query stall.
pub const SERVICE_CALL_TIMEOUT_MS: u64 = 2_000;

/// Consecutive failures before the failure tracker short-circuits calls
pub const FAILURE_THRESHOLD: u32 = 5;

/// Cooldown before a short-circuited service is tried again, in seconds
pub const FAILURE_COOLDOWN_SECS: u64 = 30;

// =============================================================================
// BATCH RETRIEVAL
// =============================================================================

/// Default bound on concurrently executing queries in a batch
pub const DEFAULT_BATCH_WORKERS: usize = 4;
