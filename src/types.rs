//! Type definitions for the retrieval engine

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::constants::DAYS_AGO_WINDOW_HOURS;

/// Unique identifier for memory records
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)] // Serialize as plain UUID string, not array
pub struct MemoryId(pub Uuid);

impl MemoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MemoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Closed set of memory categories
///
/// Owned by the ingestion pipeline; the engine only reads it for filtering
/// and diversified selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryCategory {
    Conversation,
    Event,
    Fact,
    Preference,
    Relationship,
    Emotion,
    Task,
    Observation,
}

impl MemoryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversation => "Conversation",
            Self::Event => "Event",
            Self::Fact => "Fact",
            Self::Preference => "Preference",
            Self::Relationship => "Relationship",
            Self::Emotion => "Emotion",
            Self::Task => "Task",
            Self::Observation => "Observation",
        }
    }
}

/// A memory record as produced by the ingestion pipeline
///
/// All fields except `last_accessed` and `access_count` are read-mostly from
/// the engine's perspective; those two are updated on every retrieval via
/// [`MemoryRecord::touch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier
    pub id: MemoryId,

    /// Free-text content
    pub content: String,

    /// Category from the closed enumeration
    pub category: MemoryCategory,

    /// Importance score (0.0 to 1.0)
    pub importance: f32,

    /// Ingestion confidence (0.0 to 1.0)
    pub confidence: f32,

    /// Emotional valence (-1.0 negative to 1.0 positive)
    pub valence: f32,

    /// Emotional intensity (0.0 to 1.0)
    pub intensity: f32,

    /// Optional emotion tag (e.g. "joy", "regret")
    pub emotion_tag: Option<String>,

    /// Optional intent tag assigned at ingestion (e.g. "planning")
    pub intent_tag: Option<String>,

    /// Names of entities this memory relates to
    pub entities: HashSet<String>,

    /// When the record was created
    pub created_at: DateTime<Utc>,

    /// When the record was last returned by a retrieval
    pub last_accessed: DateTime<Utc>,

    /// How many times the record has been retrieved
    pub access_count: u64,
}

impl MemoryRecord {
    /// Create a record with neutral defaults, timestamped now
    pub fn new(content: impl Into<String>, category: MemoryCategory) -> Self {
        let now = Utc::now();
        Self {
            id: MemoryId::new(),
            content: content.into(),
            category,
            importance: 0.5,
            confidence: 1.0,
            valence: 0.0,
            intensity: 0.0,
            emotion_tag: None,
            intent_tag: None,
            entities: HashSet::new(),
            created_at: now,
            last_accessed: now,
            access_count: 0,
        }
    }

    /// Record a retrieval: bump access count and refresh last-accessed
    pub fn touch(&mut self) {
        self.last_accessed = Utc::now();
        self.access_count += 1;
    }

    /// Days elapsed since this record was last accessed
    pub fn days_since_access(&self, now: DateTime<Utc>) -> f64 {
        let elapsed = now.signed_duration_since(self.last_accessed);
        (elapsed.num_seconds().max(0) as f64) / 86_400.0
    }
}

/// Scalar metadata values for vector-entry pre-filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
}

impl std::fmt::Display for MetaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Flag(b) => write!(f, "{b}"),
        }
    }
}

/// Metadata map attached to a vector entry
pub type MetadataMap = HashMap<String, MetaValue>;

/// An entry in the approximate vector index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: MemoryId,
    pub vector: Vec<f32>,
    pub metadata: MetadataMap,
}

/// Temporal predicate variants
///
/// Dispatch is exhaustive pattern matching; adding a variant is a compile
/// error everywhere a window is computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemporalFilter {
    /// Within the last N hours
    RecentHours(i64),
    /// Within the last N days
    RecentDays(i64),
    /// Around N days ago (±12 hours)
    DaysAgo(i64),
    /// Explicit timestamp range
    Range {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    /// A specific calendar date (UTC)
    OnDate(NaiveDate),
    /// Same month and day in any year (birthdays, anniversaries)
    Anniversary { month: u32, day: u32 },
}

impl TemporalFilter {
    /// Whether `when` falls inside this predicate's window, evaluated at `now`
    pub fn matches(&self, when: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            Self::RecentHours(hours) => when >= now - Duration::hours(*hours),
            Self::RecentDays(days) => when >= now - Duration::days(*days),
            Self::DaysAgo(days) => {
                let center = now - Duration::days(*days);
                let half = Duration::hours(DAYS_AGO_WINDOW_HOURS);
                when >= center - half && when <= center + half
            }
            Self::Range { from, to } => when >= *from && when <= *to,
            Self::OnDate(date) => when.date_naive() == *date,
            Self::Anniversary { month, day } => when.month() == *month && when.day() == *day,
        }
    }
}

/// Emotion predicate variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EmotionFilter {
    /// Any record with positive valence
    AnyPositive,
    /// Any record with negative valence
    AnyNegative,
    /// Intensity within an inclusive range
    IntensityRange { min: f32, max: f32 },
    /// Emotion tag in the given set
    Tagged(HashSet<String>),
    /// Valence within an inclusive range
    ValenceRange { min: f32, max: f32 },
}

impl EmotionFilter {
    /// Whether the record satisfies this emotion predicate
    pub fn matches(&self, record: &MemoryRecord) -> bool {
        match self {
            Self::AnyPositive => record.valence > 0.0,
            Self::AnyNegative => record.valence < 0.0,
            Self::IntensityRange { min, max } => {
                record.intensity >= *min && record.intensity <= *max
            }
            Self::Tagged(tags) => record
                .emotion_tag
                .as_ref()
                .map(|t| tags.contains(t))
                .unwrap_or(false),
            Self::ValenceRange { min, max } => record.valence >= *min && record.valence <= *max,
        }
    }
}

/// Structured retrieval query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Free-text query for semantic/lexical matching
    pub text: Option<String>,

    /// Restrict to these categories (None = all)
    pub categories: Option<HashSet<MemoryCategory>>,

    /// Temporal window predicate
    pub temporal: Option<TemporalFilter>,

    /// Entities/people the results should relate to
    pub entities: Option<Vec<String>>,

    /// Emotion predicate
    pub emotion: Option<EmotionFilter>,

    /// Intent tag for exact matching
    pub intent: Option<String>,

    /// Minimum importance threshold
    pub min_importance: f32,

    /// Minimum confidence threshold
    pub min_confidence: f32,

    /// Maximum number of results
    pub limit: usize,

    /// Spread top results across categories
    pub diversify: bool,
}

impl QuerySpec {
    /// A query with the given free text and default thresholds
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            text: Some(query.into()),
            ..Self::default()
        }
    }

    /// A query restricted to the given entities
    pub fn entities(names: Vec<String>) -> Self {
        Self {
            entities: Some(names),
            ..Self::default()
        }
    }
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            text: None,
            categories: None,
            temporal: None,
            entities: None,
            emotion: None,
            intent: None,
            min_importance: 0.0,
            min_confidence: 0.0,
            limit: 10,
            diversify: false,
        }
    }
}

/// Per-dimension relevance scores plus the fused total
///
/// Produced fresh for every query; never persisted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub semantic: f32,
    pub temporal: f32,
    pub importance: f32,
    pub emotional: f32,
    pub entity: f32,
    pub intent: f32,
    pub total: f32,
}

/// Where a ranked candidate came from, for explainability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    /// Found by approximate vector search
    Vector,
    /// Discovered by graph expansion, N hops from a vector hit
    GraphHop(usize),
    /// Matched direct category/entity/temporal filters
    Direct,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vector => write!(f, "vector"),
            Self::GraphHop(n) => write!(f, "graph-hop-{n}"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

/// A ranked retrieval result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedMemory {
    pub record: MemoryRecord,
    /// Per-dimension relevance scores from the multi-dimensional scorer
    pub score: ScoreBreakdown,
    /// Hybrid fusion of relevance, graph centrality, and recency; the sort
    /// key of the final ranking
    pub final_score: f32,
    pub provenance: Provenance,
}

/// Observability counters for a single retrieval
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalStats {
    /// Candidates produced by the vector index
    pub vector_candidates: usize,
    /// Candidates matched by direct filters
    pub direct_candidates: usize,
    /// Candidates added by graph expansion
    pub graph_candidates: usize,
    /// Stale index entries skipped (scheduled for repair)
    pub stale_skipped: usize,
    /// Vector path fell back to the external full scan
    pub degraded_vector_path: bool,
    /// Graph expansion was skipped because the graph service was down
    pub degraded_graph_path: bool,
    /// Total elapsed time in milliseconds
    pub elapsed_ms: u64,
}
