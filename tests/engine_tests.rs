//! End-to-end retrieval pipeline tests
//!
//! Exercises the full engine against in-memory service doubles: vector
//! candidates, direct filters, graph expansion, fusion, diversification,
//! and the degraded paths when a service is down.

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use smriti::engine::RecallEngine;
use smriti::errors::RecallError;
use smriti::graph::{RelationType, RelationshipEdge};
use smriti::services::{GraphQueryService, GraphRow, ParamValue, VectorService};
use smriti::similarity::cosine_similarity;
use smriti::types::{
    MemoryCategory, MemoryId, MemoryRecord, MetadataMap, Provenance, QuerySpec, TemporalFilter,
};
use smriti::vector_index::MetadataFilter;
use smriti::EngineConfig;

// ============================================================================
// TEST INFRASTRUCTURE
// ============================================================================

const DIM: usize = 16;

/// Deterministic bag-of-tokens embedder backed by an in-memory store
struct TokenHashVectors {
    store: Mutex<HashMap<MemoryId, (Vec<f32>, MetadataMap)>>,
}

impl TokenHashVectors {
    fn new() -> Self {
        Self {
            store: Mutex::new(HashMap::new()),
        }
    }
}

fn token_embedding(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    for token in text.split_whitespace() {
        let mut hasher = DefaultHasher::new();
        token.to_lowercase().hash(&mut hasher);
        v[(hasher.finish() as usize) % DIM] += 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

impl VectorService for TokenHashVectors {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(token_embedding(text))
    }

    fn persist(&self, id: MemoryId, vector: &[f32], metadata: &MetadataMap) -> Result<()> {
        self.store
            .lock()
            .insert(id, (vector.to_vec(), metadata.clone()));
        Ok(())
    }

    fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(MemoryId, f32)>> {
        let store = self.store.lock();
        let mut hits: Vec<(MemoryId, f32)> = store
            .iter()
            .filter(|(_, (_, metadata))| match filter {
                None => true,
                Some(f) => f
                    .equals
                    .iter()
                    .all(|(key, value)| metadata.get(key) == Some(value)),
            })
            .map(|(id, (stored, _))| (*id, cosine_similarity(vector, stored)))
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));
        hits.truncate(k);
        Ok(hits)
    }
}

/// Vector service that always fails, for degradation tests
struct DownVectors;

impl VectorService for DownVectors {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(anyhow!("connection refused"))
    }

    fn persist(&self, _id: MemoryId, _vector: &[f32], _metadata: &MetadataMap) -> Result<()> {
        Err(anyhow!("connection refused"))
    }

    fn query(
        &self,
        _vector: &[f32],
        _k: usize,
        _filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(MemoryId, f32)>> {
        Err(anyhow!("connection refused"))
    }
}

/// Vector service that hangs far past any reasonable deadline
struct HungVectors;

impl VectorService for HungVectors {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        std::thread::sleep(std::time::Duration::from_secs(30));
        Err(anyhow!("woke up"))
    }

    fn persist(&self, _id: MemoryId, _vector: &[f32], _metadata: &MetadataMap) -> Result<()> {
        std::thread::sleep(std::time::Duration::from_secs(30));
        Err(anyhow!("woke up"))
    }

    fn query(
        &self,
        _vector: &[f32],
        _k: usize,
        _filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(MemoryId, f32)>> {
        std::thread::sleep(std::time::Duration::from_secs(30));
        Err(anyhow!("woke up"))
    }
}

/// Vector service whose full-scan fallback reports an id nobody stores
struct GhostVectors;

impl VectorService for GhostVectors {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(token_embedding(text))
    }

    fn persist(&self, _id: MemoryId, _vector: &[f32], _metadata: &MetadataMap) -> Result<()> {
        Ok(())
    }

    fn query(
        &self,
        _vector: &[f32],
        _k: usize,
        _filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(MemoryId, f32)>> {
        Ok(vec![(MemoryId::new(), 0.99)])
    }
}

/// Graph service double that accepts every statement and returns no rows
struct QuietGraph;

impl GraphQueryService for QuietGraph {
    fn execute(&self, _query: &str, _params: &[(String, ParamValue)]) -> Result<Vec<GraphRow>> {
        Ok(Vec::new())
    }
}

fn test_config() -> EngineConfig {
    EngineConfig {
        vector_dim: DIM,
        lsh_seed: Some(42),
        ..EngineConfig::default()
    }
}

fn setup_engine() -> Arc<RecallEngine> {
    let engine = RecallEngine::new(
        test_config(),
        Arc::new(TokenHashVectors::new()),
        Arc::new(QuietGraph),
    )
    .expect("engine construction");
    Arc::new(engine)
}

fn record(content: &str, category: MemoryCategory) -> MemoryRecord {
    MemoryRecord::new(content, category)
}

// ============================================================================
// VECTOR PATH
// ============================================================================

#[test]
fn test_text_query_returns_relevant_record_first() {
    let engine = setup_engine();
    let hit = record("Maya moved to Lisbon last spring", MemoryCategory::Fact);
    let hit_id = hit.id;
    engine.insert_record(hit).unwrap();
    engine
        .insert_record(record("grocery run on Tuesday", MemoryCategory::Task))
        .unwrap();

    let results = engine
        .retrieve(&QuerySpec::text("when did Maya moved to Lisbon"))
        .unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].record.id, hit_id);
    assert!(results[0].final_score > 0.0);
}

#[test]
fn test_vector_hits_respect_hard_filters() {
    let engine = setup_engine();
    let mut weak = record("Lisbon trip notes", MemoryCategory::Fact);
    weak.importance = 0.1;
    let weak_id = weak.id;
    engine.insert_record(weak).unwrap();
    let mut strong = record("Lisbon trip itinerary", MemoryCategory::Fact);
    strong.importance = 0.9;
    engine.insert_record(strong).unwrap();

    let mut query = QuerySpec::text("Lisbon trip");
    query.min_importance = 0.5;
    let results = engine.retrieve(&query).unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.record.id != weak_id));
}

#[test]
fn test_stale_index_hit_skipped_and_queued_for_repair() {
    let engine = Arc::new(
        RecallEngine::new(test_config(), Arc::new(GhostVectors), Arc::new(QuietGraph))
            .expect("engine construction"),
    );
    engine
        .insert_record(record("solitary note", MemoryCategory::Fact))
        .unwrap();

    // LSH undershoots, the fallback scan reports a ghost id
    let (results, stats) = engine
        .retrieve_with_stats(&QuerySpec::text("unrelated text"))
        .unwrap();
    assert_eq!(stats.stale_skipped, 1);
    assert!(results.iter().all(|r| engine.get_record(&r.record.id).is_some()));
    assert_eq!(engine.drain_repair_queue().len(), 1);
    // Draining empties the queue
    assert!(engine.drain_repair_queue().is_empty());
}

// ============================================================================
// DIRECT FILTERS
// ============================================================================

#[test]
fn test_temporal_filter_selects_window() {
    let engine = setup_engine();
    let mut old = record("last year's review", MemoryCategory::Event);
    old.created_at = Utc::now() - Duration::days(400);
    let old_id = old.id;
    let recent = record("yesterday's review", MemoryCategory::Event);
    let recent_id = recent.id;
    engine.insert_record_with_vector(old, vec![0.0; DIM]).unwrap();
    engine
        .insert_record_with_vector(recent, vec![0.0; DIM])
        .unwrap();

    let mut query = QuerySpec::default();
    query.temporal = Some(TemporalFilter::RecentDays(7));
    let results = engine.retrieve(&query).unwrap();
    assert!(results.iter().any(|r| r.record.id == recent_id));
    assert!(results.iter().all(|r| r.record.id != old_id));
    assert!(results
        .iter()
        .all(|r| r.provenance == Provenance::Direct));
}

#[test]
fn test_entity_filter_matches_set_and_content() {
    let engine = setup_engine();
    let mut tagged = record("dinner at the old port", MemoryCategory::Event);
    tagged.entities.insert("Ana".to_string());
    let tagged_id = tagged.id;
    let mentioned = record("Ana recommended the bakery", MemoryCategory::Fact);
    let mentioned_id = mentioned.id;
    let unrelated = record("car service booked", MemoryCategory::Task);
    for r in [tagged, mentioned, unrelated] {
        engine.insert_record(r).unwrap();
    }

    let results = engine
        .retrieve(&QuerySpec::entities(vec!["Ana".to_string()]))
        .unwrap();
    let ids: HashSet<MemoryId> = results.iter().map(|r| r.record.id).collect();
    assert!(ids.contains(&tagged_id));
    assert!(ids.contains(&mentioned_id));
    assert_eq!(ids.len(), 2);
}

// ============================================================================
// GRAPH EXPANSION
// ============================================================================

#[test]
fn test_graph_expansion_pulls_in_neighbor_memories() {
    let engine = setup_engine();
    engine.add_relationship(RelationshipEdge::new(
        "Ana",
        "Ben",
        RelationType::Friend,
        0.9,
    ));

    let mut about_ana = record("coffee with Ana downtown", MemoryCategory::Event);
    about_ana.entities.insert("Ana".to_string());
    let mut about_ben = record("Ben started a new job", MemoryCategory::Fact);
    about_ben.entities.insert("Ben".to_string());
    let ben_id = about_ben.id;
    engine.insert_record(about_ana).unwrap();
    engine.insert_record(about_ben).unwrap();

    let (results, stats) = engine
        .retrieve_with_stats(&QuerySpec::entities(vec!["Ana".to_string()]))
        .unwrap();
    let ben_result = results
        .iter()
        .find(|r| r.record.id == ben_id)
        .expect("neighbor memory reached through the graph");
    assert_eq!(ben_result.provenance, Provenance::GraphHop(1));
    assert!(stats.graph_candidates >= 1);
}

#[test]
fn test_vector_provenance_wins_over_graph() {
    let engine = setup_engine();
    engine.add_relationship(RelationshipEdge::new(
        "Ana",
        "Ben",
        RelationType::Friend,
        0.9,
    ));
    let mut both = record("Ana and Ben hiked Sintra together", MemoryCategory::Event);
    both.entities.insert("Ana".to_string());
    both.entities.insert("Ben".to_string());
    engine.insert_record(both).unwrap();

    let mut query = QuerySpec::text("Ana Ben hiked Sintra");
    query.entities = Some(vec!["Ana".to_string()]);
    let results = engine.retrieve(&query).unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].provenance, Provenance::Vector);
}

// ============================================================================
// RANKING, DIVERSIFICATION, ACCESS TELEMETRY
// ============================================================================

#[test]
fn test_limit_and_descending_order() {
    let engine = setup_engine();
    for i in 0..20 {
        let mut r = record(&format!("Lisbon note number {i}"), MemoryCategory::Fact);
        r.importance = 0.3 + (i as f32) * 0.03;
        engine.insert_record(r).unwrap();
    }

    let mut query = QuerySpec::text("Lisbon note");
    query.limit = 5;
    let results = engine.retrieve(&query).unwrap();
    assert_eq!(results.len(), 5);
    for pair in results.windows(2) {
        assert!(pair[0].final_score >= pair[1].final_score);
    }
}

#[test]
fn test_diversified_selection_covers_categories() {
    let engine = setup_engine();
    // Facts dominate the score range, a few other categories trail
    for i in 0..24 {
        let mut r = record(&format!("Lisbon fact {i}"), MemoryCategory::Fact);
        r.importance = 0.9;
        engine.insert_record(r).unwrap();
    }
    for (content, category) in [
        ("Lisbon concert last week", MemoryCategory::Event),
        ("pack for Lisbon", MemoryCategory::Task),
        ("prefers Lisbon in autumn", MemoryCategory::Preference),
        ("felt at home in Lisbon", MemoryCategory::Emotion),
        ("told Ana about Lisbon", MemoryCategory::Conversation),
        ("Lisbon streets were quiet", MemoryCategory::Observation),
    ] {
        let mut r = record(content, category);
        r.importance = 0.2;
        engine.insert_record(r).unwrap();
    }

    let mut query = QuerySpec::text("Lisbon");
    query.limit = 10;
    query.diversify = true;
    let results = engine.retrieve(&query).unwrap();
    assert_eq!(results.len(), 10);

    let categories: HashSet<MemoryCategory> =
        results.iter().map(|r| r.record.category).collect();
    // Every distinct category present in the corpus gets representation
    assert!(categories.len() >= 7);
}

#[test]
fn test_fifty_record_diversified_top_five() {
    let engine = setup_engine();
    let categories = [
        MemoryCategory::Fact,
        MemoryCategory::Event,
        MemoryCategory::Task,
    ];
    for i in 0..50 {
        let mut r = record(
            &format!("note number {i}"),
            categories[i % categories.len()],
        );
        // Facts strictly outscore events, events outscore tasks
        r.importance = match categories[i % categories.len()] {
            MemoryCategory::Fact => 0.9,
            MemoryCategory::Event => 0.6,
            _ => 0.3,
        };
        engine.insert_record(r).unwrap();
    }

    let mut query = QuerySpec::default();
    query.categories = Some(categories.into_iter().collect());
    query.limit = 5;
    query.diversify = true;
    let results = engine.retrieve(&query).unwrap();
    assert!(results.len() <= 5);

    let found: HashSet<MemoryCategory> = results.iter().map(|r| r.record.category).collect();
    for category in categories {
        assert!(found.contains(&category), "missing {category:?}");
    }
}

#[test]
fn test_retrieval_touches_returned_records() {
    let engine = setup_engine();
    let r = record("touched on retrieval", MemoryCategory::Fact);
    let id = r.id;
    engine.insert_record(r).unwrap();

    engine.retrieve(&QuerySpec::text("touched on retrieval")).unwrap();
    engine.retrieve(&QuerySpec::text("touched on retrieval")).unwrap();
    let after = engine.get_record(&id).unwrap();
    assert_eq!(after.access_count, 2);
}

// ============================================================================
// DEGRADED PATHS AND ERRORS
// ============================================================================

#[test]
fn test_vector_outage_degrades_to_direct_filters() {
    let engine = Arc::new(
        RecallEngine::new(test_config(), Arc::new(DownVectors), Arc::new(QuietGraph))
            .expect("engine construction"),
    );
    let kept = record("stored despite outage", MemoryCategory::Fact);
    let kept_id = kept.id;
    engine.insert_record(kept).unwrap();

    let mut query = QuerySpec::text("stored despite outage");
    query.categories = Some([MemoryCategory::Fact].into_iter().collect());
    let (results, stats) = engine.retrieve_with_stats(&query).unwrap();
    assert!(stats.degraded_vector_path);
    assert_eq!(stats.vector_candidates, 0);
    assert!(results.iter().any(|r| r.record.id == kept_id));
}

#[test]
fn test_hung_vector_service_degrades_within_deadline() {
    let config = EngineConfig {
        service_timeout_ms: 50,
        ..test_config()
    };
    let engine = RecallEngine::new(config, Arc::new(HungVectors), Arc::new(QuietGraph))
        .expect("engine construction");

    let started = std::time::Instant::now();
    let kept = record("survives a hung embedder", MemoryCategory::Fact);
    let kept_id = kept.id;
    engine.insert_record(kept).unwrap();

    let mut query = QuerySpec::text("survives a hung embedder");
    query.categories = Some([MemoryCategory::Fact].into_iter().collect());
    let (results, stats) = engine.retrieve_with_stats(&query).unwrap();
    assert!(stats.degraded_vector_path);
    assert!(results.iter().any(|r| r.record.id == kept_id));
    // Per-attempt deadlines plus backoff sleeps, never the 30 s hang
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
}

#[test]
fn test_invalid_query_rejected_before_any_work() {
    let engine = setup_engine();
    let mut query = QuerySpec::default();
    query.limit = 0;
    match engine.retrieve(&query) {
        Err(RecallError::InvalidQuery { field, .. }) => assert_eq!(field, "limit"),
        other => panic!("expected InvalidQuery, got {other:?}"),
    }
}

#[test]
fn test_wrong_dimension_vector_rejected() {
    let engine = setup_engine();
    let result =
        engine.insert_record_with_vector(record("short", MemoryCategory::Fact), vec![1.0; 4]);
    match result {
        Err(RecallError::DimensionMismatch { expected, actual }) => {
            assert_eq!(expected, DIM);
            assert_eq!(actual, 4);
        }
        other => panic!("expected DimensionMismatch, got {other:?}"),
    }
}

#[test]
fn test_remove_record_unlinks_everywhere() {
    let engine = setup_engine();
    let r = record("ephemeral Lisbon note", MemoryCategory::Fact);
    let id = r.id;
    engine.insert_record(r).unwrap();
    assert!(engine.remove_record(&id));
    assert!(!engine.remove_record(&id));

    let results = engine.retrieve(&QuerySpec::text("ephemeral Lisbon note")).unwrap();
    assert!(results.iter().all(|r| r.record.id != id));
}

// ============================================================================
// BATCH RETRIEVAL
// ============================================================================

#[tokio::test]
async fn test_batch_retrieval_preserves_query_order() {
    let engine = setup_engine();
    let lisbon = record("Lisbon harbor walk", MemoryCategory::Event);
    let lisbon_id = lisbon.id;
    let porto = record("Porto wine cellar tour", MemoryCategory::Event);
    let porto_id = porto.id;
    engine.insert_record(lisbon).unwrap();
    engine.insert_record(porto).unwrap();

    let mut bad = QuerySpec::default();
    bad.limit = 0;
    let results = engine
        .retrieve_batch(vec![
            QuerySpec::text("Lisbon harbor walk"),
            QuerySpec::text("Porto wine cellar tour"),
            bad,
        ])
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap()[0].record.id, lisbon_id);
    assert_eq!(results[1].as_ref().unwrap()[0].record.id, porto_id);
    assert!(results[2].is_err());
}
