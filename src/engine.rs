//! Retrieval orchestrator
//!
//! Owns the record store, the LSH index, the relationship graph, and the
//! caches, with the two external services injected at construction. One
//! primary operation, [`RecallEngine::retrieve`], runs the full pipeline:
//!
//! ```text
//! validate → vector candidates ─┐
//!            direct candidates ─┼→ graph expansion → score → fuse
//!                               │         → diversify → truncate → touch
//! ```
//!
//! External failures never void a query: the vector path degrades to
//! direct filtering, graph expansion degrades to the vector/direct set,
//! and the caller always gets whatever partial ranking could be built.

use chrono::Utc;
use dashmap::{DashMap, DashSet};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::RelationshipCaches;
use crate::config::EngineConfig;
use crate::constants::RECENCY_DECAY_DAYS;
use crate::errors::{RecallError, RecallResult};
use crate::fusion::{expand_entities, fuse, FusionInput};
use crate::graph::centrality::{centrality, normalized_degree, CentralityScores};
use crate::graph::community::{detect_communities, Community};
use crate::graph::paths::{
    all_paths, infer_potential_relationship, second_degree_relations, shortest_path, triangles,
    PotentialRelationship, SecondDegreeRelation,
};
use crate::graph::{GraphStats, RelationType, RelationshipEdge, RelationshipGraph};
use crate::scoring::{diversify_top_k, score_record};
use crate::services::{
    with_timeout_backoff, FailureTracker, GraphQueryService, ParamValue, VectorService,
};
use crate::types::{
    MemoryId, MemoryRecord, MetaValue, MetadataMap, Provenance, QuerySpec, RankedMemory,
    RetrievalStats, VectorEntry,
};
use crate::validation::validate_query;
use crate::vector_index::{LshIndex, MetadataFilter};

/// Declarative query for pulling the active edge set from the graph service
const ACTIVE_EDGES_QUERY: &str = "MATCH (a:Entity)-[r:RELATES]-(b:Entity) \
     WHERE r.valid_to IS NULL OR r.valid_to > $now \
     RETURN a.name AS entity_a, b.name AS entity_b, r.kind AS relation, \
            r.confidence AS confidence";

/// Declarative upsert for write-through edge persistence
const UPSERT_EDGE_QUERY: &str = "MERGE (a:Entity {name: $entity_a}) \
     MERGE (b:Entity {name: $entity_b}) \
     MERGE (a)-[r:RELATES {uuid: $uuid}]-(b) \
     SET r.kind = $relation, r.confidence = $confidence, r.valid_to = $valid_to";

/// Result of [`RecallEngine::infer_relationship`]
#[derive(Debug, Clone)]
pub enum RelationInference {
    /// A direct active edge already exists
    Existing(Vec<RelationshipEdge>),
    /// No direct edge; inferred from mutual neighbors
    Potential(PotentialRelationship),
}

/// The hybrid retrieval engine
///
/// All interior state is concurrency-safe; clones of the surrounding `Arc`
/// may issue queries and mutations from any thread. Mutations of the same
/// record or edge must be serialized by the caller.
pub struct RecallEngine {
    config: EngineConfig,
    records: DashMap<MemoryId, MemoryRecord>,
    index: LshIndex,
    graph: RelationshipGraph,
    caches: RelationshipCaches,
    vector_service: Arc<dyn VectorService>,
    graph_service: Arc<dyn GraphQueryService>,
    vector_health: FailureTracker,
    graph_health: FailureTracker,
    /// Dangling index ids awaiting external repair
    repair_queue: DashSet<MemoryId>,
}

impl RecallEngine {
    /// Construct an engine with injected external services
    pub fn new(
        config: EngineConfig,
        vector_service: Arc<dyn VectorService>,
        graph_service: Arc<dyn GraphQueryService>,
    ) -> RecallResult<Self> {
        config.validate()?;
        let index = match config.lsh_seed {
            Some(seed) => LshIndex::with_seed(
                config.vector_dim,
                config.lsh_tables,
                config.lsh_hash_bits,
                seed,
            ),
            None => LshIndex::new(config.vector_dim, config.lsh_tables, config.lsh_hash_bits),
        };
        info!(vector_dim = config.vector_dim, "recall engine initialized");
        Ok(Self {
            config,
            records: DashMap::new(),
            index,
            graph: RelationshipGraph::new(),
            caches: RelationshipCaches::new(),
            vector_service,
            graph_service,
            vector_health: FailureTracker::new("vector"),
            graph_health: FailureTracker::new("graph"),
            repair_queue: DashSet::new(),
        })
    }

    fn service_timeout(&self) -> Duration {
        Duration::from_millis(self.config.service_timeout_ms)
    }

    // =========================================================================
    // Record lifecycle
    // =========================================================================

    /// Store a record and index its content vector
    ///
    /// Embedding failures degrade: the record is still stored and reachable
    /// through direct filters, it just misses the vector path until
    /// reindexed.
    pub fn insert_record(&self, record: MemoryRecord) -> RecallResult<()> {
        let id = record.id;
        let content = record.content.clone();
        let metadata = record_metadata(&record);
        self.records.insert(id, record);

        if self.vector_health.should_skip() {
            warn!(%id, "vector service short-circuited, record stored without vector");
            return Ok(());
        }
        let embedder = Arc::clone(&self.vector_service);
        match with_timeout_backoff("embed", self.service_timeout(), move || {
            embedder.embed(&content)
        }) {
            Ok(vector) => {
                self.vector_health.record_success();
                let store = Arc::clone(&self.vector_service);
                let stored_vector = vector.clone();
                let stored_metadata = metadata.clone();
                if let Err(err) = with_timeout_backoff("persist", self.service_timeout(), move || {
                    store.persist(id, &stored_vector, &stored_metadata)
                }) {
                    warn!(%id, error = %err, "vector persist failed, keeping local index only");
                }
                self.index.insert(VectorEntry {
                    id,
                    vector,
                    metadata,
                });
            }
            Err(err) => {
                self.vector_health.record_failure();
                warn!(%id, error = %err, "embedding failed, record stored without vector");
            }
        }
        Ok(())
    }

    /// Store a record with a caller-supplied vector (no embedding call)
    pub fn insert_record_with_vector(
        &self,
        record: MemoryRecord,
        vector: Vec<f32>,
    ) -> RecallResult<()> {
        if vector.len() != self.config.vector_dim {
            return Err(RecallError::DimensionMismatch {
                expected: self.config.vector_dim,
                actual: vector.len(),
            });
        }
        let id = record.id;
        let metadata = record_metadata(&record);
        self.records.insert(id, record);
        self.index.insert(VectorEntry {
            id,
            vector,
            metadata,
        });
        Ok(())
    }

    /// Remove a record and every index trace of it
    pub fn remove_record(&self, id: &MemoryId) -> bool {
        self.index.remove(id);
        self.repair_queue.remove(id);
        self.records.remove(id).is_some()
    }

    pub fn get_record(&self, id: &MemoryId) -> Option<MemoryRecord> {
        self.records.get(id).map(|r| r.clone())
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Drain the ids queued for index repair
    ///
    /// Dangling index entries are detected during search, skipped, and
    /// collected here for an external janitor to reconcile.
    pub fn drain_repair_queue(&self) -> Vec<MemoryId> {
        let ids: Vec<MemoryId> = self.repair_queue.iter().map(|id| *id).collect();
        for id in &ids {
            self.repair_queue.remove(id);
        }
        ids
    }

    // =========================================================================
    // Relationship lifecycle
    // =========================================================================

    /// Add a relationship edge, write through to the graph service, and
    /// invalidate the affected caches
    pub fn add_relationship(&self, edge: RelationshipEdge) -> Uuid {
        let (a, b) = (edge.entity_a.clone(), edge.entity_b.clone());
        let uuid = self.graph.add_edge(edge.clone());
        self.caches.invalidate_pair(&a, &b);
        self.write_through_edge(&edge);
        uuid
    }

    /// Update confidence/description on an edge
    pub fn update_relationship(
        &self,
        uuid: &Uuid,
        confidence: Option<f32>,
        description: Option<String>,
    ) -> RecallResult<()> {
        let Some((a, b)) = self.graph.update_edge(uuid, confidence, description) else {
            return Err(RecallError::RecordNotFound(uuid.to_string()));
        };
        self.caches.invalidate_pair(&a, &b);
        if let Some(edge) = self.graph.get_edge(uuid) {
            self.write_through_edge(&edge);
        }
        Ok(())
    }

    /// Soft-delete an edge (history is preserved, reasoning stops seeing it)
    pub fn end_relationship(&self, uuid: &Uuid) -> RecallResult<()> {
        let Some((a, b)) = self.graph.invalidate_edge(uuid) else {
            return Err(RecallError::RecordNotFound(uuid.to_string()));
        };
        self.caches.invalidate_pair(&a, &b);
        if let Some(edge) = self.graph.get_edge(uuid) {
            self.write_through_edge(&edge);
        }
        Ok(())
    }

    /// Active edges between two entities, cached by canonical pair
    pub fn relationship_between(&self, a: &str, b: &str) -> Vec<RelationshipEdge> {
        let key = crate::graph::canonical_pair(a.to_string(), b.to_string());
        if let Some(cached) = self.caches.pair.get(&key) {
            return cached;
        }
        let edges = self.graph.find_between(a, b);
        self.caches.pair.put(key, edges.clone());
        edges
    }

    /// Active edges of one entity, cached per entity
    pub fn relationships_of(&self, entity: &str) -> Vec<RelationshipEdge> {
        if let Some(cached) = self.caches.entity.get(&entity.to_string()) {
            return cached;
        }
        let edges = self.graph.relationships_of(entity);
        self.caches.entity.put(entity.to_string(), edges.clone());
        edges
    }

    /// Pull the active edge set from the external graph service
    ///
    /// Degrades silently: when the service is down the in-memory graph
    /// keeps serving whatever it already holds.
    pub fn refresh_graph(&self) -> RecallResult<usize> {
        if self.graph_health.should_skip() {
            return Ok(0);
        }
        let params = vec![(
            "now".to_string(),
            ParamValue::Text(Utc::now().to_rfc3339()),
        )];
        let service = Arc::clone(&self.graph_service);
        let rows = match with_timeout_backoff("refresh_graph", self.service_timeout(), move || {
            service.execute(ACTIVE_EDGES_QUERY, &params)
        }) {
            Ok(rows) => {
                self.graph_health.record_success();
                rows
            }
            Err(err) => {
                self.graph_health.record_failure();
                warn!(error = %err, "graph refresh failed, keeping current snapshot");
                return Err(RecallError::GraphServiceUnavailable(err.to_string()));
            }
        };

        let mut imported = 0usize;
        for row in rows {
            let (Some(a), Some(b)) = (row.text("entity_a"), row.text("entity_b")) else {
                continue;
            };
            if !self.graph.find_between(a, b).is_empty() {
                continue;
            }
            let relation = row
                .text("relation")
                .map(|r| RelationType::Other(r.to_string()))
                .unwrap_or(RelationType::Acquaintance);
            let confidence = row.float("confidence").unwrap_or(0.5) as f32;
            let edge = RelationshipEdge::new(a, b, relation, confidence);
            let (ea, eb) = (edge.entity_a.clone(), edge.entity_b.clone());
            self.graph.add_edge(edge);
            self.caches.invalidate_pair(&ea, &eb);
            imported += 1;
        }
        debug!(imported, "graph refresh finished");
        Ok(imported)
    }

    /// Best-effort edge persistence; failure only affects durability, not
    /// the in-memory graph
    fn write_through_edge(&self, edge: &RelationshipEdge) {
        if self.graph_health.should_skip() {
            return;
        }
        let params = vec![
            ("entity_a".to_string(), ParamValue::Text(edge.entity_a.clone())),
            ("entity_b".to_string(), ParamValue::Text(edge.entity_b.clone())),
            ("uuid".to_string(), ParamValue::Text(edge.uuid.to_string())),
            (
                "relation".to_string(),
                ParamValue::Text(edge.relation_type.as_str().to_string()),
            ),
            (
                "confidence".to_string(),
                ParamValue::Float(edge.confidence as f64),
            ),
            (
                "valid_to".to_string(),
                match &edge.valid_to {
                    Some(until) => ParamValue::Text(until.to_rfc3339()),
                    None => ParamValue::Flag(false),
                },
            ),
        ];
        let service = Arc::clone(&self.graph_service);
        match with_timeout_backoff("persist_edge", self.service_timeout(), move || {
            service.execute(UPSERT_EDGE_QUERY, &params)
        }) {
            Ok(_) => self.graph_health.record_success(),
            Err(err) => {
                self.graph_health.record_failure();
                warn!(edge = %edge.uuid, error = %err, "edge write-through failed");
            }
        }
    }

    // =========================================================================
    // Retrieval
    // =========================================================================

    /// Run the full hybrid retrieval pipeline
    pub fn retrieve(&self, query: &QuerySpec) -> RecallResult<Vec<RankedMemory>> {
        self.retrieve_with_stats(query).map(|(ranked, _)| ranked)
    }

    /// Retrieval with observability counters
    pub fn retrieve_with_stats(
        &self,
        query: &QuerySpec,
    ) -> RecallResult<(Vec<RankedMemory>, RetrievalStats)> {
        validate_query(query)?;
        let started = Instant::now();
        let mut stats = RetrievalStats::default();
        let now = Utc::now();

        // Candidate gathering: vector path, then direct filters
        let mut provenance: HashMap<MemoryId, Provenance> = HashMap::new();

        if query.text.is_some() {
            self.gather_vector_candidates(query, &mut provenance, &mut stats);
        }
        self.gather_direct_candidates(query, &mut provenance, &mut stats);

        // Graph expansion from the entity set implied by the hits so far
        let snapshot = self.graph.snapshot();
        if self.graph_health.should_skip() {
            stats.degraded_graph_path = true;
        }
        let seeds = self.seed_entities(query, &provenance);
        if !seeds.is_empty() && self.config.expansion_hops > 0 {
            let expanded = expand_entities(&snapshot, &seeds, self.config.expansion_hops);
            self.gather_graph_candidates(&expanded, query, &mut provenance, &mut stats);
        }

        // Score every candidate, then fuse relevance with centrality and
        // recency. Cosine similarity already did its job selecting the
        // vector candidates; the relevance component is the scorer total.
        let mut scored: Vec<(MemoryRecord, crate::types::ScoreBreakdown, Provenance)> =
            Vec::with_capacity(provenance.len());
        for (id, source) in provenance {
            let Some(record) = self.records.get(&id).map(|r| r.clone()) else {
                continue;
            };
            let breakdown = score_record(&record, query, now);
            scored.push((record, breakdown, source));
        }

        let fused = fuse(
            scored
                .iter()
                .map(|(record, breakdown, source)| FusionInput {
                    id: record.id,
                    vector_score: breakdown.total,
                    centrality: record_centrality(&snapshot, record),
                    recency: (-record.days_since_access(now) / RECENCY_DECAY_DAYS).exp() as f32,
                    provenance: source.clone(),
                })
                .collect(),
        );

        let by_id: HashMap<MemoryId, (MemoryRecord, crate::types::ScoreBreakdown)> = scored
            .into_iter()
            .map(|(record, breakdown, _)| (record.id, (record, breakdown)))
            .collect();

        let mut ranked: Vec<RankedMemory> = fused
            .into_iter()
            .filter_map(|candidate| {
                let (record, score) = by_id.get(&candidate.id)?.clone();
                Some(RankedMemory {
                    record,
                    score,
                    final_score: candidate.score,
                    provenance: candidate.provenance,
                })
            })
            .collect();

        // Deterministic ordering: fused score, then most recent access
        ranked.sort_by(|a, b| {
            ordered_float::OrderedFloat(b.final_score)
                .cmp(&ordered_float::OrderedFloat(a.final_score))
                .then_with(|| b.record.last_accessed.cmp(&a.record.last_accessed))
                .then_with(|| a.record.id.cmp(&b.record.id))
        });

        // Diversify and truncate
        let results: Vec<RankedMemory> = if query.diversify && ranked.len() > query.limit {
            diversify_top_k(&ranked, query.limit, |r| r.record.category)
                .into_iter()
                .map(|i| ranked[i].clone())
                .collect()
        } else {
            ranked.truncate(query.limit);
            ranked
        };

        // Touch access telemetry on everything returned
        for result in &results {
            if let Some(mut record) = self.records.get_mut(&result.record.id) {
                record.touch();
            }
        }

        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(
            results = results.len(),
            vector = stats.vector_candidates,
            direct = stats.direct_candidates,
            graph = stats.graph_candidates,
            elapsed_ms = stats.elapsed_ms,
            "retrieval finished"
        );
        Ok((results, stats))
    }

    /// Dispatch independent queries concurrently on a bounded worker pool
    pub async fn retrieve_batch(
        self: &Arc<Self>,
        queries: Vec<QuerySpec>,
    ) -> Vec<RecallResult<Vec<RankedMemory>>> {
        let semaphore = Arc::new(Semaphore::new(self.config.batch_workers));
        let mut handles = Vec::with_capacity(queries.len());
        for query in queries {
            let engine = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::task::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                tokio::task::spawn_blocking(move || engine.retrieve(&query))
                    .await
                    .unwrap_or_else(|err| {
                        Err(RecallError::Internal(anyhow::anyhow!(
                            "batch worker panicked: {err}"
                        )))
                    })
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.unwrap_or_else(|err| {
                Err(RecallError::Internal(anyhow::anyhow!(
                    "batch task cancelled: {err}"
                )))
            }));
        }
        results
    }

    fn gather_vector_candidates(
        &self,
        query: &QuerySpec,
        provenance: &mut HashMap<MemoryId, Provenance>,
        stats: &mut RetrievalStats,
    ) {
        let text = query.text.as_deref().unwrap_or_default();
        let filter = category_filter(query);

        if self.vector_health.should_skip() {
            stats.degraded_vector_path = true;
            return;
        }
        let embedder = Arc::clone(&self.vector_service);
        let query_text = text.to_string();
        let embedding = match with_timeout_backoff("embed_query", self.service_timeout(), move || {
            embedder.embed(&query_text)
        }) {
            Ok(embedding) => {
                self.vector_health.record_success();
                embedding
            }
            Err(err) => {
                self.vector_health.record_failure();
                stats.degraded_vector_path = true;
                debug!(error = %err, "query embedding failed, degrading to direct filters");
                return;
            }
        };

        // Over-fetch so scoring and diversification have room to reorder
        let k = (query.limit * 3).max(query.limit);
        let outcome = self.index.search(&embedding, k, filter.as_ref());
        let mut hits = outcome.hits;

        if outcome.undershot {
            // Degraded path: full scan through the authoritative store
            stats.degraded_vector_path = true;
            debug!(k, "LSH undershot, falling back to external full scan");
            let scanner = Arc::clone(&self.vector_service);
            let scan_vector = embedding.clone();
            let scan_filter = filter.clone();
            match with_timeout_backoff("vector_scan", self.service_timeout(), move || {
                scanner.query(&scan_vector, k, scan_filter.as_ref())
            }) {
                Ok(scan) => {
                    self.vector_health.record_success();
                    for hit in scan {
                        if !hits.iter().any(|(id, _)| *id == hit.0) {
                            hits.push(hit);
                        }
                    }
                }
                Err(err) => {
                    self.vector_health.record_failure();
                    debug!(error = %err, "full-scan fallback failed, keeping partial hits");
                }
            }
        }

        for (id, _similarity) in hits {
            let Some(record) = self.records.get(&id) else {
                // Dangling index entry: skip and schedule repair
                warn!(%id, "vector index references a missing record");
                self.repair_queue.insert(id);
                stats.stale_skipped += 1;
                continue;
            };
            if record.importance < query.min_importance
                || record.confidence < query.min_confidence
            {
                continue;
            }
            if let Some(categories) = &query.categories {
                if !categories.contains(&record.category) {
                    continue;
                }
            }
            drop(record);
            stats.vector_candidates += 1;
            provenance.entry(id).or_insert(Provenance::Vector);
        }
    }

    fn gather_direct_candidates(
        &self,
        query: &QuerySpec,
        provenance: &mut HashMap<MemoryId, Provenance>,
        stats: &mut RetrievalStats,
    ) {
        let now = Utc::now();
        for entry in self.records.iter() {
            let record = entry.value();
            if record.importance < query.min_importance
                || record.confidence < query.min_confidence
            {
                continue;
            }
            if let Some(categories) = &query.categories {
                if !categories.contains(&record.category) {
                    continue;
                }
            }
            if let Some(temporal) = &query.temporal {
                if !temporal.matches(record.created_at, now) {
                    continue;
                }
            }
            if let Some(entities) = &query.entities {
                let content = record.content.to_lowercase();
                let hit = entities.iter().any(|e| {
                    record.entities.contains(e) || content.contains(&e.to_lowercase())
                });
                if !hit {
                    continue;
                }
            }
            if let Some(emotion) = &query.emotion {
                if !emotion.matches(record) {
                    continue;
                }
            }
            // A record must match at least one structured predicate to be a
            // direct candidate; an unfiltered text query relies on the
            // vector path alone
            if query.categories.is_none()
                && query.temporal.is_none()
                && query.entities.is_none()
                && query.emotion.is_none()
                && query.text.is_some()
            {
                continue;
            }
            if !provenance.contains_key(&record.id) {
                provenance.insert(record.id, Provenance::Direct);
                stats.direct_candidates += 1;
            }
        }
    }

    fn gather_graph_candidates(
        &self,
        expanded: &BTreeMap<String, usize>,
        query: &QuerySpec,
        provenance: &mut HashMap<MemoryId, Provenance>,
        stats: &mut RetrievalStats,
    ) {
        if expanded.is_empty() {
            return;
        }
        for entry in self.records.iter() {
            let record = entry.value();
            if provenance.contains_key(&record.id) {
                continue;
            }
            if record.importance < query.min_importance
                || record.confidence < query.min_confidence
            {
                continue;
            }
            if let Some(categories) = &query.categories {
                if !categories.contains(&record.category) {
                    continue;
                }
            }
            let hop = record
                .entities
                .iter()
                .filter_map(|e| expanded.get(e))
                .min()
                .copied();
            if let Some(hop) = hop {
                provenance.insert(record.id, Provenance::GraphHop(hop));
                stats.graph_candidates += 1;
            }
        }
    }

    /// Entities seeding graph expansion: query entities plus the entity
    /// sets of every candidate gathered so far
    fn seed_entities(
        &self,
        query: &QuerySpec,
        provenance: &HashMap<MemoryId, Provenance>,
    ) -> Vec<String> {
        let mut seeds: BTreeSet<String> = query
            .entities
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect();
        for id in provenance.keys() {
            if let Some(record) = self.records.get(id) {
                seeds.extend(record.entities.iter().cloned());
            }
        }
        seeds.into_iter().collect()
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Detect communities in the active relationship graph
    pub fn find_communities(&self) -> Vec<Community> {
        detect_communities(&self.graph.snapshot())
    }

    /// Shortest path between two entities, cached by endpoints + hop bound
    pub fn find_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let key = (
            from.to_string(),
            to.to_string(),
            self.config.max_path_hops,
        );
        if let Some(cached) = self.caches.path.get(&key) {
            return cached;
        }
        let path = shortest_path(&self.graph.snapshot(), from, to, self.config.max_path_hops);
        self.caches.path.put(key, path.clone());
        path
    }

    /// All simple paths between two entities, shortest first
    pub fn find_all_paths(&self, from: &str, to: &str) -> Vec<Vec<String>> {
        all_paths(&self.graph.snapshot(), from, to, self.config.max_path_hops)
    }

    /// Direct edges if any exist, otherwise the mutual-neighbor inference
    pub fn infer_relationship(&self, a: &str, b: &str) -> RelationInference {
        let direct = self.relationship_between(a, b);
        if !direct.is_empty() {
            return RelationInference::Existing(direct);
        }
        RelationInference::Potential(infer_potential_relationship(
            &self.graph.snapshot(),
            a,
            b,
        ))
    }

    /// Second-degree relations from a start entity
    pub fn second_degree(
        &self,
        start: &str,
        relation_filter: Option<&RelationType>,
    ) -> Vec<SecondDegreeRelation> {
        second_degree_relations(&self.graph.snapshot(), start, relation_filter)
    }

    /// Degree + approximate betweenness centrality over the active graph
    pub fn centrality_scores(&self) -> CentralityScores {
        centrality(&self.graph.snapshot())
    }

    /// 3-cycles where all edges share one relation type
    pub fn find_triangles(&self, relation: &RelationType) -> Vec<[String; 3]> {
        triangles(&self.graph.snapshot(), relation)
    }

    /// Entities with no active edges
    pub fn isolated_entities(&self) -> Vec<String> {
        self.graph.isolated_entities()
    }

    /// Diagnostic counters for the relationship graph
    pub fn graph_stats(&self) -> GraphStats {
        self.graph.stats()
    }

    /// Register an entity before it has any edges
    pub fn register_entity(&self, name: &str) {
        self.graph.register_entity(name);
    }
}

/// Index metadata derived from a record (used for pre-filtering)
fn record_metadata(record: &MemoryRecord) -> MetadataMap {
    let mut metadata = MetadataMap::new();
    metadata.insert(
        "category".to_string(),
        MetaValue::Text(record.category.as_str().to_string()),
    );
    metadata
}

/// Metadata pre-filter when the query restricts to exactly one category
fn category_filter(query: &QuerySpec) -> Option<MetadataFilter> {
    let categories = query.categories.as_ref()?;
    if categories.len() != 1 {
        return None;
    }
    let category = categories.iter().next()?;
    Some(MetadataFilter::equals(
        "category",
        MetaValue::Text(category.as_str().to_string()),
    ))
}

/// Best normalized degree across the record's entities
fn record_centrality(
    snapshot: &crate::graph::GraphSnapshot,
    record: &MemoryRecord,
) -> f32 {
    record
        .entities
        .iter()
        .map(|e| normalized_degree(snapshot, e))
        .fold(0.0, f32::max)
}
