//! Retrieval pipeline benchmarks
//!
//! Measures the hot paths against an in-memory vector double:
//! - LSH index search at increasing corpus sizes
//! - Full retrieval (vector + direct + graph expansion + fusion)
//! - Community detection and path finding on a clustered graph

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::Result;
use smriti::engine::RecallEngine;
use smriti::graph::{RelationType, RelationshipEdge};
use smriti::parking_lot::Mutex;
use smriti::services::{GraphQueryService, GraphRow, ParamValue, VectorService};
use smriti::similarity::cosine_similarity;
use smriti::types::{MemoryCategory, MemoryId, MemoryRecord, MetadataMap, QuerySpec, VectorEntry};
use smriti::vector_index::{LshIndex, MetadataFilter};
use smriti::EngineConfig;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

const DIM: usize = 64;

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

struct TokenHashVectors {
    store: Mutex<HashMap<MemoryId, Vec<f32>>>,
}

impl VectorService for TokenHashVectors {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(token_embedding(text))
    }

    fn persist(&self, id: MemoryId, vector: &[f32], _metadata: &MetadataMap) -> Result<()> {
        self.store.lock().insert(id, vector.to_vec());
        Ok(())
    }

    fn query(
        &self,
        vector: &[f32],
        k: usize,
        _filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(MemoryId, f32)>> {
        let store = self.store.lock();
        let mut hits: Vec<(MemoryId, f32)> = store
            .iter()
            .map(|(id, stored)| (*id, cosine_similarity(vector, stored)))
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));
        hits.truncate(k);
        Ok(hits)
    }
}

struct QuietGraph;

impl GraphQueryService for QuietGraph {
    fn execute(&self, _query: &str, _params: &[(String, ParamValue)]) -> Result<Vec<GraphRow>> {
        Ok(Vec::new())
    }
}

fn setup_engine(records: usize) -> Arc<RecallEngine> {
    let config = EngineConfig {
        vector_dim: DIM,
        lsh_seed: Some(42),
        ..EngineConfig::default()
    };
    let engine = Arc::new(
        RecallEngine::new(
            config,
            Arc::new(TokenHashVectors {
                store: Mutex::new(HashMap::new()),
            }),
            Arc::new(QuietGraph),
        )
        .expect("engine construction"),
    );

    let categories = [
        MemoryCategory::Fact,
        MemoryCategory::Event,
        MemoryCategory::Task,
        MemoryCategory::Conversation,
    ];
    for i in 0..records {
        let mut record = MemoryRecord::new(
            format!("memory about topic {} in city {}", i % 37, i % 11),
            categories[i % categories.len()],
        );
        record.importance = 0.2 + (i % 8) as f32 * 0.1;
        record
            .entities
            .insert(format!("person{}", i % 25));
        engine.insert_record(record).expect("insert");
    }
    engine
}

fn clustered_graph_engine() -> Arc<RecallEngine> {
    let engine = setup_engine(0);
    // Ten clusters of ten, chained by weak bridges
    for cluster in 0..10 {
        for i in 0..10 {
            for j in (i + 1)..10 {
                engine.add_relationship(RelationshipEdge::new(
                    format!("c{cluster}n{i}"),
                    format!("c{cluster}n{j}"),
                    RelationType::Friend,
                    0.9,
                ));
            }
        }
        if cluster > 0 {
            engine.add_relationship(RelationshipEdge::new(
                format!("c{}n0", cluster - 1),
                format!("c{cluster}n0"),
                RelationType::Acquaintance,
                0.1,
            ));
        }
    }
    engine
}

// ============================================================================
// BENCHMARKS
// ============================================================================

fn bench_lsh_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("lsh_search");
    for size in [1_000usize, 10_000] {
        let index = LshIndex::with_seed(DIM, 8, 12, 42);
        for i in 0..size {
            index.insert(VectorEntry {
                id: MemoryId::new(),
                vector: token_embedding(&format!("topic {} city {}", i % 37, i % 11)),
                metadata: MetadataMap::new(),
            });
        }
        let query = token_embedding("topic 5 city 3");
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| index.search(&query, 10, None));
        });
    }
    group.finish();
}

fn bench_retrieve(c: &mut Criterion) {
    let engine = setup_engine(2_000);
    engine.add_relationship(RelationshipEdge::new(
        "person1",
        "person2",
        RelationType::Friend,
        0.9,
    ));

    c.bench_function("retrieve_text", |b| {
        let query = QuerySpec::text("topic 5 city 3");
        b.iter(|| engine.retrieve(&query).expect("retrieve"));
    });

    c.bench_function("retrieve_entity_with_expansion", |b| {
        let query = QuerySpec::entities(vec!["person1".to_string()]);
        b.iter(|| engine.retrieve(&query).expect("retrieve"));
    });
}

fn bench_graph_reasoning(c: &mut Criterion) {
    let engine = clustered_graph_engine();

    c.bench_function("community_detection_100_nodes", |b| {
        b.iter(|| engine.find_communities());
    });

    c.bench_function("shortest_path_across_clusters", |b| {
        b.iter(|| engine.find_all_paths("c0n0", "c3n0"));
    });
}

criterion_group!(benches, bench_lsh_search, bench_retrieve, bench_graph_reasoning);
criterion_main!(benches);
