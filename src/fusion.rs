//! Hybrid rank fusion
//!
//! Merges the vector-search candidate set with the graph-expanded candidate
//! set into a single ranking. Entities implied by vector hits are expanded
//! N hops through the active subgraph; every candidate then gets a fused
//! score from its vector similarity, graph centrality, and recency
//! components. A candidate reached by both routes keeps the maximum of each
//! component (never a double-add) and is emitted once.

use ordered_float::OrderedFloat;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::debug;

use crate::constants::{FUSION_WEIGHT_CENTRALITY, FUSION_WEIGHT_RECENCY, FUSION_WEIGHT_VECTOR};
use crate::graph::GraphSnapshot;
use crate::types::{MemoryId, Provenance};

/// One candidate entering fusion, with its component scores
#[derive(Debug, Clone)]
pub struct FusionInput {
    pub id: MemoryId,
    /// Cosine similarity from the vector path (0.0 when graph-only)
    pub vector_score: f32,
    /// Normalized degree centrality of the candidate's strongest entity
    pub centrality: f32,
    /// Recency decay of the candidate record
    pub recency: f32,
    pub provenance: Provenance,
}

/// A fused candidate with its final combined score
#[derive(Debug, Clone)]
pub struct FusedCandidate {
    pub id: MemoryId,
    pub vector_score: f32,
    pub centrality: f32,
    pub recency: f32,
    pub score: f32,
    pub provenance: Provenance,
}

/// Weighted fusion: 0.6·vector + 0.2·centrality + 0.2·recency
#[inline]
pub fn fusion_score(vector_score: f32, centrality: f32, recency: f32) -> f32 {
    FUSION_WEIGHT_VECTOR * vector_score
        + FUSION_WEIGHT_CENTRALITY * centrality
        + FUSION_WEIGHT_RECENCY * recency
}

/// Sum of the fusion weights; must be exactly 1.0
pub fn fusion_weight_sum() -> f32 {
    FUSION_WEIGHT_VECTOR + FUSION_WEIGHT_CENTRALITY + FUSION_WEIGHT_RECENCY
}

/// Expand seed entities N hops through the active subgraph
///
/// Returns every newly discovered entity with its hop distance (1..=hops).
/// Seeds themselves are not included.
pub fn expand_entities(
    snapshot: &GraphSnapshot,
    seeds: &[String],
    hops: usize,
) -> BTreeMap<String, usize> {
    let mut distance: HashMap<&str, usize> = seeds.iter().map(|s| (s.as_str(), 0)).collect();
    let mut frontier: VecDeque<&str> = seeds.iter().map(String::as_str).collect();
    let mut discovered: BTreeMap<String, usize> = BTreeMap::new();

    while let Some(node) = frontier.pop_front() {
        let depth = distance[node];
        if depth >= hops {
            continue;
        }
        for (neighbor, _, _) in snapshot.neighbors(node) {
            if distance.contains_key(neighbor.as_str()) {
                continue;
            }
            distance.insert(neighbor.as_str(), depth + 1);
            discovered.insert(neighbor.clone(), depth + 1);
            frontier.push_back(neighbor.as_str());
        }
    }
    debug!(
        seeds = seeds.len(),
        hops,
        discovered = discovered.len(),
        "graph expansion finished"
    );
    discovered
}

/// Merge candidates from both sources and rank by fused score
///
/// Deduplication is by candidate id; a duplicate keeps the per-component
/// maximum and its vector provenance (or the smaller hop distance when both
/// sides came from the graph).
pub fn fuse(candidates: Vec<FusionInput>) -> Vec<FusedCandidate> {
    let mut merged: HashMap<MemoryId, FusionInput> = HashMap::new();
    for candidate in candidates {
        match merged.get_mut(&candidate.id) {
            None => {
                merged.insert(candidate.id, candidate);
            }
            Some(existing) => {
                existing.vector_score = existing.vector_score.max(candidate.vector_score);
                existing.centrality = existing.centrality.max(candidate.centrality);
                existing.recency = existing.recency.max(candidate.recency);
                existing.provenance =
                    merge_provenance(existing.provenance.clone(), candidate.provenance);
            }
        }
    }

    let mut fused: Vec<FusedCandidate> = merged
        .into_values()
        .map(|c| FusedCandidate {
            score: fusion_score(c.vector_score, c.centrality, c.recency),
            id: c.id,
            vector_score: c.vector_score,
            centrality: c.centrality,
            recency: c.recency,
            provenance: c.provenance,
        })
        .collect();

    fused.sort_by(|a, b| {
        OrderedFloat(b.score)
            .cmp(&OrderedFloat(a.score))
            .then_with(|| a.id.cmp(&b.id))
    });
    fused
}

/// Keep the more authoritative provenance when a candidate arrives twice
fn merge_provenance(a: Provenance, b: Provenance) -> Provenance {
    match (a, b) {
        (Provenance::Vector, _) | (_, Provenance::Vector) => Provenance::Vector,
        (Provenance::Direct, _) | (_, Provenance::Direct) => Provenance::Direct,
        (Provenance::GraphHop(x), Provenance::GraphHop(y)) => Provenance::GraphHop(x.min(y)),
    }
}
