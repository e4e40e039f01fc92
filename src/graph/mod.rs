//! Relationship graph over entities
//!
//! Stores relationship edges between named entities with bi-temporal
//! validity: edges are soft-deleted by setting `valid_to`, never removed,
//! so history is preserved while reasoning only ever sees the *active*
//! subgraph. Entity pairs are canonicalized (lexicographic order) so an
//! unordered relationship has exactly one storage key.
//!
//! Structural algorithms (community detection, centrality, paths) operate
//! on an immutable [`GraphSnapshot`] taken from the active edges, which
//! keeps them deterministic under concurrent writes.

pub mod centrality;
pub mod community;
pub mod paths;

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

/// Relationship types between entities
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationType {
    Friend,
    Family,
    Partner,
    Colleague,
    Acquaintance,
    Mentor,
    Neighbor,
    Other(String),
}

impl RelationType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Friend => "Friend",
            Self::Family => "Family",
            Self::Partner => "Partner",
            Self::Colleague => "Colleague",
            Self::Acquaintance => "Acquaintance",
            Self::Mentor => "Mentor",
            Self::Neighbor => "Neighbor",
            Self::Other(s) => s.as_str(),
        }
    }
}

/// Relationship edge between two entities
///
/// The pair is stored canonically: `entity_a <= entity_b` lexicographically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipEdge {
    /// Unique identifier for this edge
    pub uuid: Uuid,

    /// First entity of the canonical pair
    pub entity_a: String,

    /// Second entity of the canonical pair
    pub entity_b: String,

    /// Type of relationship
    pub relation_type: RelationType,

    /// Confidence/strength of this relationship (0.0 to 1.0)
    pub confidence: f32,

    /// Free-text context about the relationship
    pub description: String,

    /// Where this edge came from (ingestion source tag)
    pub provenance: String,

    /// When this relationship became valid
    pub valid_from: DateTime<Utc>,

    /// Soft-delete marker; None or a future timestamp means active
    pub valid_to: Option<DateTime<Utc>>,
}

impl RelationshipEdge {
    /// Create an active edge between two entities, canonicalizing the pair
    pub fn new(
        a: impl Into<String>,
        b: impl Into<String>,
        relation_type: RelationType,
        confidence: f32,
    ) -> Self {
        let (entity_a, entity_b) = canonical_pair(a.into(), b.into());
        Self {
            uuid: Uuid::new_v4(),
            entity_a,
            entity_b,
            relation_type,
            confidence: confidence.clamp(0.0, 1.0),
            description: String::new(),
            provenance: String::new(),
            valid_from: Utc::now(),
            valid_to: None,
        }
    }

    /// An edge is active iff `valid_to` is unset or in the future
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.valid_to {
            None => true,
            Some(until) => until > now,
        }
    }

    /// The entity on the other side of the edge, if `name` is on it
    pub fn other(&self, name: &str) -> Option<&str> {
        if self.entity_a == name {
            Some(&self.entity_b)
        } else if self.entity_b == name {
            Some(&self.entity_a)
        } else {
            None
        }
    }
}

/// Canonical (lexicographic) ordering of an unordered entity pair
pub fn canonical_pair(a: String, b: String) -> (String, String) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Aggregate counters for diagnostics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub entities: usize,
    pub total_edges: usize,
    pub active_edges: usize,
    /// Active edges per entity (0.0 for an empty graph)
    pub density: f32,
}

/// Immutable view of the active subgraph at a point in time
///
/// Adjacency lists are sorted so every algorithm consuming a snapshot is
/// deterministic.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    /// Every known entity, including isolated ones
    pub nodes: BTreeSet<String>,
    /// Active edges at snapshot time
    pub edges: Vec<RelationshipEdge>,
    /// node → sorted (neighbor, edge confidence, relation type)
    pub adjacency: BTreeMap<String, Vec<(String, f32, RelationType)>>,
}

impl GraphSnapshot {
    /// Neighbors of a node (empty slice for unknown nodes)
    pub fn neighbors(&self, node: &str) -> &[(String, f32, RelationType)] {
        self.adjacency.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct neighbor name set
    pub fn neighbor_set(&self, node: &str) -> HashSet<&str> {
        self.neighbors(node)
            .iter()
            .map(|(n, _, _)| n.as_str())
            .collect()
    }

    /// Sum of all edge confidences (total weight `m` in modularity terms)
    pub fn total_weight(&self) -> f64 {
        self.edges.iter().map(|e| e.confidence as f64).sum()
    }
}

/// Thread-safe relationship graph
///
/// Reads and writes to different edges may proceed concurrently; mutations
/// of the same edge must be serialized by the caller.
pub struct RelationshipGraph {
    /// All edges, active and soft-deleted
    edges: DashMap<Uuid, RelationshipEdge>,
    /// Entity name → edge ids touching it
    entity_index: DashMap<String, HashSet<Uuid>>,
    /// Known entities, including those with no edges yet
    entities: DashSet<String>,
}

impl Default for RelationshipGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self {
            edges: DashMap::new(),
            entity_index: DashMap::new(),
            entities: DashSet::new(),
        }
    }

    /// Register an entity that may not have edges yet
    ///
    /// Needed for isolated-node detection; adding an edge registers both
    /// endpoints automatically.
    pub fn register_entity(&self, name: impl Into<String>) {
        self.entities.insert(name.into());
    }

    /// Add an edge, returning its id
    pub fn add_edge(&self, edge: RelationshipEdge) -> Uuid {
        let uuid = edge.uuid;
        self.entities.insert(edge.entity_a.clone());
        self.entities.insert(edge.entity_b.clone());
        self.entity_index
            .entry(edge.entity_a.clone())
            .or_default()
            .insert(uuid);
        self.entity_index
            .entry(edge.entity_b.clone())
            .or_default()
            .insert(uuid);
        debug!(
            edge = %uuid,
            a = %edge.entity_a,
            b = %edge.entity_b,
            relation = edge.relation_type.as_str(),
            "added relationship edge"
        );
        self.edges.insert(uuid, edge);
        uuid
    }

    /// Fetch an edge by id
    pub fn get_edge(&self, uuid: &Uuid) -> Option<RelationshipEdge> {
        self.edges.get(uuid).map(|e| e.clone())
    }

    /// Update confidence/description of an existing edge
    ///
    /// Returns the canonical entity pair for cache invalidation, or None if
    /// the edge does not exist.
    pub fn update_edge(
        &self,
        uuid: &Uuid,
        confidence: Option<f32>,
        description: Option<String>,
    ) -> Option<(String, String)> {
        let mut edge = self.edges.get_mut(uuid)?;
        if let Some(confidence) = confidence {
            edge.confidence = confidence.clamp(0.0, 1.0);
        }
        if let Some(description) = description {
            edge.description = description;
        }
        Some((edge.entity_a.clone(), edge.entity_b.clone()))
    }

    /// Soft-delete an edge by setting `valid_to` to now
    ///
    /// The edge stays in storage for history; it simply stops being active.
    /// Returns the canonical entity pair for cache invalidation.
    pub fn invalidate_edge(&self, uuid: &Uuid) -> Option<(String, String)> {
        let mut edge = self.edges.get_mut(uuid)?;
        edge.valid_to = Some(Utc::now());
        debug!(edge = %uuid, "invalidated relationship edge");
        Some((edge.entity_a.clone(), edge.entity_b.clone()))
    }

    /// Active edges between two entities (order-insensitive)
    pub fn find_between(&self, a: &str, b: &str) -> Vec<RelationshipEdge> {
        let (a, b) = canonical_pair(a.to_string(), b.to_string());
        let now = Utc::now();
        let Some(ids) = self.entity_index.get(&a) else {
            return Vec::new();
        };
        let mut found: Vec<RelationshipEdge> = ids
            .iter()
            .filter_map(|id| self.edges.get(id))
            .filter(|e| e.entity_a == a && e.entity_b == b && e.is_active(now))
            .map(|e| e.clone())
            .collect();
        found.sort_by(|x, y| x.uuid.cmp(&y.uuid));
        found
    }

    /// Active edges touching an entity
    pub fn relationships_of(&self, entity: &str) -> Vec<RelationshipEdge> {
        let now = Utc::now();
        let Some(ids) = self.entity_index.get(entity) else {
            return Vec::new();
        };
        let mut found: Vec<RelationshipEdge> = ids
            .iter()
            .filter_map(|id| self.edges.get(id))
            .filter(|e| e.is_active(now))
            .map(|e| e.clone())
            .collect();
        found.sort_by(|x, y| x.uuid.cmp(&y.uuid));
        found
    }

    /// Take an immutable snapshot of the active subgraph
    pub fn snapshot(&self) -> GraphSnapshot {
        let now = Utc::now();
        let mut nodes: BTreeSet<String> =
            self.entities.iter().map(|e| e.key().clone()).collect();
        let mut edges: Vec<RelationshipEdge> = self
            .edges
            .iter()
            .filter(|e| e.is_active(now))
            .map(|e| e.clone())
            .collect();
        edges.sort_by(|a, b| a.uuid.cmp(&b.uuid));

        let mut adjacency: BTreeMap<String, Vec<(String, f32, RelationType)>> = BTreeMap::new();
        for edge in &edges {
            nodes.insert(edge.entity_a.clone());
            nodes.insert(edge.entity_b.clone());
            adjacency.entry(edge.entity_a.clone()).or_default().push((
                edge.entity_b.clone(),
                edge.confidence,
                edge.relation_type.clone(),
            ));
            adjacency.entry(edge.entity_b.clone()).or_default().push((
                edge.entity_a.clone(),
                edge.confidence,
                edge.relation_type.clone(),
            ));
        }
        for neighbors in adjacency.values_mut() {
            neighbors.sort_by(|a, b| a.0.cmp(&b.0));
        }

        GraphSnapshot {
            nodes,
            edges,
            adjacency,
        }
    }

    /// Diagnostic counters over the whole graph
    pub fn stats(&self) -> GraphStats {
        let now = Utc::now();
        let total_edges = self.edges.len();
        let active_edges = self.edges.iter().filter(|e| e.is_active(now)).count();
        let entities = self.entities.len();
        let density = if entities == 0 {
            0.0
        } else {
            active_edges as f32 / entities as f32
        };
        GraphStats {
            entities,
            total_edges,
            active_edges,
            density,
        }
    }

    /// Entities with no active edges
    pub fn isolated_entities(&self) -> Vec<String> {
        let snapshot = self.snapshot();
        let mut isolated: Vec<String> = snapshot
            .nodes
            .iter()
            .filter(|n| snapshot.neighbors(n).is_empty())
            .cloned()
            .collect();
        isolated.sort();
        isolated
    }

    /// Mutual-neighbor map used by relationship inference
    pub fn mutual_neighbors(&self, a: &str, b: &str) -> Vec<String> {
        let snapshot = self.snapshot();
        let na = snapshot.neighbor_set(a);
        let nb = snapshot.neighbor_set(b);
        let mut mutual: Vec<String> = na.intersection(&nb).map(|s| s.to_string()).collect();
        mutual.sort();
        mutual
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_canonical_pair_ordering() {
        let edge = RelationshipEdge::new("zoe", "adam", RelationType::Friend, 0.8);
        assert_eq!(edge.entity_a, "adam");
        assert_eq!(edge.entity_b, "zoe");
    }

    #[test]
    fn test_find_between_is_order_insensitive() {
        let graph = RelationshipGraph::new();
        graph.add_edge(RelationshipEdge::new("ana", "ben", RelationType::Colleague, 0.6));
        assert_eq!(graph.find_between("ben", "ana").len(), 1);
        assert_eq!(graph.find_between("ana", "ben").len(), 1);
    }

    #[test]
    fn test_soft_delete_excludes_from_active_queries() {
        let graph = RelationshipGraph::new();
        let uuid = graph.add_edge(RelationshipEdge::new("ana", "ben", RelationType::Friend, 0.9));
        assert_eq!(graph.relationships_of("ana").len(), 1);

        graph.invalidate_edge(&uuid);
        assert!(graph.find_between("ana", "ben").is_empty());
        assert!(graph.relationships_of("ana").is_empty());
        // History is preserved
        assert!(graph.get_edge(&uuid).is_some());
        assert_eq!(graph.stats().total_edges, 1);
        assert_eq!(graph.stats().active_edges, 0);
    }

    #[test]
    fn test_past_valid_to_is_inactive() {
        let mut edge = RelationshipEdge::new("ana", "ben", RelationType::Friend, 0.9);
        edge.valid_to = Some(Utc::now() - Duration::days(1));
        let graph = RelationshipGraph::new();
        graph.add_edge(edge);
        assert!(graph.snapshot().edges.is_empty());
    }

    #[test]
    fn test_future_valid_to_is_still_active() {
        let mut edge = RelationshipEdge::new("ana", "ben", RelationType::Friend, 0.9);
        edge.valid_to = Some(Utc::now() + Duration::days(30));
        let graph = RelationshipGraph::new();
        graph.add_edge(edge);
        assert_eq!(graph.snapshot().edges.len(), 1);
    }

    #[test]
    fn test_isolated_entities() {
        let graph = RelationshipGraph::new();
        graph.register_entity("loner");
        graph.add_edge(RelationshipEdge::new("ana", "ben", RelationType::Friend, 0.5));
        assert_eq!(graph.isolated_entities(), vec!["loner".to_string()]);
    }

    #[test]
    fn test_mutual_neighbors() {
        let graph = RelationshipGraph::new();
        graph.add_edge(RelationshipEdge::new("ana", "carol", RelationType::Friend, 0.5));
        graph.add_edge(RelationshipEdge::new("ben", "carol", RelationType::Friend, 0.5));
        graph.add_edge(RelationshipEdge::new("ana", "dave", RelationType::Friend, 0.5));
        assert_eq!(graph.mutual_neighbors("ana", "ben"), vec!["carol".to_string()]);
    }
}
