//! Path finding and relation inference over the active subgraph

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use super::{GraphSnapshot, RelationType};
use crate::constants::{
    MAX_PATHS_ENUMERATED, MUTUAL_CONFIDENCE_HIGH, MUTUAL_CONFIDENCE_LOW,
    MUTUAL_CONFIDENCE_MEDIUM, MUTUAL_CONFIDENCE_NONE,
};

/// A second-degree relation: start —r1→ middle —r2→ end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondDegreeRelation {
    pub middle: String,
    pub end: String,
    pub first_relation: RelationType,
    pub second_relation: RelationType,
    /// strength(r1) × strength(r2)
    pub strength: f32,
}

/// Inference result for two entities with no direct edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PotentialRelationship {
    pub mutual_neighbors: Vec<String>,
    /// 0.9 for ≥5 mutual neighbors, 0.7 for ≥3, 0.5 for ≥1, else 0.2
    pub confidence: f32,
}

/// Shortest path between two entities via BFS, bounded by `max_hops`
///
/// Returns the node sequence including both endpoints, or None when no path
/// exists within the bound. Neighbor order is sorted, so the returned path
/// is deterministic.
pub fn shortest_path(
    snapshot: &GraphSnapshot,
    from: &str,
    to: &str,
    max_hops: usize,
) -> Option<Vec<String>> {
    if from == to {
        return Some(vec![from.to_string()]);
    }
    if !snapshot.nodes.contains(from) || !snapshot.nodes.contains(to) {
        return None;
    }

    let mut predecessor: HashMap<&str, &str> = HashMap::new();
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(from);
    let mut frontier: VecDeque<(&str, usize)> = VecDeque::new();
    frontier.push_back((from, 0));

    while let Some((node, depth)) = frontier.pop_front() {
        if depth >= max_hops {
            continue;
        }
        for (neighbor, _, _) in snapshot.neighbors(node) {
            if !visited.insert(neighbor.as_str()) {
                continue;
            }
            predecessor.insert(neighbor.as_str(), node);
            if neighbor == to {
                let mut path = vec![to.to_string()];
                let mut current = to;
                while let Some(&prev) = predecessor.get(current) {
                    path.push(prev.to_string());
                    current = prev;
                }
                path.reverse();
                return Some(path);
            }
            frontier.push_back((neighbor.as_str(), depth + 1));
        }
    }
    None
}

/// Enumerate simple paths between two entities, shortest first
///
/// Bounded by `max_hops` per path and capped at a fixed enumeration limit.
pub fn all_paths(
    snapshot: &GraphSnapshot,
    from: &str,
    to: &str,
    max_hops: usize,
) -> Vec<Vec<String>> {
    let mut paths: Vec<Vec<String>> = Vec::new();
    if !snapshot.nodes.contains(from) || !snapshot.nodes.contains(to) {
        return paths;
    }

    let mut stack: Vec<String> = vec![from.to_string()];
    let mut on_path: HashSet<String> = HashSet::new();
    on_path.insert(from.to_string());
    walk(
        snapshot,
        to,
        max_hops,
        &mut stack,
        &mut on_path,
        &mut paths,
    );

    paths.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    paths.truncate(MAX_PATHS_ENUMERATED);
    paths
}

fn walk(
    snapshot: &GraphSnapshot,
    to: &str,
    max_hops: usize,
    stack: &mut Vec<String>,
    on_path: &mut HashSet<String>,
    paths: &mut Vec<Vec<String>>,
) {
    if paths.len() >= MAX_PATHS_ENUMERATED {
        return;
    }
    let current = stack.last().cloned().unwrap_or_default();
    if current == to {
        paths.push(stack.clone());
        return;
    }
    if stack.len() > max_hops {
        return;
    }
    for (neighbor, _, _) in snapshot.neighbors(&current) {
        if on_path.contains(neighbor) {
            continue;
        }
        stack.push(neighbor.clone());
        on_path.insert(neighbor.clone());
        walk(snapshot, to, max_hops, stack, on_path, paths);
        on_path.remove(neighbor);
        stack.pop();
    }
}

/// Enumerate second-degree relations from a start entity
///
/// Triples `start —r1→ middle —r2→ end` where `end` is neither the start
/// nor a direct neighbor, optionally filtered by the first relation's type.
/// Sorted by descending strength, ties by (middle, end).
pub fn second_degree_relations(
    snapshot: &GraphSnapshot,
    start: &str,
    relation_filter: Option<&RelationType>,
) -> Vec<SecondDegreeRelation> {
    let direct: BTreeSet<&str> = snapshot
        .neighbors(start)
        .iter()
        .map(|(n, _, _)| n.as_str())
        .collect();

    let mut relations: Vec<SecondDegreeRelation> = Vec::new();
    for (middle, first_strength, first_relation) in snapshot.neighbors(start) {
        if let Some(filter) = relation_filter {
            if first_relation != filter {
                continue;
            }
        }
        for (end, second_strength, second_relation) in snapshot.neighbors(middle) {
            if end == start || direct.contains(end.as_str()) {
                continue;
            }
            relations.push(SecondDegreeRelation {
                middle: middle.clone(),
                end: end.clone(),
                first_relation: first_relation.clone(),
                second_relation: second_relation.clone(),
                strength: first_strength * second_strength,
            });
        }
    }

    relations.sort_by(|a, b| {
        b.strength
            .partial_cmp(&a.strength)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.middle.cmp(&b.middle))
            .then_with(|| a.end.cmp(&b.end))
    });
    relations
}

/// Infer a potential relationship between two entities with no direct edge
///
/// Confidence comes from the mutual-neighbor count alone: ≥5 → 0.9, ≥3 →
/// 0.7, ≥1 → 0.5, else 0.2. Coarse, but deterministic and stable for
/// downstream callers.
pub fn infer_potential_relationship(
    snapshot: &GraphSnapshot,
    a: &str,
    b: &str,
) -> PotentialRelationship {
    let na = snapshot.neighbor_set(a);
    let nb = snapshot.neighbor_set(b);
    let mut mutual_neighbors: Vec<String> =
        na.intersection(&nb).map(|s| s.to_string()).collect();
    mutual_neighbors.sort();

    let confidence = match mutual_neighbors.len() {
        n if n >= 5 => MUTUAL_CONFIDENCE_HIGH,
        n if n >= 3 => MUTUAL_CONFIDENCE_MEDIUM,
        n if n >= 1 => MUTUAL_CONFIDENCE_LOW,
        _ => MUTUAL_CONFIDENCE_NONE,
    };

    PotentialRelationship {
        mutual_neighbors,
        confidence,
    }
}

/// Find 3-cycles whose edges all share one relation type
///
/// Diagnostic query, not on the hot retrieval path. Each triangle is
/// reported once with members sorted.
pub fn triangles(snapshot: &GraphSnapshot, relation: &RelationType) -> Vec<[String; 3]> {
    let mut found: BTreeSet<[String; 3]> = BTreeSet::new();
    for a in &snapshot.nodes {
        for (b, _, r_ab) in snapshot.neighbors(a) {
            if r_ab != relation || b <= a {
                continue;
            }
            for (c, _, r_bc) in snapshot.neighbors(b) {
                if r_bc != relation || c <= b {
                    continue;
                }
                let closes = snapshot
                    .neighbors(c)
                    .iter()
                    .any(|(n, _, r_ca)| n == a && r_ca == relation);
                if closes {
                    found.insert([a.clone(), b.clone(), c.clone()]);
                }
            }
        }
    }
    found.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RelationshipEdge, RelationshipGraph};

    fn chain() -> RelationshipGraph {
        let graph = RelationshipGraph::new();
        graph.add_edge(RelationshipEdge::new("ana", "ben", RelationType::Friend, 0.9));
        graph.add_edge(RelationshipEdge::new("ben", "carol", RelationType::Friend, 0.8));
        graph.add_edge(RelationshipEdge::new("carol", "dave", RelationType::Friend, 0.7));
        graph
    }

    #[test]
    fn test_shortest_path_within_bound() {
        let graph = chain();
        let snapshot = graph.snapshot();
        let path = shortest_path(&snapshot, "ana", "dave", 4).expect("path exists");
        assert_eq!(path, vec!["ana", "ben", "carol", "dave"]);
    }

    #[test]
    fn test_shortest_path_respects_hop_bound() {
        let graph = chain();
        let snapshot = graph.snapshot();
        assert!(shortest_path(&snapshot, "ana", "dave", 2).is_none());
    }

    #[test]
    fn test_all_paths_sorted_by_length() {
        let graph = chain();
        // Add a shortcut so two paths exist
        graph.add_edge(RelationshipEdge::new("ana", "carol", RelationType::Colleague, 0.5));
        let snapshot = graph.snapshot();
        let paths = all_paths(&snapshot, "ana", "dave", 4);
        assert_eq!(paths.len(), 2);
        assert!(paths[0].len() <= paths[1].len());
        assert_eq!(paths[0], vec!["ana", "carol", "dave"]);
    }

    #[test]
    fn test_second_degree_strength_product() {
        let graph = chain();
        let snapshot = graph.snapshot();
        let relations = second_degree_relations(&snapshot, "ana", None);
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].middle, "ben");
        assert_eq!(relations[0].end, "carol");
        assert!((relations[0].strength - 0.9 * 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_potential_relationship_three_mutuals() {
        let graph = RelationshipGraph::new();
        for mutual in ["carol", "dave", "erin"] {
            graph.add_edge(RelationshipEdge::new("ana", mutual, RelationType::Friend, 0.5));
            graph.add_edge(RelationshipEdge::new("ben", mutual, RelationType::Friend, 0.5));
        }
        let snapshot = graph.snapshot();
        let inferred = infer_potential_relationship(&snapshot, "ana", "ben");
        assert_eq!(inferred.mutual_neighbors.len(), 3);
        assert!((inferred.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_potential_relationship_no_mutuals() {
        let graph = chain();
        let snapshot = graph.snapshot();
        let inferred = infer_potential_relationship(&snapshot, "ana", "dave");
        assert!(inferred.mutual_neighbors.is_empty());
        assert!((inferred.confidence - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_triangles_same_relation_type_only() {
        let graph = RelationshipGraph::new();
        graph.add_edge(RelationshipEdge::new("ana", "ben", RelationType::Friend, 0.9));
        graph.add_edge(RelationshipEdge::new("ben", "carol", RelationType::Friend, 0.9));
        graph.add_edge(RelationshipEdge::new("ana", "carol", RelationType::Friend, 0.9));
        // Mixed-type triangle must not count
        graph.add_edge(RelationshipEdge::new("ana", "dave", RelationType::Friend, 0.9));
        graph.add_edge(RelationshipEdge::new("ben", "dave", RelationType::Colleague, 0.9));

        let snapshot = graph.snapshot();
        let found = triangles(&snapshot, &RelationType::Friend);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0], ["ana".to_string(), "ben".to_string(), "carol".to_string()]);
    }
}
