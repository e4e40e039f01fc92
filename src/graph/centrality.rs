//! Centrality measures over the active subgraph
//!
//! Degree centrality is exact. Betweenness is a degree-based proxy: a
//! node's potential to bridge is estimated from how many neighbor pairs it
//! could connect, not from all-pairs shortest paths. The proxy is cheap,
//! deterministic, and matches what existing callers were tuned against;
//! the output is explicitly flagged approximate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::GraphSnapshot;

/// Centrality scores for every node in the snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentralityScores {
    /// Connection count per node
    pub degree: BTreeMap<String, usize>,
    /// Normalized bridging estimate per node, in [0, 1]
    pub betweenness: BTreeMap<String, f32>,
    /// Always true: betweenness is a degree-based proxy, not exact
    /// all-pairs betweenness
    pub approximate: bool,
}

/// Compute degree centrality and the approximate betweenness proxy
pub fn centrality(snapshot: &GraphSnapshot) -> CentralityScores {
    let degree: BTreeMap<String, usize> = snapshot
        .nodes
        .iter()
        .map(|n| (n.clone(), snapshot.neighbors(n).len()))
        .collect();

    // Proxy: pairs of neighbors the node could bridge, normalized by the
    // largest such count in the graph
    let raw: BTreeMap<&str, f64> = degree
        .iter()
        .map(|(n, &d)| (n.as_str(), (d * d.saturating_sub(1)) as f64 / 2.0))
        .collect();
    let max = raw.values().copied().fold(0.0f64, f64::max);

    let betweenness: BTreeMap<String, f32> = raw
        .into_iter()
        .map(|(n, score)| {
            let normalized = if max > 0.0 { score / max } else { 0.0 };
            (n.to_string(), normalized as f32)
        })
        .collect();

    CentralityScores {
        degree,
        betweenness,
        approximate: true,
    }
}

/// Normalized degree centrality for a single node, in [0, 1]
///
/// Used by rank fusion as the graph-importance component.
pub fn normalized_degree(snapshot: &GraphSnapshot, node: &str) -> f32 {
    let max = snapshot
        .nodes
        .iter()
        .map(|n| snapshot.neighbors(n).len())
        .max()
        .unwrap_or(0);
    if max == 0 {
        return 0.0;
    }
    snapshot.neighbors(node).len() as f32 / max as f32
}
