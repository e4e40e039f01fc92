//! Louvain-style community detection
//!
//! Local-moving heuristic over the active subgraph: every node starts in
//! its own community, then repeatedly moves to the neighboring community
//! with the largest positive modularity gain
//!
//! ```text
//! ΔQ = (k_i_in − Σ_tot · k_i / 2m) / 2m
//! ```
//!
//! where `k_i` is the node's weighted degree, `k_i_in` the weight of its
//! edges into the candidate community, `Σ_tot` the community's total
//! incident weight, and `m` the total graph weight. Iteration stops after a
//! pass with no improving move, when the pass gain falls below a threshold,
//! or at a hard iteration cap.
//!
//! Communities smaller than the configured minimum are merged into the
//! neighboring community they connect to most.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::GraphSnapshot;
use crate::constants::{LOUVAIN_MAX_ITERATIONS, LOUVAIN_MIN_GAIN, MIN_COMMUNITY_SIZE};

/// A detected community (transient, never persisted)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub id: usize,
    /// Member entity names, sorted
    pub members: Vec<String>,
}

/// Detect communities in the active subgraph
///
/// Deterministic: nodes are visited in sorted order and ties resolve to the
/// lowest community id.
pub fn detect_communities(snapshot: &GraphSnapshot) -> Vec<Community> {
    let nodes: Vec<String> = snapshot.nodes.iter().cloned().collect();
    if nodes.is_empty() {
        return Vec::new();
    }

    let m = snapshot.total_weight();
    // Weighted degree per node
    let degree: HashMap<&str, f64> = nodes
        .iter()
        .map(|n| {
            let k: f64 = snapshot
                .neighbors(n)
                .iter()
                .map(|(_, w, _)| *w as f64)
                .sum();
            (n.as_str(), k)
        })
        .collect();

    // node index → community id, community id → total incident weight
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();
    let mut community: Vec<usize> = (0..nodes.len()).collect();
    let mut sigma_tot: Vec<f64> = nodes.iter().map(|n| degree[n.as_str()]).collect();

    if m > 0.0 {
        for _pass in 0..LOUVAIN_MAX_ITERATIONS {
            let mut pass_gain = 0.0f64;
            let mut moved = false;

            for (i, node) in nodes.iter().enumerate() {
                let k_i = degree[node.as_str()];
                let current = community[i];

                // Weight of this node's edges into each neighboring community
                let mut links: BTreeMap<usize, f64> = BTreeMap::new();
                for (neighbor, weight, _) in snapshot.neighbors(node) {
                    let c = community[index[neighbor.as_str()]];
                    *links.entry(c).or_insert(0.0) += *weight as f64;
                }

                // Evaluate gains with the node removed from its community
                sigma_tot[current] -= k_i;
                let current_gain = {
                    let k_in = links.get(&current).copied().unwrap_or(0.0);
                    (k_in - sigma_tot[current] * k_i / (2.0 * m)) / (2.0 * m)
                };

                let mut best_community = current;
                let mut best_gain = current_gain;
                for (&c, &k_in) in &links {
                    if c == current {
                        continue;
                    }
                    let gain = (k_in - sigma_tot[c] * k_i / (2.0 * m)) / (2.0 * m);
                    if gain > best_gain {
                        best_gain = gain;
                        best_community = c;
                    }
                }

                sigma_tot[best_community] += k_i;
                if best_community != current {
                    community[i] = best_community;
                    pass_gain += best_gain - current_gain;
                    moved = true;
                }
            }

            if !moved || pass_gain < LOUVAIN_MIN_GAIN {
                break;
            }
        }
    }

    let mut communities = collect_communities(&nodes, &community);
    merge_small_communities(snapshot, &mut communities);
    debug!(count = communities.len(), "community detection finished");
    communities
}

/// Group node assignments into sorted community structs
fn collect_communities(nodes: &[String], assignment: &[usize]) -> Vec<Community> {
    let mut groups: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for (i, node) in nodes.iter().enumerate() {
        groups.entry(assignment[i]).or_default().push(node.clone());
    }
    groups
        .into_values()
        .enumerate()
        .map(|(id, mut members)| {
            members.sort();
            Community { id, members }
        })
        .collect()
}

/// Merge communities below the minimum size into their best-connected
/// neighbor community
fn merge_small_communities(snapshot: &GraphSnapshot, communities: &mut Vec<Community>) {
    loop {
        let membership: HashMap<&str, usize> = communities
            .iter()
            .flat_map(|c| c.members.iter().map(move |m| (m.as_str(), c.id)))
            .collect();

        // Find the first undersized community with an external connection
        let mut merge: Option<(usize, usize)> = None;
        for small in communities.iter() {
            if small.members.len() >= MIN_COMMUNITY_SIZE {
                continue;
            }
            // Total edge weight from this community to each other community
            let mut weight_to: BTreeMap<usize, f64> = BTreeMap::new();
            for member in &small.members {
                for (neighbor, weight, _) in snapshot.neighbors(member) {
                    let target = membership[neighbor.as_str()];
                    if target != small.id {
                        *weight_to.entry(target).or_insert(0.0) += *weight as f64;
                    }
                }
            }
            if let Some((&target, _)) = weight_to
                .iter()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            {
                merge = Some((small.id, target));
                break;
            }
        }

        let Some((from, into)) = merge else {
            break;
        };
        let moved: Vec<String> = communities
            .iter()
            .find(|c| c.id == from)
            .map(|c| c.members.clone())
            .unwrap_or_default();
        communities.retain(|c| c.id != from);
        if let Some(target) = communities.iter_mut().find(|c| c.id == into) {
            target.members.extend(moved);
            target.members.sort();
        }
    }

    // Re-number after merging so ids stay dense
    communities.sort_by(|a, b| a.members.cmp(&b.members));
    for (id, community) in communities.iter_mut().enumerate() {
        community.id = id;
    }
}
