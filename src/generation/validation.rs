//! Soft validation and statistics for generated node graphs.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::DungeonNode;
use crate::balance::EncounterType;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapStatistics {
    pub total_nodes: usize,
    pub max_depth: i32,
    pub nodes_per_depth: BTreeMap<i32, usize>,
    /// Every encounter type, including those with zero nodes
    pub type_counts: BTreeMap<EncounterType, usize>,
    pub average_connections: f64,
}

/// Check ids, edges and reachability from the surface. Never panics; every
/// problem found is reported.
pub fn validate_map(nodes: &[DungeonNode]) -> MapValidation {
    let mut errors = Vec::new();

    let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(nodes.len() + 1, nodes.len() * 2);
    let indices: Vec<NodeIndex> = nodes.iter().map(|_| graph.add_node(())).collect();
    let surface = graph.add_node(());

    let mut by_id: HashMap<&str, NodeIndex> = HashMap::with_capacity(nodes.len());
    for (node, idx) in nodes.iter().zip(&indices) {
        if by_id.insert(node.id.as_str(), *idx).is_some() {
            errors.push(format!("Duplicate node id: {}", node.id));
        }
    }

    for (node, idx) in nodes.iter().zip(&indices) {
        for target in &node.connections {
            match by_id.get(target.as_str()) {
                Some(target_idx) => {
                    graph.add_edge(*idx, *target_idx, ());
                }
                None => errors.push(format!(
                    "Node {} has connection to missing node {}",
                    node.id, target
                )),
            }
        }
    }

    let mut has_entry = false;
    for (node, idx) in nodes.iter().zip(&indices) {
        if node.depth == 1 {
            has_entry = true;
            graph.add_edge(surface, *idx, ());
        }
    }
    if !has_entry {
        errors.push("No depth-1 nodes found".to_string());
    }

    let mut reached = vec![false; graph.node_count()];
    let mut bfs = Bfs::new(&graph, surface);
    while let Some(visited) = bfs.next(&graph) {
        reached[visited.index()] = true;
    }
    for (node, idx) in nodes.iter().zip(&indices) {
        if !reached[idx.index()] {
            errors.push(format!("Node {} is unreachable from surface", node.id));
        }
    }

    MapValidation {
        is_valid: errors.is_empty(),
        errors,
    }
}

pub fn get_map_statistics(nodes: &[DungeonNode]) -> MapStatistics {
    let mut type_counts: BTreeMap<EncounterType, usize> =
        EncounterType::ALL.iter().map(|t| (*t, 0)).collect();
    let mut nodes_per_depth = BTreeMap::new();
    let mut total_connections = 0usize;

    for node in nodes {
        *type_counts.entry(node.encounter_type).or_insert(0) += 1;
        *nodes_per_depth.entry(node.depth).or_insert(0) += 1;
        total_connections += node.connections.len();
    }

    MapStatistics {
        total_nodes: nodes.len(),
        max_depth: nodes.iter().map(|n| n.depth).max().unwrap_or(0),
        nodes_per_depth,
        type_counts,
        average_connections: if nodes.is_empty() {
            0.0
        } else {
            total_connections as f64 / nodes.len() as f64
        },
    }
}
