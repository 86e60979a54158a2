use crate::{EdgeId, Network};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::{HashSet, VecDeque};

/// Island summary used by `wardrop validate` (standard connected-components approach).
#[derive(Debug, Clone, PartialEq)]
pub struct IslandSummary {
    pub island_id: usize,
    pub stops: Vec<String>,
}

/// Labels connected components (breadth-first search) in stop insertion order.
pub fn find_islands(network: &Network) -> Vec<IslandSummary> {
    let mut visited = HashSet::new();
    let mut islands = Vec::new();
    for start in network.graph.node_indices() {
        if visited.contains(&start) {
            continue;
        }
        let mut queue = VecDeque::new();
        queue.push_back(start);
        let mut members = Vec::new();
        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            members.push(node);
            for neighbor in ordered_neighbors(network, node) {
                if !visited.contains(&neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        members.sort();
        islands.push(IslandSummary {
            island_id: islands.len(),
            stops: members
                .into_iter()
                .map(|n| network.stop_name(n).to_string())
                .collect(),
        });
    }
    islands
}

/// Distinct neighbours of `node` ordered by the first edge that reaches them.
///
/// petgraph walks adjacency lists newest-first; sorting by edge index gives the
/// insertion order instead, which keeps route discovery reproducible.
pub fn ordered_neighbors(network: &Network, node: NodeIndex) -> Vec<NodeIndex> {
    let mut incident: Vec<(EdgeId, NodeIndex)> = network
        .graph
        .edges(node)
        .map(|e| {
            let other = if e.source() == node {
                e.target()
            } else {
                e.source()
            };
            (EdgeId::new(e.id().index()), other)
        })
        .collect();
    incident.sort_by_key(|(id, _)| *id);

    let mut seen = HashSet::new();
    incident
        .into_iter()
        .filter_map(|(_, other)| {
            if other != node && seen.insert(other) {
                Some(other)
            } else {
                None
            }
        })
        .collect()
}

/// All simple node paths from `source` to `target` with at most `max_hops` edges.
///
/// Each node sequence is reported once regardless of how many parallel edges
/// realise it; expanding parallel edges is left to the caller. Paths come out
/// in depth-first discovery order.
pub fn simple_paths(
    network: &Network,
    source: NodeIndex,
    target: NodeIndex,
    max_hops: usize,
) -> Vec<Vec<NodeIndex>> {
    let mut paths = Vec::new();
    if source == target || max_hops == 0 {
        return paths;
    }
    let mut path = vec![source];
    let mut on_path = HashSet::from([source]);
    extend_paths(network, target, max_hops, &mut path, &mut on_path, &mut paths);
    paths
}

fn extend_paths(
    network: &Network,
    target: NodeIndex,
    max_hops: usize,
    path: &mut Vec<NodeIndex>,
    on_path: &mut HashSet<NodeIndex>,
    paths: &mut Vec<Vec<NodeIndex>>,
) {
    let Some(&last) = path.last() else {
        return;
    };
    for next in ordered_neighbors(network, last) {
        if on_path.contains(&next) {
            continue;
        }
        if next == target {
            let mut found = path.clone();
            found.push(next);
            paths.push(found);
            continue;
        }
        // path.len() nodes means path.len() - 1 hops so far
        if path.len() < max_hops {
            path.push(next);
            on_path.insert(next);
            extend_paths(network, target, max_hops, path, on_path, paths);
            on_path.remove(&next);
            path.pop();
        }
    }
}
