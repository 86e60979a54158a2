use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use wardrop_core::Network;

/// Node-link document of an undirected multigraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLinkGraph {
    pub directed: bool,
    pub multigraph: bool,
    pub graph: Map<String, Value>,
    pub nodes: Vec<NodeLinkNode>,
    pub edges: Vec<NodeLinkEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLinkNode {
    pub id: String,
}

/// One edge; unresolved price or flow serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLinkEdge {
    pub source: String,
    pub target: String,
    pub key: String,
    pub color: String,
    pub capacity: f64,
    pub price: Option<f64>,
    pub k: f64,
    pub f_e: Option<f64>,
}

impl NodeLinkGraph {
    /// Snapshot of `network`, stops and edges in insertion order.
    pub fn from_network(network: &Network) -> Self {
        let nodes = network
            .graph
            .node_indices()
            .map(|idx| NodeLinkNode {
                id: network.stop_name(idx).to_string(),
            })
            .collect();
        let edges = network
            .edge_ids()
            .filter_map(|id| {
                let edge = network.edge(id)?;
                let (source, target) = network.endpoint_names(id)?;
                Some(NodeLinkEdge {
                    source: source.to_string(),
                    target: target.to_string(),
                    key: edge.key.clone(),
                    color: edge.color.clone(),
                    capacity: edge.capacity,
                    price: edge.price,
                    k: edge.k,
                    f_e: edge.flow,
                })
            })
            .collect();
        Self {
            directed: false,
            multigraph: true,
            graph: Map::new(),
            nodes,
            edges,
        }
    }
}
