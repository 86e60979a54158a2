//! # wardrop-core: Transport Network Modeling Core
//!
//! Provides the data structures for multi-modal transport networks priced by
//! the `wardrop-algo` equilibrium engine.
//!
//! ## Design Philosophy
//!
//! Networks are modeled as **undirected multigraphs** where:
//! - **Nodes**: Stops (opaque string identifiers)
//! - **Edges**: Transit links tagged with a mode (`color`), a capacity, a
//!   congestion coefficient `k` and a price that is either fixed or still to be
//!   solved for
//!
//! Parallel edges between the same pair of stops are allowed (a bus line and a
//! metro line between the same stations) and are told apart by a per-pair
//! `key`, exactly like a keyed multigraph.
//!
//! ## Quick Start
//!
//! ```
//! use wardrop_core::*;
//!
//! let mut network = Network::new();
//! network
//!     .add_edge("A", "C", TransitEdge::new("red", 1.0).with_capacity(100.0).with_price(5.0))
//!     .unwrap();
//! // Unknown price: solved by the pricing engine
//! network.add_edge("A", "C", TransitEdge::new("Bus", 2.0)).unwrap();
//!
//! assert_eq!(network.graph.node_count(), 2);
//! assert_eq!(network.stats().num_unpriced, 1);
//! ```
//!
//! ## Core Data Structures
//!
//! - [`Network`] - petgraph `UnGraph<Stop, TransitEdge>` plus a name index
//! - [`TransitEdge`] - edge attributes
//! - [`Demand`] - origin/destination flow requirement
//! - [`EdgeId`] - stable edge identity (edges are never removed)

use petgraph::{prelude::*, Undirected};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod error;
pub mod graph_utils;

pub use error::{NetworkError, NetworkResult};
pub use graph_utils::*;
pub use petgraph::graph::NodeIndex;

/// Capacity assumed for edges whose input omits one.
pub const DEFAULT_CAPACITY: f64 = 500.0;

/// Mode tag of synthetic direct edges.
pub const PERSONAL_MODE: &str = "personal";

/// Stable identity of an edge (index into the graph's edge list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(usize);

impl EdgeId {
    #[inline]
    pub fn new(value: usize) -> Self {
        EdgeId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
    #[inline]
    fn index(&self) -> EdgeIndex {
        EdgeIndex::new(self.0)
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Edge#{}", self.0)
    }
}

/// A stop (station, interchange) in the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stop {
    pub name: String,
}

/// A transit link between two stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitEdge {
    /// Parallel-edge key, unique among edges joining the same pair of stops.
    /// Left empty, [`Network::add_edge`] assigns the next free integer key.
    pub key: String,
    /// Mode tag (e.g. "Bus", a metro line color, "personal")
    pub color: String,
    /// Upper bound on flow
    pub capacity: f64,
    /// Fixed price, or `None` when the price is an unknown to be solved
    pub price: Option<f64>,
    /// Marginal congestion coefficient: cost grows by `k` per unit of flow
    pub k: f64,
    /// Resolved flow after a successful solve
    pub flow: Option<f64>,
}

impl Default for TransitEdge {
    fn default() -> Self {
        Self {
            key: String::new(),
            color: PERSONAL_MODE.to_string(),
            capacity: DEFAULT_CAPACITY,
            price: None,
            k: 1.0,
            flow: None,
        }
    }
}

impl TransitEdge {
    /// Edge of the given mode with an unknown price and default capacity.
    pub fn new(color: impl Into<String>, k: f64) -> Self {
        Self {
            color: color.into(),
            k,
            ..Self::default()
        }
    }

    /// Fix the price of this edge.
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// True when the price still has to be solved for.
    pub fn is_unpriced(&self) -> bool {
        self.price.is_none()
    }

    /// Check the invariants the constraint builder relies on.
    pub fn validate(&self) -> NetworkResult<()> {
        if !self.k.is_finite() || self.k < 0.0 {
            return Err(NetworkError::Validation(format!(
                "edge '{}' ({}): k must be a non-negative number, got {}",
                self.key, self.color, self.k
            )));
        }
        if !self.capacity.is_finite() || self.capacity < 0.0 {
            return Err(NetworkError::Validation(format!(
                "edge '{}' ({}): capacity must be a non-negative number, got {}",
                self.key, self.color, self.capacity
            )));
        }
        if let Some(price) = self.price {
            if !price.is_finite() {
                return Err(NetworkError::Validation(format!(
                    "edge '{}' ({}): price must be finite",
                    self.key, self.color
                )));
            }
        }
        Ok(())
    }
}

/// An origin/destination pair with a required flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demand {
    /// Source stop
    pub s: String,
    /// Target stop
    pub t: String,
    /// Required flow, never negative
    pub d: f64,
}

impl Demand {
    pub fn new(s: impl Into<String>, t: impl Into<String>, d: f64) -> Self {
        Self {
            s: s.into(),
            t: t.into(),
            d,
        }
    }

    pub fn validate(&self) -> NetworkResult<()> {
        if !self.d.is_finite() || self.d < 0.0 {
            return Err(NetworkError::Validation(format!(
                "demand {} -> {} must be a non-negative number, got {}",
                self.s, self.t, self.d
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for Demand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {} (d={})", self.s, self.t, self.d)
    }
}

/// The transport network graph
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub graph: Graph<Stop, TransitEdge, Undirected>,
    stops: HashMap<String, NodeIndex>,
}

// Edges are only ever appended, so petgraph edge indices double as stable
// edge identities for the lifetime of a run.

impl Network {
    pub fn new() -> Self {
        Self {
            graph: Graph::new_undirected(),
            stops: HashMap::new(),
        }
    }

    /// Add a stop if it does not exist yet; returns its node index either way.
    pub fn add_stop(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.stops.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(Stop {
            name: name.to_string(),
        });
        self.stops.insert(name.to_string(), idx);
        idx
    }

    pub fn stop(&self, name: &str) -> Option<NodeIndex> {
        self.stops.get(name).copied()
    }

    pub fn stop_name(&self, idx: NodeIndex) -> &str {
        &self.graph[idx].name
    }

    /// Add an edge between two stops (created on demand).
    ///
    /// An empty `edge.key` is replaced by the smallest unused integer key for
    /// the stop pair, so the first edge gets "0", the next "1", and so on.
    pub fn add_edge(&mut self, u: &str, v: &str, mut edge: TransitEdge) -> NetworkResult<EdgeId> {
        edge.validate()?;
        let a = self.add_stop(u);
        let b = self.add_stop(v);
        let taken: Vec<String> = self
            .edges_between(a, b)
            .into_iter()
            .map(|id| self.graph[id.index()].key.clone())
            .collect();

        if edge.key.is_empty() {
            let mut next = taken.len();
            while taken.iter().any(|k| *k == next.to_string()) {
                next += 1;
            }
            edge.key = next.to_string();
        } else if taken.contains(&edge.key) {
            return Err(NetworkError::DuplicateEdgeKey {
                u: u.to_string(),
                v: v.to_string(),
                key: edge.key,
            });
        }

        let idx = self.graph.add_edge(a, b, edge);
        Ok(EdgeId(idx.index()))
    }

    pub fn edge(&self, id: EdgeId) -> Option<&TransitEdge> {
        self.graph.edge_weight(id.index())
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> Option<&mut TransitEdge> {
        self.graph.edge_weight_mut(id.index())
    }

    /// Endpoints of an edge in insertion orientation.
    pub fn endpoints(&self, id: EdgeId) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(id.index())
    }

    /// Endpoint names of an edge in insertion orientation.
    pub fn endpoint_names(&self, id: EdgeId) -> Option<(&str, &str)> {
        let (a, b) = self.endpoints(id)?;
        Some((self.stop_name(a), self.stop_name(b)))
    }

    /// All edge ids in insertion order.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.graph.edge_indices().map(|idx| EdgeId(idx.index()))
    }

    /// Parallel edges joining `a` and `b` (either orientation), in insertion order.
    pub fn edges_between(&self, a: NodeIndex, b: NodeIndex) -> Vec<EdgeId> {
        let mut ids: Vec<EdgeId> = self
            .graph
            .edges_connecting(a, b)
            .map(|e| EdgeId(e.id().index()))
            .collect();
        if a != b {
            ids.extend(
                self.graph
                    .edges_connecting(b, a)
                    .map(|e| EdgeId(e.id().index())),
            );
        }
        ids.sort();
        ids.dedup();
        ids
    }

    /// Edges whose price is still unknown.
    pub fn unpriced_edges(&self) -> Vec<EdgeId> {
        self.edge_ids()
            .filter(|&id| self.graph[id.index()].is_unpriced())
            .collect()
    }

    /// Check every edge against the invariants of [`TransitEdge::validate`].
    pub fn validate(&self) -> NetworkResult<()> {
        for edge in self.graph.edge_weights() {
            edge.validate()?;
        }
        Ok(())
    }

    /// Compute basic statistics about the network
    pub fn stats(&self) -> NetworkStats {
        let mut modes: Vec<&str> = Vec::new();
        let mut stats = NetworkStats {
            num_stops: self.graph.node_count(),
            num_edges: self.graph.edge_count(),
            ..NetworkStats::default()
        };
        for edge in self.graph.edge_weights() {
            if edge.is_unpriced() {
                stats.num_unpriced += 1;
            }
            if !modes.contains(&edge.color.as_str()) {
                modes.push(&edge.color);
            }
            stats.total_capacity += edge.capacity;
        }
        stats.num_modes = modes.len();
        stats
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkStats {
    pub num_stops: usize,
    pub num_edges: usize,
    pub num_unpriced: usize,
    pub num_modes: usize,
    pub total_capacity: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} stops, {} edges ({} unpriced), {} modes, total capacity {:.0}",
            self.num_stops, self.num_edges, self.num_unpriced, self.num_modes, self.total_capacity
        )
    }
}
