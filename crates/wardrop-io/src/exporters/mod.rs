//! Results persistence.
//!
//! Both writers share one JSON document per run; see [`results`] for its
//! layout and [`node_link`] for the graph encoding.

pub mod node_link;
pub mod results;

pub use node_link::{NodeLinkEdge, NodeLinkGraph, NodeLinkNode};
pub use results::{append_graph, append_metrics, ResultsFile};
