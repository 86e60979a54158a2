//! # wardrop-io: Network Input and Results Output
//!
//! Loads transport networks, demands and route-addition feeds from JSON, and
//! persists pricing results (per-event metrics plus node-link snapshots of
//! the network) to a single JSON results file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wardrop_io::importers::{parse_network_file, parse_routes_file};
//! use wardrop_io::exporters::ResultsFile;
//!
//! fn main() -> anyhow::Result<()> {
//!     let loaded = parse_network_file("data/network.json")?;
//!     let routes = parse_routes_file("data/routes.json", &loaded.k_table)?;
//!     println!("{} stops, {} route additions", loaded.network.graph.node_count(), routes.len());
//!
//!     ResultsFile::new("results.json").append_graph(&loaded.network)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`importers`]: network file and route feed ([`importers::LoadError`] for missing files)
//! - [`exporters`]: results file with `graphs` and `metrics`
//! - [`helpers`]: import diagnostics and post-import validation

pub mod exporters;
pub mod helpers;
pub mod importers;

pub use exporters::{append_graph, append_metrics, NodeLinkGraph, ResultsFile};
pub use helpers::{validate_network, ImportDiagnostics, ImportResult, ValidationConfig};
pub use importers::{
    parse_network_file, parse_network_str, parse_routes_file, parse_routes_str, KTable, LoadError,
    RouteAddition,
};
