//! JSON importers for networks, demands and route-addition feeds.
//!
//! Both loaders return [`wardrop_core`] types directly. A missing file is
//! reported as the typed [`LoadError::MissingInputFile`] so callers can match
//! on it; every other failure is an `anyhow` error carrying the file path and
//! the element that broke.
//!
//! ## Network file
//!
//! ```json
//! {
//!   "networks": [
//!     {"name": "Metro", "nodes": ["A", "C"],
//!      "edges": [{"v1": "A", "v2": "C", "data": {"color": "red", "capacity": 100, "price": 5}}]},
//!     {"name": "Bus", "nodes": ["A", "C"],
//!      "edges": [{"v1": "A", "v2": "C", "data": {"color": "Bus", "capacity": 200, "price": null}}]}
//!   ],
//!   "k": {"Metro": {"red": 1}, "Bus": 2},
//!   "demands": [{"s": "A", "t": "C", "d": 40}]
//! }
//! ```
//!
//! An edge without `k` takes it from the root table: sub-network "Metro" by
//! line color, sub-network "Bus" from the scalar. An edge without `capacity`
//! gets [`DEFAULT_CAPACITY`](wardrop_core::DEFAULT_CAPACITY). A `null` or
//! absent price marks the price as unknown.
//!
//! ## Route feed
//!
//! ```json
//! {"edges": [{"v1": "A", "v2": "B", "data": {"color": "blue", "capacity": 300, "price": null}}]}
//! ```
//!
//! Entries are applied in file order, one pricing event each.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod network_json;
mod routes_json;

pub use network_json::{parse_network_file, parse_network_str};
pub use routes_json::{parse_routes_file, parse_routes_str, RouteAddition};

/// Loader failures callers may want to tell apart from malformed input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("input file not found: {}", .0.display())]
    MissingInputFile(PathBuf),
}

/// Root congestion-coefficient table of a network file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KTable {
    /// Metro lines keyed by color
    #[serde(rename = "Metro", default)]
    pub metro: BTreeMap<String, f64>,
    /// One coefficient for every bus edge
    #[serde(rename = "Bus", default)]
    pub bus: Option<f64>,
}

impl KTable {
    /// Coefficient for an edge of sub-network `network` with line `color`.
    pub fn for_network(&self, network: &str, color: &str) -> Option<f64> {
        match network {
            "Metro" => self.metro.get(color).copied(),
            "Bus" => self.bus,
            _ => self.for_color(color),
        }
    }

    /// Coefficient by line color alone: a metro color, or "Bus".
    pub fn for_color(&self, color: &str) -> Option<f64> {
        self.metro
            .get(color)
            .copied()
            .or(if color == "Bus" { self.bus } else { None })
    }
}

/// Attribute block shared by network edges and route additions.
#[derive(Debug, Clone, Deserialize)]
struct EdgeData {
    color: String,
    #[serde(default)]
    capacity: Option<f64>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    k: Option<f64>,
    #[serde(default)]
    key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct EdgeRecord {
    v1: String,
    v2: String,
    data: EdgeData,
}

fn read_input(path: &Path, what: &str) -> Result<String> {
    if !path.exists() {
        return Err(LoadError::MissingInputFile(path.to_path_buf()).into());
    }
    fs::read_to_string(path).with_context(|| format!("reading {what} file {}", path.display()))
}
