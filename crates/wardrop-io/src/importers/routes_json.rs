use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use wardrop_core::{EdgeId, Network, NetworkResult, TransitEdge, DEFAULT_CAPACITY};

use super::{read_input, EdgeRecord, KTable};

#[derive(Debug, Deserialize)]
struct RoutesFile {
    edges: Vec<EdgeRecord>,
}

/// One edge of the route-addition feed.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteAddition {
    pub v1: String,
    pub v2: String,
    pub edge: TransitEdge,
}

impl RouteAddition {
    /// Add this edge to `network`; parallel-edge keys are assigned as usual.
    pub fn apply(&self, network: &mut Network) -> NetworkResult<EdgeId> {
        network.add_edge(&self.v1, &self.v2, self.edge.clone())
    }
}

impl std::fmt::Display for RouteAddition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{} ({})", self.v1, self.v2, self.edge.color)
    }
}

/// Load the ordered route-addition feed. Missing `k` values are looked up in
/// `k_table` by line color.
pub fn parse_routes_file(path: impl AsRef<Path>, k_table: &KTable) -> Result<Vec<RouteAddition>> {
    let path = path.as_ref();
    let json = read_input(path, "routes")?;
    parse_routes_str(&json, k_table)
        .with_context(|| format!("parsing routes file {}", path.display()))
}

pub fn parse_routes_str(json: &str, k_table: &KTable) -> Result<Vec<RouteAddition>> {
    let file: RoutesFile = serde_json::from_str(json).context("invalid routes JSON")?;
    file.edges
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let k = match record.data.k {
                Some(k) => k,
                None => k_table.for_color(&record.data.color).ok_or_else(|| {
                    anyhow!(
                        "route {i} ({}-{} {}) has no k and its color is not in the k table",
                        record.v1,
                        record.v2,
                        record.data.color
                    )
                })?,
            };
            let mut edge = TransitEdge::new(record.data.color, k)
                .with_capacity(record.data.capacity.unwrap_or(DEFAULT_CAPACITY));
            edge.price = record.data.price;
            if let Some(key) = record.data.key {
                edge = edge.with_key(key);
            }
            edge.validate().with_context(|| format!("route {i}"))?;
            Ok(RouteAddition {
                v1: record.v1,
                v2: record.v2,
                edge,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k_table() -> KTable {
        serde_json::from_str(r#"{"Metro": {"blue": 1}, "Bus": 2}"#).unwrap()
    }

    #[test]
    fn test_parse_in_order() {
        let json = r#"{"edges": [
            {"v1": "A", "v2": "B", "data": {"color": "blue", "capacity": 300, "price": null}},
            {"v1": "B", "v2": "C", "data": {"color": "Bus", "price": 5}},
            {"v1": "C", "v2": "D", "data": {"color": "green", "k": 0.5, "capacity": 50}}
        ]}"#;
        let routes = parse_routes_str(json, &k_table()).unwrap();
        assert_eq!(routes.len(), 3);

        assert_eq!(routes[0].to_string(), "A-B (blue)");
        assert_eq!(routes[0].edge.k, 1.0);
        assert_eq!(routes[0].edge.price, None);
        assert_eq!(routes[1].edge.k, 2.0);
        assert_eq!(routes[1].edge.capacity, DEFAULT_CAPACITY);
        assert_eq!(routes[2].edge.k, 0.5);
    }

    #[test]
    fn test_unknown_color_without_k_fails() {
        let json = r#"{"edges": [{"v1": "A", "v2": "B", "data": {"color": "green"}}]}"#;
        let err = parse_routes_str(json, &k_table()).unwrap_err();
        assert!(err.to_string().contains("route 0"));
    }

    #[test]
    fn test_apply_assigns_next_key() {
        let mut network = Network::new();
        network.add_edge("A", "B", TransitEdge::new("Bus", 2.0)).unwrap();
        let json = r#"{"edges": [{"v1": "B", "v2": "A", "data": {"color": "blue"}}]}"#;
        let routes = parse_routes_str(json, &k_table()).unwrap();
        let id = routes[0].apply(&mut network).unwrap();
        assert_eq!(network.edge(id).unwrap().key, "1");
    }
}
