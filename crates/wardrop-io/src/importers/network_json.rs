use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::debug;
use wardrop_core::{Demand, Network, TransitEdge, DEFAULT_CAPACITY};

use super::{read_input, EdgeRecord, KTable};
use crate::helpers::{ImportDiagnostics, ImportResult};

#[derive(Debug, Deserialize)]
struct NetworkFile {
    networks: Vec<SubNetwork>,
    #[serde(default)]
    k: KTable,
    #[serde(default)]
    demands: Vec<Demand>,
}

#[derive(Debug, Deserialize)]
struct SubNetwork {
    #[serde(default)]
    name: String,
    #[serde(default)]
    nodes: Vec<String>,
    #[serde(default)]
    edges: Vec<EdgeRecord>,
}

/// Load a network file with its demands.
pub fn parse_network_file(path: impl AsRef<Path>) -> Result<ImportResult> {
    let path = path.as_ref();
    let json = read_input(path, "network")?;
    parse_network_str(&json).with_context(|| format!("parsing network file {}", path.display()))
}

/// Parse network JSON already in memory.
pub fn parse_network_str(json: &str) -> Result<ImportResult> {
    let file: NetworkFile = serde_json::from_str(json).context("invalid network JSON")?;
    let mut network = Network::new();
    let mut diagnostics = ImportDiagnostics::new();

    for sub in &file.networks {
        for stop in &sub.nodes {
            network.add_stop(stop);
        }
        for record in &sub.edges {
            let entity = format!("edge {}-{} ({})", record.v1, record.v2, record.data.color);
            let k = match record.data.k {
                Some(k) => k,
                None => file.k.for_network(&sub.name, &record.data.color).ok_or_else(|| {
                    anyhow!(
                        "{entity} in network '{}' has no k and none in the root k table",
                        sub.name
                    )
                })?,
            };
            let capacity = record.data.capacity.unwrap_or_else(|| {
                diagnostics.add_default(
                    &entity,
                    &format!("capacity missing, using {DEFAULT_CAPACITY}"),
                );
                DEFAULT_CAPACITY
            });

            let mut edge = TransitEdge::new(record.data.color.clone(), k).with_capacity(capacity);
            edge.price = record.data.price;
            if let Some(key) = &record.data.key {
                edge = edge.with_key(key.clone());
            }
            network
                .add_edge(&record.v1, &record.v2, edge)
                .with_context(|| format!("adding {entity}"))?;
        }
    }

    for demand in &file.demands {
        demand
            .validate()
            .with_context(|| format!("invalid demand {demand}"))?;
    }

    let stats = network.stats();
    diagnostics.stats.networks = file.networks.len();
    diagnostics.stats.stops = stats.num_stops;
    diagnostics.stats.edges = stats.num_edges;
    diagnostics.stats.unpriced_edges = stats.num_unpriced;
    diagnostics.stats.demands = file.demands.len();
    debug!(
        networks = file.networks.len(),
        stops = stats.num_stops,
        edges = stats.num_edges,
        demands = file.demands.len(),
        "loaded network"
    );

    Ok(ImportResult {
        network,
        demands: file.demands,
        k_table: file.k,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"{
        "networks": [
            {"name": "Metro", "nodes": ["A", "B", "C"],
             "edges": [
                {"v1": "A", "v2": "C", "data": {"color": "red", "capacity": 100, "price": 5}},
                {"v1": "B", "v2": "C", "data": {"color": "blue", "price": null}}
             ]},
            {"name": "Bus", "nodes": ["A", "C", "D", "E"],
             "edges": [
                {"v1": "A", "v2": "C", "data": {"color": "Bus", "capacity": 200, "price": 5, "k": 2}},
                {"v1": "D", "v2": "E", "data": {"color": "Bus", "capacity": 200}}
             ]}
        ],
        "k": {"Metro": {"red": 1, "blue": 1}, "Bus": 2},
        "demands": [{"s": "A", "t": "E", "d": 400}]
    }"#;

    #[test]
    fn test_parse_example() {
        let result = parse_network_str(EXAMPLE).unwrap();
        let network = &result.network;
        assert_eq!(network.graph.node_count(), 5);
        assert_eq!(network.graph.edge_count(), 4);

        let a = network.stop("A").unwrap();
        let c = network.stop("C").unwrap();
        let between = network.edges_between(a, c);
        assert_eq!(between.len(), 2);
        let red = network.edge(between[0]).unwrap();
        assert_eq!(
            (red.color.as_str(), red.capacity, red.price, red.k, red.key.as_str()),
            ("red", 100.0, Some(5.0), 1.0, "0")
        );
        let bus = network.edge(between[1]).unwrap();
        assert_eq!(
            (bus.color.as_str(), bus.capacity, bus.price, bus.k, bus.key.as_str()),
            ("Bus", 200.0, Some(5.0), 2.0, "1")
        );

        assert_eq!(result.demands, vec![Demand::new("A", "E", 400.0)]);
        assert_eq!(result.diagnostics.stats.unpriced_edges, 2);
        assert_eq!(result.diagnostics.stats.defaulted_values, 1);
    }

    #[test]
    fn test_k_from_root_table() {
        let result = parse_network_str(EXAMPLE).unwrap();
        let network = &result.network;
        let d = network.stop("D").unwrap();
        let e = network.stop("E").unwrap();
        let bus = network.edge(network.edges_between(d, e)[0]).unwrap();
        assert_eq!(bus.k, 2.0);
        assert_eq!(bus.price, None);
    }

    #[test]
    fn test_unresolvable_k_is_an_error() {
        let json = r#"{"networks": [{"name": "Metro", "nodes": ["A", "B"],
            "edges": [{"v1": "A", "v2": "B", "data": {"color": "green"}}]}],
            "k": {"Metro": {"red": 1}}}"#;
        let err = parse_network_str(json).unwrap_err();
        assert!(err.to_string().contains("has no k"));
    }

    #[test]
    fn test_negative_demand_is_rejected() {
        let json = r#"{"networks": [], "demands": [{"s": "A", "t": "B", "d": -3}]}"#;
        assert!(parse_network_str(json).is_err());
    }

    #[test]
    fn test_missing_required_field() {
        let json = r#"{"networks": [{"name": "Bus", "edges": [{"v1": "A", "data": {"color": "Bus", "k": 2}}]}]}"#;
        assert!(parse_network_str(json).is_err());
    }
}
