//! Post-import consistency checks.
//!
//! Nothing here rejects a network; findings are reported through
//! [`ImportDiagnostics`] so `wardrop validate` can show them and the pricing
//! run can still proceed (unreachable demands get a personal edge anyway).

use wardrop_core::{find_islands, simple_paths, Demand, Network};

use super::diagnostics::ImportDiagnostics;

/// Configuration for network validation behavior
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Hop bound used to flag demands that will need a personal edge
    pub max_hops: usize,
    /// Skip island detection
    pub skip_topology: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_hops: 3,
            skip_topology: false,
        }
    }
}

/// Validate a network and its demands, appending findings to `diag`.
pub fn validate_network(
    network: &Network,
    demands: &[Demand],
    diag: &mut ImportDiagnostics,
    config: &ValidationConfig,
) {
    if network.graph.edge_count() == 0 {
        diag.add_warning("structure", "network has no edges");
    }

    for id in network.edge_ids() {
        let Some(edge) = network.edge(id) else {
            continue;
        };
        if let Err(e) = edge.validate() {
            diag.add_error("validation", &e.to_string());
        }
        if edge.capacity == 0.0 {
            let (u, v) = network.endpoint_names(id).unwrap_or(("?", "?"));
            diag.add_warning(
                "validation",
                &format!("edge {u}-{v} ({}) has zero capacity", edge.color),
            );
        }
    }

    if !config.skip_topology {
        let islands = find_islands(network);
        if islands.len() > 1 {
            diag.add_warning(
                "topology",
                &format!("network splits into {} islands", islands.len()),
            );
        }
    }

    for demand in demands {
        if let Err(e) = demand.validate() {
            diag.add_error("validation", &e.to_string());
            continue;
        }
        if demand.s == demand.t {
            diag.add_warning("demand", &format!("demand {demand} starts at its target"));
            continue;
        }
        let reachable = match (network.stop(&demand.s), network.stop(&demand.t)) {
            (Some(s), Some(t)) => !simple_paths(network, s, t, config.max_hops).is_empty(),
            _ => false,
        };
        if !reachable {
            diag.add_warning(
                "demand",
                &format!(
                    "demand {demand} has no route within {} hops; a personal edge will be added",
                    config.max_hops
                ),
            );
        }
    }
}
