//! The pricing run behind `wardrop price`: load the network and the route
//! feed, then price one event per route addition.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};
use wardrop_algo::{
    event_metrics, verify_solution, LpOracle, PricingEngine, VerifyOptions,
};
use wardrop_io::{parse_network_file, parse_routes_file, ResultsFile};

use crate::config::RunConfig;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config: RunConfig,
    /// Re-check each committed solution
    pub verify: bool,
}

/// Event counts of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub events: usize,
    pub solved: usize,
    pub failed: usize,
    /// Violations found by `--verify`, summed over events
    pub violations: usize,
}

/// Price every route addition in order.
///
/// A failed event is logged and skipped: its metrics are not recorded and the
/// network keeps the new edge with unknown price. Only load and write errors
/// abort the run.
pub fn run_pricing(
    network_path: &Path,
    routes_path: &Path,
    results_path: &Path,
    options: &RunOptions,
) -> Result<RunSummary> {
    let loaded = parse_network_file(network_path)?;
    let additions = parse_routes_file(routes_path, &loaded.k_table)?;
    info!(
        stops = loaded.network.graph.node_count(),
        edges = loaded.network.graph.edge_count(),
        demands = loaded.demands.len(),
        additions = additions.len(),
        "loaded inputs"
    );

    let engine = PricingEngine::new(options.config.pricing.clone())
        .context("invalid pricing configuration")?;
    let verify_options = VerifyOptions::from(&options.config.pricing);
    let mut oracle = LpOracle::new(options.config.oracle.clone());
    let results = ResultsFile::new(results_path);
    let mut network = loaded.network;
    let mut summary = RunSummary::default();

    for (event, addition) in additions.iter().enumerate() {
        summary.events += 1;
        if let Err(e) = addition.apply(&mut network) {
            warn!(event, edge = %addition, error = %e, "could not add edge; skipping event");
            summary.failed += 1;
            continue;
        }

        let outcome = match engine.solve(&mut network, &loaded.demands, &mut oracle) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(event, edge = %addition, error = %e, "pricing failed; skipping event");
                summary.failed += 1;
                continue;
            }
        };
        summary.solved += 1;

        if options.verify {
            let report = verify_solution(
                &network,
                &outcome.routes,
                &loaded.demands,
                &outcome.solution,
                &verify_options,
            );
            for violation in &report.violations {
                warn!(event, %violation, "equilibrium check failed");
            }
            summary.violations += report.violations.len();
            debug!(
                event,
                edges = report.checked_edges,
                routes = report.checked_routes,
                "verified solution"
            );
        }

        let metrics = event_metrics(&network, outcome.solution.objective);
        results.append_metrics(metrics.revenue, metrics.avg_cost)?;
        info!(
            event,
            edge = %addition,
            strategy = %outcome.solution.strategy,
            revenue = metrics.revenue,
            avg_cost = ?metrics.avg_cost,
            "event priced"
        );
    }

    results.append_graph(&network)?;
    info!(
        events = summary.events,
        solved = summary.solved,
        failed = summary.failed,
        "run finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const NETWORK: &str = r#"{
        "networks": [{"name": "Bus", "nodes": ["A", "B"],
            "edges": [{"v1": "A", "v2": "B", "data": {"color": "Bus", "capacity": 200, "price": 5}}]}],
        "k": {"Metro": {"blue": 1}, "Bus": 2},
        "demands": [{"s": "A", "t": "B", "d": 10}]
    }"#;

    #[test]
    fn test_failed_event_does_not_abort_run() {
        let dir = tempdir().unwrap();
        let network = dir.path().join("network.json");
        let routes = dir.path().join("routes.json");
        let results = dir.path().join("results.json");
        fs::write(&network, NETWORK).unwrap();
        // the second addition reuses the key of the first and is rejected
        fs::write(
            &routes,
            r#"{"edges": [
                {"v1": "A", "v2": "B", "data": {"color": "blue", "capacity": 300}},
                {"v1": "A", "v2": "B", "data": {"color": "blue", "capacity": 300, "key": "1"}}
            ]}"#,
        )
        .unwrap();

        let options = RunOptions {
            verify: true,
            ..RunOptions::default()
        };
        let summary = run_pricing(&network, &routes, &results, &options).unwrap();
        assert_eq!(summary.events, 2);
        assert_eq!(summary.solved, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.violations, 0);

        let doc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&results).unwrap()).unwrap();
        assert_eq!(doc["metrics"]["revenue"].as_array().unwrap().len(), 1);
        assert_eq!(doc["graphs"].as_array().unwrap().len(), 1);
    }
}
