use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use tracing::info;
use wardrop_cli::config::RunConfig;
use wardrop_cli::run::{run_pricing, RunOptions};

pub fn handle(
    network: &Path,
    routes: &Path,
    results: &Path,
    config: Option<&Path>,
    max_hops: Option<usize>,
    direct_timeout_ms: Option<u64>,
    verify: bool,
) -> Result<()> {
    let mut config = RunConfig::load_or_default(config)?;
    if let Some(max_hops) = max_hops {
        config.pricing.max_hops = max_hops;
    }
    if let Some(ms) = direct_timeout_ms {
        config.pricing.direct_timeout_ms = ms;
    }
    info!(
        solver = config.oracle.solver.as_str(),
        strategies = ?config.pricing.strategies,
        "pricing {}",
        network.display()
    );

    let start = Instant::now();
    let summary = run_pricing(network, routes, results, &RunOptions { config, verify })?;

    println!("Pricing run:");
    println!("  Events : {}", summary.events);
    println!("  Solved : {}", summary.solved);
    println!("  Failed : {}", summary.failed);
    if verify {
        println!("  Violations : {}", summary.violations);
    }
    println!("  Time   : {} ms", start.elapsed().as_millis());
    println!("\nResults written to {}", results.display());
    Ok(())
}
