use std::path::Path;

use anyhow::Result;
use wardrop_core::find_islands;
use wardrop_io::helpers::Severity;
use wardrop_io::{parse_network_file, parse_routes_file, validate_network, ValidationConfig};

pub fn handle(network_path: &Path, routes_path: Option<&Path>) -> Result<()> {
    let mut loaded = parse_network_file(network_path)?;
    validate_network(
        &loaded.network,
        &loaded.demands,
        &mut loaded.diagnostics,
        &ValidationConfig::default(),
    );

    println!("Network file is valid: {}", network_path.display());
    println!("  {}", loaded.network.stats());
    println!("  {} demands", loaded.demands.len());
    let islands = find_islands(&loaded.network);
    println!("  {} island(s)", islands.len());
    if islands.len() > 1 {
        for island in &islands {
            println!("    #{}: {}", island.island_id, island.stops.join(", "));
        }
    }

    if let Some(routes_path) = routes_path {
        let routes = parse_routes_file(routes_path, &loaded.k_table)?;
        println!("Routes file is valid: {}", routes_path.display());
        println!("  {} route additions", routes.len());
        for (i, route) in routes.iter().enumerate() {
            let price = route
                .edge
                .price
                .map_or_else(|| "unknown".to_string(), |p| p.to_string());
            println!("    {i}: {route} k={} price={price}", route.edge.k);
        }
    }

    for issue in &loaded.diagnostics.issues {
        let label = match issue.severity {
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        };
        match &issue.entity {
            Some(entity) => println!("  {label}: {entity}: {}", issue.message),
            None => println!("  {label}: {}", issue.message),
        }
    }
    Ok(())
}
