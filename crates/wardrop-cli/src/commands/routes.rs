use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tabwriter::TabWriter;
use wardrop_algo::enumerate_routes;
use wardrop_io::parse_network_file;

pub fn handle(network_path: &Path, max_hops: usize, max_routes: usize) -> Result<()> {
    let loaded = parse_network_file(network_path)?;
    let mut network = loaded.network;
    let routes = enumerate_routes(&mut network, &loaded.demands, max_hops, max_routes)
        .context("enumerating routes")?;

    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "DEMAND\tROUTE\tHOPS\tPATH")?;
    for ((i, candidates), demand) in routes.iter().zip(&loaded.demands) {
        for (j, route) in candidates.iter().enumerate() {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                if j == 0 { format!("{i}: {demand}") } else { String::new() },
                j,
                route.hops(),
                route.describe(&network)
            )?;
        }
    }
    writer.flush()?;

    if !routes.synthetic.is_empty() {
        println!(
            "\n{} demand(s) without a route within {max_hops} hops use a personal edge",
            routes.synthetic.len()
        );
    }
    println!("{} routes for {} demands", routes.total_routes(), routes.num_demands());
    Ok(())
}
