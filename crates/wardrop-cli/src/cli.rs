use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "wardrop", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Price every route addition of a feed and record the results
    Price {
        /// Network JSON (networks, k table, demands)
        #[arg(value_hint = ValueHint::FilePath)]
        network: PathBuf,
        /// Route-addition feed JSON, applied in order
        #[arg(value_hint = ValueHint::FilePath)]
        routes: PathBuf,
        /// Results JSON; metrics and the final graph are appended
        #[arg(value_hint = ValueHint::FilePath)]
        results: PathBuf,
        /// TOML file with [pricing] and [oracle] tables
        #[arg(long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
        /// Override the route hop bound
        #[arg(long)]
        max_hops: Option<usize>,
        /// Override the direct optimization budget (milliseconds)
        #[arg(long)]
        direct_timeout_ms: Option<u64>,
        /// Re-check every committed solution and log violations
        #[arg(long)]
        verify: bool,
    },
    /// Print the candidate routes of every demand
    Routes {
        /// Network JSON
        #[arg(value_hint = ValueHint::FilePath)]
        network: PathBuf,
        /// Override the route hop bound
        #[arg(long, default_value_t = 3)]
        max_hops: usize,
        /// Routes kept per demand
        #[arg(long, default_value_t = 8)]
        max_routes: usize,
    },
    /// Parse a network (and optionally a route feed) and report findings
    Validate {
        /// Network JSON
        #[arg(value_hint = ValueHint::FilePath)]
        network: PathBuf,
        /// Route-addition feed to parse against the network's k table
        #[arg(long, value_hint = ValueHint::FilePath)]
        routes: Option<PathBuf>,
    },
}
