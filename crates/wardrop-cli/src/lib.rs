pub mod cli;
pub mod config;
pub mod run;

pub use cli::{Cli, Commands};
pub use config::RunConfig;
pub use run::{run_pricing, RunOptions, RunSummary};
