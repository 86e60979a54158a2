use clap::Parser;
use tracing::error;
use tracing_subscriber::FmtSubscriber;
use wardrop_cli::cli::{Cli, Commands};

mod commands;

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let result = match &cli.command {
        Commands::Price {
            network,
            routes,
            results,
            config,
            max_hops,
            direct_timeout_ms,
            verify,
        } => commands::price::handle(
            network,
            routes,
            results,
            config.as_deref(),
            *max_hops,
            *direct_timeout_ms,
            *verify,
        ),
        Commands::Routes {
            network,
            max_hops,
            max_routes,
        } => commands::routes::handle(network, *max_hops, *max_routes),
        Commands::Validate { network, routes } => {
            commands::validate::handle(network, routes.as_deref())
        }
    };

    if let Err(e) = result {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
