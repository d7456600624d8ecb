//! stream-cache-sim: drives shared block caches with in-memory producers and
//! readers and prints a JSON report of the final state.

use clap::Parser;
use tracing::info;

use stream_block_cache::config::{Cli, Config};
use stream_block_cache::sim::run_simulation;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "stream_block_cache=debug"
    } else {
        "stream_block_cache=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("stream-cache-sim v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(&cli.config)?;
    if let Some(resources) = cli.resources {
        config.simulation.resources = resources;
    }
    if let Some(blocks) = cli.blocks {
        config.simulation.blocks_per_resource = blocks;
    }
    config.validate()?;

    info!(
        block_bytes = config.block_bytes(),
        resources = config.simulation.resources,
        blocks = config.simulation.blocks_per_resource,
        budget_bytes = config.total_budget_bytes(),
        "Configuration loaded"
    );

    let report = run_simulation(&config);
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
