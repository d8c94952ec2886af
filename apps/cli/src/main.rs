//! contentpub CLI: serve the publish API, or publish from the command line.
//!
//! Commits structured content items to a Git-hosted static site and keeps
//! each section's `index.json` manifest in step.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
