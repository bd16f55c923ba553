//! skywatch CLI — airport restriction status tracker.
//!
//! Polls the announcement channel's feed mirror, maintains a per-airport
//! status history, and renders it as a static site.

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
