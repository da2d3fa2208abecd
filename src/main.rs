//! evalstream - concurrent evaluation runner with live progress fan-out

use anyhow::Result;
use clap::Parser;

mod builtin;
mod cli;
mod sources;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .init();

    cli::dispatch(cli).await
}
