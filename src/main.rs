//! hepascreen - Main Entry Point

use clap::Parser;
use hepascreen::cli::{run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hepascreen=info".into()),
        )
        .init();

    run(Cli::parse()).await
}
