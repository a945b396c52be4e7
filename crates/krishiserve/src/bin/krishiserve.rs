//! krishiserve binary entry point

use clap::Parser;
use krishiserve::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    Cli::parse().run().await
}
