use anyhow::Result;
use clap::Parser;
use fleetbook::cli::Cli;
use fleetbook::config::{init_tracing, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env();
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    cli.run(settings).await
}
