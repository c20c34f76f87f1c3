mod cli;
mod probe;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    protoreg::observability::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Probe(args) => probe::run(args).await?,
        Commands::Rules(args) => probe::list_rules(args)?,
        Commands::Config(args) => probe::show_config(args)?,
    }

    Ok(())
}
