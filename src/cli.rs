use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "protoreg")]
#[command(about = "Protocol registry CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open a URL through the installed registry and report the initialized connection
    Probe(ProbeArgs),
    /// List configured rules in evaluation order
    Rules(ConfigArgs),
    /// Print the effective configuration (file + environment) as TOML
    Config(ConfigArgs),
}

#[derive(clap::Args, Debug)]
pub struct ProbeArgs {
    /// URL to open
    pub url: String,

    /// Configuration file (defaults to $PROTOREG_CONFIG or config/protoreg.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Route the connection through this HTTP proxy ("DIRECT" for none)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Send a GET request after initialization (http/https only)
    #[arg(long)]
    pub send: bool,
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// Configuration file (defaults to $PROTOREG_CONFIG or config/protoreg.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
