use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fetchpool")]
#[command(about = "Asynchronous download service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the ingress API and the download processor
    Serve(ServeArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Path to the configuration file (defaults to config/fetchpool.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
