mod cli;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    match Cli::parse().command {
        Commands::Serve(args) => fetchpool::server::run(args.config).await,
    }
}
