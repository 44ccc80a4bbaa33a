//! Binary crate for the `weather-mcp` server.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Logging setup (stderr only, stdout carries the protocol)
//! - Interactive configuration

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

#[tokio::main]
async fn main() {
    // A missing .env file is not an error.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cmd = cli::Cli::parse();
    if let Err(err) = cmd.run().await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
