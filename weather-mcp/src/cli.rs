use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use weather_core::{Config, OpenWeatherClient, ToolDispatcher, WeatherServer, catalog};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-mcp", version, about = "OpenWeather tools over MCP stdio")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the weather tools on stdin/stdout (default).
    Serve {
        /// Timeout for each OpenWeather request, in seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Print the tool catalog as JSON.
    Tools,

    /// Store an OpenWeather API key in the config file.
    Configure,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command.unwrap_or(Command::Serve { timeout_secs: None }) {
            Command::Serve { timeout_secs } => serve(timeout_secs).await,
            Command::Tools => {
                let json = serde_json::to_string_pretty(catalog())
                    .context("Failed to encode tool catalog")?;
                println!("{json}");
                Ok(())
            }
            Command::Configure => configure(),
        }
    }
}

async fn serve(timeout_secs: Option<u64>) -> Result<()> {
    let mut config = Config::load()?.with_env();
    if timeout_secs.is_some() {
        config.timeout_secs = timeout_secs;
    }

    let gateway_config = config.gateway_config()?;
    info!(?gateway_config, "starting weather MCP server");

    let client = OpenWeatherClient::new(gateway_config)
        .context("Failed to build OpenWeather HTTP client")?;
    let server = WeatherServer::new(ToolDispatcher::new(Arc::new(client)));

    server.run_stdio().await.context("stdio transport failed")
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = inquire::Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .prompt()
        .context("Failed to read API key")?;

    config.set_api_key(api_key.trim().to_string());
    let path = config.save()?;

    println!("Saved API key to {}", path.display());
    Ok(())
}
