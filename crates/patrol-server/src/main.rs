//! Patrol tracking server - Entry Point

use anyhow::Result;
use clap::Parser;
use patrol_server::AppConfig;
use tracing::info;

/// Patrol location tracking server
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via PATROL_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the listen port from the configuration file
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    patrol_telemetry::init_logging()?;

    info!("Starting patrol server v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > PATROL_CONFIG env var > default file (or built-in defaults)
    let mut config = match args.config.or_else(|| std::env::var("PATROL_CONFIG").ok()) {
        Some(path) => {
            info!(config_path = %path, "Loading configuration");
            AppConfig::from_file(&path)?
        }
        None => AppConfig::load()?,
    };

    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate()?;

    patrol_server::run_server(config).await?;

    Ok(())
}
