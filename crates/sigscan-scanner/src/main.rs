//! Scanner entry point.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use sigscan_scanner::{replay, AppConfig, Application, LogSink, MemoryOutcomeStore};

/// Market scanner and signal generator
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via SIGSCAN_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Replay fixture file; the scanner runs against captured market data.
    /// Live transports plug in through the library API instead.
    #[arg(short, long)]
    replay: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    sigscan_telemetry::init_logging()?;

    info!("Starting sigscan v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > SIGSCAN_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("SIGSCAN_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = AppConfig::from_file(&config_path)?;

    info!(replay = %args.replay, "Loading replay fixtures");
    let gateway = Arc::new(replay::load_gateway(&args.replay)?);

    let app = Application::new(
        config,
        gateway,
        Arc::new(LogSink),
        Arc::new(MemoryOutcomeStore::new()),
    );
    app.run().await?;

    Ok(())
}
