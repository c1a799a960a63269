use std::sync::Arc;

use alerter::{TelegramAlerter, run_alerter_service};
use broker::{BrokerGateway, PaperBroker};
use clap::{Parser, Subcommand};
use engine::{TradingEngine, run_market_feed};
use market_data::market_channel;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// The main entry point for the zoneflow trading application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load notifier credentials and other secrets from .env, if present.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => run(&config).await,
        Commands::Probe { config, top } => probe(&config, top).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// An execution-zone scoring engine with risk-managed order lifecycle.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the trading loop against the configured broker.
    Run {
        /// Path to the TOML configuration file.
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Connect, report account and market state plus the best-scored
    /// zones, and exit without trading.
    Probe {
        /// Path to the TOML configuration file.
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// How many zones to report.
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn run(config_path: &str) -> anyhow::Result<()> {
    let config = configuration::load_config(config_path)?;
    let broker = build_broker(&config);

    let (market_tx, market_rx) = market_channel(1024);
    let (event_tx, event_rx) = broadcast::channel(256);

    if let Some(telegram) = TelegramAlerter::new(&config.telegram) {
        tokio::spawn(run_alerter_service(telegram, event_rx));
    }

    tokio::spawn(run_market_feed(
        Arc::clone(&broker),
        config.trading.symbol.clone(),
        config.trading.loop_interval_ms,
        market_tx,
    ));

    let mut engine = TradingEngine::new(config, broker, market_rx, event_tx).await?;
    engine.run().await?;
    Ok(())
}

async fn probe(config_path: &str, top: usize) -> anyhow::Result<()> {
    let config = configuration::load_config(config_path)?;
    let broker = build_broker(&config);
    engine::probe(&config, broker, top).await?;
    Ok(())
}

/// Selects the gateway implementation. Only the paper broker ships for
/// now; the flag exists so a live integration can be wired in without
/// touching the pipeline.
fn build_broker(config: &configuration::Config) -> Arc<dyn BrokerGateway> {
    if config.trading.live_trading_enabled {
        tracing::warn!("no live gateway is built in; falling back to the paper broker");
    }
    Arc::new(PaperBroker::new(config.broker.paper_starting_balance))
}
