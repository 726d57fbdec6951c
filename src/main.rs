//! Adaptive Perp Trading Agent
//!
//! A regime-aware decision engine for leveraged perpetual futures that:
//! - Classifies the market (trending / mean-reverting / random) each tick
//! - Runs one of three strategies gated by the detected regime
//! - Sizes positions with volatility-scaled Kelly bounds
//! - Enforces stop-loss, take-profit, leverage, and daily-loss limits

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tokio::signal;
use tracing::{info, warn};

use adaptive_perp_bot::agent::TradingAgent;
use adaptive_perp_bot::config::AgentConfig;
use adaptive_perp_bot::execution::PaperExecutor;
use adaptive_perp_bot::feeds::SyntheticFeed;
use adaptive_perp_bot::telemetry::{init_logging, TracingAuditSink};

/// Adaptive perpetual-futures trading agent
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Force paper trading mode (no real orders)
    #[arg(long)]
    paper: bool,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,

    /// Starting price for the synthetic feed
    #[arg(long, default_value_t = 100.0)]
    start_price: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AgentConfig::load(&args.config)?;
    if args.paper {
        config.paper_trading = true;
    }
    if let Some(level) = args.log_level {
        config.telemetry.log_level = level;
    }

    init_logging(&config.telemetry)?;

    info!(
        "Starting adaptive perp agent v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!("Strategy: {}", config.strategy.kind);
    info!("Paper trading: {}", config.paper_trading);
    if !config.paper_trading {
        warn!("Live execution is not wired up; forcing paper trading");
        config.paper_trading = true;
    }

    let executor = PaperExecutor::new(config.trading.budget);
    let feed = SyntheticFeed::new(args.start_price, 0.002, 0xC0FFEE);

    let mut agent = TradingAgent::new(
        config,
        Box::new(feed),
        Box::new(executor.clone()),
        Box::new(executor),
        Box::new(TracingAuditSink),
    );

    // Cooperative shutdown on Ctrl-C
    let running = agent.shutdown_handle();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            running.store(false, Ordering::SeqCst);
        }
    });

    agent.run().await?;
    info!("Agent stopped");
    Ok(())
}
