//! ir-stream: keep a set of Independent Reserve channels subscribed and log
//! the latest values until interrupted.

use anyhow::{anyhow, Result};
use clap::Parser;
use ir_client::{ClientConfig, MarketDataClient};
use std::time::Duration;
use tracing::{info, warn};

/// Independent Reserve market data stream
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via IR_STREAM_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Currency pair to follow, e.g. `xbt/aud` (repeatable)
    #[arg(short, long = "pair", value_name = "PRIMARY/SECONDARY")]
    pairs: Vec<String>,

    /// Also subscribe to account balances (needs IR_API_KEY / IR_API_SECRET)
    #[arg(long)]
    balance: bool,

    /// Seconds between status reports
    #[arg(long, default_value_t = 10)]
    report_secs: u64,
}

fn parse_pair(pair: &str) -> Result<(String, String)> {
    let (primary, secondary) = pair
        .split_once('/')
        .ok_or_else(|| anyhow!("invalid pair {pair:?}, expected PRIMARY/SECONDARY"))?;
    Ok((primary.trim().to_string(), secondary.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    ir_ws::init_crypto();

    let args = Args::parse();

    ir_client::init_logging()?;

    info!("Starting ir-stream v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > IR_STREAM_CONFIG env var > defaults
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var("IR_STREAM_CONFIG").ok());

    let config = match &config_path {
        Some(path) => {
            info!(config_path = %path, "Loading configuration");
            ClientConfig::from_file(path)?
        }
        None => ClientConfig::default(),
    }
    .with_env_credentials();
    info!(?config, "Configuration loaded");

    let pairs = args
        .pairs
        .iter()
        .map(|p| parse_pair(p))
        .collect::<Result<Vec<_>>>()?;

    let client = MarketDataClient::new(config)?;
    client.connect()?;

    let mut report = tokio::time::interval(Duration::from_secs(args.report_secs.max(1)));

    loop {
        tokio::select! {
            _ = report.tick() => {
                // Re-requesting keeps the subscriptions from expiring.
                for (primary, secondary) in &pairs {
                    if let Err(e) = client.subscribe_ticker(primary, secondary).await {
                        warn!(%primary, %secondary, error = %e, "Ticker subscribe failed");
                    }
                    match client.get_latest_ticker(primary, secondary) {
                        Some(t) => info!(
                            pair = %format!("{primary}/{secondary}"),
                            last = ?t.last_price,
                            bid = ?t.best_bid,
                            ask = ?t.best_ask,
                            "Ticker"
                        ),
                        None => info!(pair = %format!("{primary}/{secondary}"), "No ticker yet"),
                    }
                }

                if args.balance {
                    if let Err(e) = client.subscribe_balance().await {
                        warn!(error = %e, "Balance subscribe failed");
                    }
                    for balance in client.get_balances() {
                        info!(
                            currency = %balance.currency_code,
                            available = ?balance.available_balance,
                            total = ?balance.total_balance,
                            "Balance"
                        );
                    }
                }

                let stats = client.router_stats();
                info!(
                    state = ?client.state(),
                    active = client.active_subscriptions().len(),
                    stored = stats.stored(),
                    dropped = stats.dropped(),
                    server_errors = stats.server_errors(),
                    "Status"
                );
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    client.stop();
    client.join().await;
    info!("Shutdown complete");

    Ok(())
}
