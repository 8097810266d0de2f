//! Tailend - Main Entry Point
//!
//! Runs the tail-end strategy either as a historical replay or as a dry-run
//! live session against Polymarket market data.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tailend::backtest::{load_snapshots, BacktestSimulator};
use tailend::common::channels::{create_event_channel_with_size, create_shutdown_channel, LiveEvent};
use tailend::config::{load_config, AppConfig};
use tailend::live::{run_source, DryRunExecutor, Orchestrator};
use tailend::polymarket::{PolymarketRestClient, SnapshotFeed};
use tailend::strategy::{FeeSchedule, TailEndStrategy};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay historical snapshots and write a report
    Backtest {
        /// JSON array of snapshot records
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the JSON report
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Starting capital in USD
        #[arg(long)]
        capital: Option<Decimal>,
    },
    /// Trade live market data with the dry-run executor until Ctrl-C
    Live {
        /// Capital in USD
        #[arg(long)]
        capital: Option<Decimal>,
    },
}

fn init_logging(level: &str) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let mut config = load_config(Some(args.config.as_str())).context("invalid configuration")?;
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.settings.log_level.clone());
    init_logging(&level)?;

    info!("Starting tailend");
    info!("Configuration file: {}", args.config);

    match args.command {
        Command::Backtest {
            input,
            output,
            capital,
        } => {
            if let Some(capital) = capital {
                config.backtest.initial_capital = capital;
            }
            run_backtest(&config, input, output)
        }
        Command::Live { capital } => {
            let capital = capital.unwrap_or(config.backtest.initial_capital);
            run_live(&config, capital).await
        }
    }
}

fn run_backtest(config: &AppConfig, input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let set = load_snapshots(&input)
        .with_context(|| format!("failed to load snapshots from {}", input.display()))?;

    let strategy = TailEndStrategy::new(config.strategy.clone());
    let report = BacktestSimulator::new(strategy, config).run(set.snapshots)?;

    let summary = &report.summary;
    info!(
        trades = summary.total_trades,
        wins = summary.wins,
        win_rate = %summary.win_rate.round_dp(4),
        total_pnl = %summary.total_pnl.round_dp(2),
        total_fees = %summary.total_fees.round_dp(2),
        max_drawdown = %summary.max_drawdown.round_dp(4),
        open_positions = report.open_positions.len(),
        "Backtest complete"
    );

    match output {
        Some(path) => {
            report
                .write_json(&path)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            info!("Report written to {}", path.display());
            println!("{}", summary.summary_text());
        }
        None => println!("{}", report.to_json()?),
    }
    Ok(())
}

async fn run_live(config: &AppConfig, capital: Decimal) -> Result<()> {
    let (event_tx, event_rx) = create_event_channel_with_size(config.settings.event_channel_size);
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let executor = DryRunExecutor::new(event_tx.clone(), FeeSchedule::from_config(&config.strategy));
    let strategy = TailEndStrategy::new(config.strategy.clone());
    let (orchestrator, tracked_rx) = Orchestrator::new(strategy, executor, config, capital, event_rx);

    let client = PolymarketRestClient::from_config(&config.feed)?;
    let feed = SnapshotFeed::new(client, config.feed.clone());
    let feed_handle = tokio::spawn(run_source(
        feed,
        Duration::from_secs(config.feed.poll_interval_seconds),
        event_tx.clone(),
        tracked_rx,
        shutdown_rx,
    ));
    let mut orchestrator_handle = tokio::spawn(orchestrator.run());

    info!("Live session running (dry run), press Ctrl-C to stop");
    let session = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Received shutdown signal, cleaning up...");
            shutdown_tx.send(true).ok();
            feed_handle.await?;
            // The orchestrator may already have stopped on its own
            event_tx.send(LiveEvent::Shutdown).await.ok();
            orchestrator_handle.await??
        }
        finished = &mut orchestrator_handle => {
            shutdown_tx.send(true).ok();
            finished??
        }
    };

    info!(
        snapshots = session.snapshots,
        orders = session.orders,
        trades = session.trades.len(),
        open_positions = session.open_positions.len(),
        "Shutdown complete. Open positions will settle at resolution."
    );
    Ok(())
}
