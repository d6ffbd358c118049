use anyhow::Result;
use app_config::PortfolioConfig;
use backtester::{Backtester, FeedEvent, print_report};
use chrono::Utc;
use clap::{Parser, Subcommand};
use core_types::{Candle, Symbol};
use engine::Engine;
use events::EventBus;
use gateway::Gateway;
use ledger::Ledger;
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use simulator::Simulator;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use strategies::factory::create_strategies;
use tracing_subscriber::prelude::*;

mod data;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "A multi-strategy trading engine.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the engine in paper-trading mode against the simulated
    /// exchange, with the full worker + risk-controller lifecycle.
    Run,

    /// Replays historical candles through the market simulator.
    Backtest {
        /// The symbol to backtest (e.g. "ETH").
        #[arg(short, long)]
        symbol: String,

        /// CSV candle file (timestamp_ms,open,high,low,close,volume).
        /// When omitted, a deterministic synthetic series is generated.
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Number of synthetic candles when no data file is given.
        #[arg(long, default_value_t = 2_000)]
        steps: usize,

        /// Where to write the JSON report.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    let cli = Cli::parse();
    tracing::info!("Starting Aegis.");

    match cli.command {
        Commands::Run => run_app().await?,
        Commands::Backtest {
            symbol,
            data,
            steps,
            out,
        } => handle_backtest(symbol, data, steps, out).await?,
    }

    tracing::info!("Aegis finished.");
    Ok(())
}

// --- "Run" Subcommand Logic ---

/// Starts the full engine: one worker per configured strategy plus the
/// risk controller, all trading through the simulated exchange. Runs until
/// Ctrl-C, then shuts down gracefully.
async fn run_app() -> Result<()> {
    let settings = app_config::load_settings()?;
    let portfolio = app_config::load_portfolio_config()?;
    tracing::info!("Application settings loaded successfully.");

    let bus = EventBus::new(1024);
    let simulator = Arc::new(Simulator::new(settings.simulator.clone(), bus.clone()));
    let initial_cash =
        Decimal::from_f64(settings.simulator.initial_cash).unwrap_or(Decimal::ONE_THOUSAND);
    let ledger = Arc::new(Ledger::new(initial_cash));

    // The event logger plays the part of the external reporting consumer.
    let mut events_rx = bus.subscribe();
    let event_logger = tokio::spawn(async move {
        while let Ok(event) = events_rx.recv().await {
            tracing::info!(?event, "Event published.");
        }
    });

    // Paper mode has no live feed, so drive the simulator with a synthetic
    // price stream.
    let feed = spawn_paper_feed(Arc::clone(&simulator), &portfolio);

    let mut trading_engine = Engine::new(
        Arc::clone(&simulator) as Arc<dyn Gateway>,
        ledger,
        bus,
        settings.risk.clone(),
    );
    trading_engine.start(&portfolio)?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received; shutting down.");

    for (worker, updates) in trading_engine.drain_updates() {
        tracing::info!(worker = %worker, count = updates.len(), "Undrained worker updates.");
    }
    trading_engine.stop().await;
    feed.abort();
    event_logger.abort();
    Ok(())
}

/// Pushes one synthetic candle per second per configured symbol into the
/// simulator so workers always have prices to poll.
fn spawn_paper_feed(
    simulator: Arc<Simulator>,
    portfolio: &PortfolioConfig,
) -> tokio::task::JoinHandle<()> {
    let symbols: Vec<Symbol> = portfolio
        .workers
        .iter()
        .filter(|w| w.enabled)
        .map(|w| Symbol::new(w.symbol.clone()))
        .collect();
    let base_price = 1_000.0;
    let amplitude = 50.0;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        let mut step = 0u64;
        loop {
            interval.tick().await;
            let phase = 2.0 * std::f64::consts::PI * step as f64 / 240.0;
            let close = Decimal::from_f64(base_price + amplitude * phase.sin())
                .unwrap_or_default()
                .round_dp(4);
            let candle = Candle {
                timestamp_ms: Utc::now().timestamp_millis(),
                open: close,
                high: close,
                low: close,
                close,
                volume: Decimal::ONE_THOUSAND,
            };
            for symbol in &symbols {
                simulator.update_market_state(symbol, &candle);
            }
            step += 1;
        }
    })
}

// --- "Backtest" Subcommand Logic ---

async fn handle_backtest(
    symbol_str: String,
    data_path: Option<PathBuf>,
    steps: usize,
    out: Option<PathBuf>,
) -> Result<()> {
    let settings = app_config::load_settings()?;
    let portfolio = app_config::load_portfolio_config()?;
    let symbol = Symbol::new(symbol_str);

    // --- 1. Instantiate the simulator and orchestrator ---
    let bus = EventBus::new(1024);
    let simulator = Simulator::new(settings.simulator.clone(), bus);
    let mut backtester = Backtester::new(simulator).with_risk(settings.risk.clone());

    // --- 2. Register the strategies configured for this symbol ---
    let mut registered = 0;
    for entry in portfolio
        .workers
        .iter()
        .filter(|w| w.enabled && w.symbol == symbol.0)
    {
        for strategy in create_strategies(&entry.strategies)? {
            tracing::info!(strategy = strategy.name(), "Registering strategy for backtest.");
            backtester.register_strategy(symbol.clone(), entry.timeframe.clone(), strategy);
            registered += 1;
        }
    }
    if registered == 0 {
        anyhow::bail!(
            "No enabled strategies configured for symbol {} in engine.toml.",
            symbol.0
        );
    }

    // --- 3. Load or generate the candle feed ---
    let candles = match data_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading candles from CSV.");
            data::load_candles_csv(&path)?
        }
        None => {
            tracing::info!(steps, "No data file given; generating a synthetic series.");
            backtester::data::synthetic_candles(steps, 0, 60_000, 1_000.0, 100.0, 48)
        }
    };
    let feed = FeedEvent::stream(symbol, candles);

    // --- 4. Run and report ---
    let report = backtester.run(&feed).await?;
    print_report(&report);

    if let Some(out) = out {
        std::fs::write(&out, serde_json::to_string_pretty(&report)?)?;
        tracing::info!(path = %out.display(), "Backtest report saved.");
    }
    Ok(())
}
