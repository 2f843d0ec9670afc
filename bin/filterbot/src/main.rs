//! FilterBot command line.
//!
//! - `live` runs the candle and exit pollers against Binance futures (or the paper
//!   exchange when `TRADING_MODE=paper`) until Ctrl-C.
//! - `backtest` replays monthly 1-minute kline CSVs for one coin and prints a JSON report.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use backtest::{evaluate, load_segments, BacktestConfig, CostModel};
use common::{BotConfig, Config, FuturesExchange, LogNotifier, Notifier, TradingMode};
use engine::{load_plans, BinanceFuturesClient, Engine, LiveTrader, SqliteTradeStore};
use paper::PaperExchange;
use strategy::ParameterSet;
use telegram_notify::TelegramNotifier;

#[derive(Parser)]
#[command(name = "filterbot", about = "Weighted multi-indicator futures trading bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trade the coins in the bot config until Ctrl-C.
    Live,
    /// Backtest one parameter file over monthly 1-minute kline CSVs.
    Backtest {
        /// Coin label for the report, e.g. BTCUSDT.
        #[arg(long)]
        coin: String,

        /// Parameter file (`{"parameters": {...}}`).
        #[arg(long)]
        params: PathBuf,

        /// One CSV per month, in chronological order.
        #[arg(long, required = true, num_args = 1..)]
        data: Vec<PathBuf>,

        #[arg(long, default_value_t = 1000.0)]
        initial_balance: f64,

        #[arg(long, default_value_t = 100.0)]
        margin: f64,

        #[arg(long, default_value_t = 1.0)]
        leverage: f64,

        /// Ignore fees, slippage and spread.
        #[arg(long, default_value_t = false)]
        frictionless: bool,

        /// Include every trade in the report.
        #[arg(long, default_value_t = false)]
        trades: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Commands::Live => run_live().await,
        Commands::Backtest { coin, params, data, initial_balance, margin, leverage, frictionless, trades } => {
            let config = BacktestConfig {
                initial_balance,
                margin_per_trade: margin,
                leverage,
                costs: if frictionless { CostModel::frictionless() } else { CostModel::default() },
                ..BacktestConfig::default()
            };
            run_backtest(&coin, &params, &data, config, trades)
        }
    }
}

fn run_backtest(coin: &str, params: &Path, data: &[PathBuf], config: BacktestConfig, with_trades: bool) -> Result<()> {
    let params = ParameterSet::load(params)?;
    let segments = load_segments(data)?;
    info!(coin, files = segments.len(), combo = ?params.timeframes(), "backtest starting");

    let evaluation = evaluate(coin, &params, config, &segments)?;
    let mut report = json!({
        "coin": coin,
        "score": evaluation.score,
        "initial_balance": evaluation.result.initial_balance,
        "final_balance": evaluation.result.final_balance,
        "rejected_signals": evaluation.result.rejected_signals,
        "metrics": evaluation.metrics,
    });
    if with_trades {
        report["trades"] = serde_json::to_value(&evaluation.result.trades)?;
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_live() -> Result<()> {
    let cfg = Config::from_env().context("reading environment")?;
    let bot = BotConfig::load(&cfg.bot_config_path)
        .with_context(|| format!("loading {}", cfg.bot_config_path.display()))?;
    info!(mode = %cfg.trading_mode, coins = bot.coins.len(), "FilterBot starting");

    let store = Arc::new(SqliteTradeStore::connect(&cfg.database_url).await.context("opening trade database")?);

    let timeout = Duration::from_secs(bot.api_timeout_secs);
    let binance: Arc<dyn FuturesExchange> = Arc::new(BinanceFuturesClient::new(
        &cfg.binance_api_key,
        &cfg.binance_secret,
        cfg.binance_testnet,
        timeout,
    )?);
    let exchange: Arc<dyn FuturesExchange> = match cfg.trading_mode {
        TradingMode::Live => binance,
        TradingMode::Paper => {
            info!(balance = cfg.paper_balance, slippage_bps = cfg.paper_slippage_bps, "paper mode, fills are simulated");
            Arc::new(PaperExchange::new(binance, cfg.paper_balance, cfg.paper_slippage_bps, bot.fee_rate))
        }
    };

    let notifier: Arc<dyn Notifier> = match &cfg.telegram_token {
        Some(token) if !cfg.telegram_chat_ids.is_empty() => {
            Arc::new(TelegramNotifier::new(token.clone(), &cfg.telegram_chat_ids))
        }
        _ => {
            info!("Telegram not configured, alerts go to the log");
            Arc::new(LogNotifier)
        }
    };

    let plans = load_plans(&bot)?;
    let trader = Arc::new(LiveTrader::new(bot, cfg.trading_mode, exchange, store.clone(), notifier, plans));
    trader.startup().await.context("startup checks failed")?;

    let (engine, handle) = Engine::new(trader);
    let engine_task = tokio::spawn(engine.run());

    let (stop_tx, stop_rx) = watch::channel(false);
    let api_task = match cfg.dashboard_token.clone() {
        Some(token) => {
            let state = api::AppState {
                status: Arc::new(handle.clone()),
                store,
                trading_mode: cfg.trading_mode,
                dashboard_token: token,
            };
            let mut stop_rx = stop_rx;
            let stopped = async move {
                let _ = stop_rx.changed().await;
            };
            Some(tokio::spawn(api::serve(state, cfg.dashboard_port, stopped)))
        }
        None => {
            info!("DASHBOARD_TOKEN not set, status API disabled");
            None
        }
    };

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("shutdown requested");
    handle.shutdown();
    let _ = stop_tx.send(true);

    engine_task.await.context("engine task panicked")?;
    if let Some(task) = api_task {
        if let Err(e) = task.await.context("API task panicked")? {
            warn!(error = %e, "status API stopped with an error");
        }
    }
    info!("FilterBot stopped");
    Ok(())
}
