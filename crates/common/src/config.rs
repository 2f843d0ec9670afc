use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, MarginType, Result, TradingMode};

/// Process configuration loaded from environment variables (and `.env`) at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // Exchange credentials
    pub binance_api_key: String,
    pub binance_secret: String,
    pub binance_testnet: bool,

    // Telegram (optional; alerts fall back to the log)
    pub telegram_token: Option<String>,
    pub telegram_chat_ids: Vec<i64>,

    // Dashboard (optional)
    pub dashboard_token: Option<String>,
    pub dashboard_port: u16,

    // Trading
    pub trading_mode: TradingMode,
    pub paper_balance: f64,
    pub paper_slippage_bps: f64,

    // Database
    pub database_url: String,

    // Trading settings file
    pub bot_config_path: PathBuf,
}

impl Config {
    /// Load configuration from the environment. Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let trading_mode = match optional_env("TRADING_MODE")
            .unwrap_or_else(|| "paper".to_string())
            .to_lowercase()
            .as_str()
        {
            "paper" => TradingMode::Paper,
            "live" => TradingMode::Live,
            other => {
                return Err(Error::Config(format!(
                    "TRADING_MODE must be 'paper' or 'live', got '{other}'"
                )))
            }
        };

        // Paper mode only reads public market data, so keys may be absent.
        let (binance_api_key, binance_secret) = match trading_mode {
            TradingMode::Live => (required_env("BINANCE_API_KEY")?, required_env("BINANCE_SECRET")?),
            TradingMode::Paper => (
                optional_env("BINANCE_API_KEY").unwrap_or_default(),
                optional_env("BINANCE_SECRET").unwrap_or_default(),
            ),
        };

        let telegram_chat_ids = match optional_env("TELEGRAM_CHAT_IDS") {
            Some(raw) => raw
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    s.trim().parse::<i64>().map_err(|_| {
                        Error::Config(format!("TELEGRAM_CHAT_IDS contains non-numeric ID '{}'", s.trim()))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(Config {
            binance_api_key,
            binance_secret,
            binance_testnet: parse_env("BINANCE_TESTNET", false)?,
            telegram_token: optional_env("TELEGRAM_TOKEN").filter(|t| !t.is_empty()),
            telegram_chat_ids,
            dashboard_token: optional_env("DASHBOARD_TOKEN").filter(|t| !t.is_empty()),
            dashboard_port: parse_env("DASHBOARD_PORT", 8080)?,
            trading_mode,
            paper_balance: parse_env("PAPER_BALANCE", 1_000.0)?,
            paper_slippage_bps: parse_env("PAPER_SLIPPAGE_BPS", 3.0)?,
            database_url: optional_env("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://trades.db?mode=rwc".to_string()),
            bot_config_path: optional_env("BOT_CONFIG_PATH")
                .unwrap_or_else(|| "config/bot.toml".to_string())
                .into(),
        })
    }
}

fn required_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        Error::Config(format!("required environment variable '{key}' is not set"))
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key} has an invalid value '{raw}'"))),
        None => Ok(default),
    }
}

/// Trading settings file (TOML).
///
/// Example `config/bot.toml`:
/// ```toml
/// coins = ["BTCUSDT", "ETHUSDT"]
/// leverage = 10
/// margin_per_trade = 100.0
/// max_total_positions = 10
/// parameter_dir = "parameters"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Futures symbols to trade, e.g. `"BTCUSDT"`.
    pub coins: Vec<String>,
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    /// Margin committed per trade, in USDT. Notional is `margin_per_trade * leverage`.
    #[serde(default = "default_margin")]
    pub margin_per_trade: f64,
    #[serde(default = "default_margin_type")]
    pub margin_type: MarginType,
    #[serde(default = "default_max_positions")]
    pub max_total_positions: usize,
    /// Below this balance the bot refuses to start and skips new entries.
    #[serde(default = "default_min_balance")]
    pub min_balance: f64,
    /// Directory holding `<coin>_params.json` files.
    #[serde(default = "default_parameter_dir")]
    pub parameter_dir: PathBuf,
    #[serde(default = "default_candle_poll")]
    pub candle_poll_secs: u64,
    #[serde(default = "default_exit_poll")]
    pub exit_poll_secs: u64,
    /// Candles fetched per timeframe when computing indicators.
    #[serde(default = "default_history")]
    pub history_candles: usize,
    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,
    /// How long both bracket legs may be missing before the position is closed at market.
    #[serde(default = "default_grace")]
    pub bracket_grace_secs: u64,
    #[serde(default = "default_retention")]
    pub trade_retention_days: i64,
    #[serde(default = "default_true")]
    pub cancel_orders_on_shutdown: bool,
    /// Taker fee per side, as a fraction.
    #[serde(default = "default_fee_rate")]
    pub fee_rate: f64,
}

fn default_leverage() -> u32 {
    10
}
fn default_margin() -> f64 {
    100.0
}
fn default_margin_type() -> MarginType {
    MarginType::Isolated
}
fn default_max_positions() -> usize {
    10
}
fn default_min_balance() -> f64 {
    20.0
}
fn default_parameter_dir() -> PathBuf {
    PathBuf::from("parameters")
}
fn default_candle_poll() -> u64 {
    30
}
fn default_exit_poll() -> u64 {
    5
}
fn default_history() -> usize {
    200
}
fn default_api_timeout() -> u64 {
    10
}
fn default_grace() -> u64 {
    30
}
fn default_retention() -> i64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_fee_rate() -> f64 {
    0.00045
}

impl BotConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read bot config at '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: BotConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.coins.is_empty() {
            return Err(Error::Config("coins must list at least one symbol".into()));
        }
        if self.leverage == 0 {
            return Err(Error::Config("leverage must be >= 1".into()));
        }
        if self.margin_per_trade <= 0.0 {
            return Err(Error::Config("margin_per_trade must be positive".into()));
        }
        if self.max_total_positions == 0 {
            return Err(Error::Config("max_total_positions must be >= 1".into()));
        }
        if self.history_candles < 2 {
            return Err(Error::Config("history_candles must be >= 2".into()));
        }
        Ok(())
    }

    /// Notional exposure of one position.
    pub fn position_value(&self) -> f64 {
        self.margin_per_trade * self.leverage as f64
    }

    pub fn parameter_path(&self, coin: &str) -> PathBuf {
        self.parameter_dir
            .join(format!("{}_params.json", coin.to_lowercase()))
    }
}
