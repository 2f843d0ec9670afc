pub mod config;
pub mod error;
pub mod exchange;
pub mod notify;
pub mod precision;
pub mod store;
pub mod timeframe;
pub mod types;

pub use config::{BotConfig, Config};
pub use error::{with_timeout, Error, Result};
pub use exchange::FuturesExchange;
pub use notify::{LogNotifier, Notifier};
pub use store::TradeStore;
pub use timeframe::{Timeframe, TimeframeCombo, TIMEFRAME_COMBOS};
pub use types::*;
