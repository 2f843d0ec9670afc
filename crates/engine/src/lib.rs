pub mod alerts;
pub mod binance;
pub mod book;
pub mod executor;
pub mod lifecycle;
pub mod stats;
pub mod store;
pub mod trader;

pub use binance::BinanceFuturesClient;
pub use book::PositionBook;
pub use executor::OrderExecutor;
pub use lifecycle::{Engine, EngineHandle};
pub use stats::{SessionStats, Tally};
pub use store::{SqliteTradeStore, TradeSummary};
pub use trader::{load_plans, CoinPlan, LiveTrader, StatusSnapshot};
