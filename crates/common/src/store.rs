use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Result, TradeRecord};

/// Append-only sink for closed trades.
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn record(&self, trade: &TradeRecord) -> Result<()>;

    /// Most recent trades by exit time, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<TradeRecord>>;

    /// Delete trades that exited before `cutoff`. Returns the number removed.
    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
