use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::info;

use common::{Error, Result, TradeRecord, TradeStore};

/// Closed trades in SQLite.
#[derive(Clone)]
pub struct SqliteTradeStore {
    pool: SqlitePool,
}

impl SqliteTradeStore {
    /// Connect and bring the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(e.into()))?;
        info!("trade store migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// All-time counts over the stored trades.
    pub async fn summary(&self) -> Result<TradeSummary> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COALESCE(SUM(CASE WHEN pnl_value > 0 THEN 1 ELSE 0 END), 0) AS wins,
                   COALESCE(SUM(pnl_value), 0.0) AS pnl
            FROM trades
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        let total: i64 = row.try_get("total")?;
        let wins: i64 = row.try_get("wins")?;
        Ok(TradeSummary {
            total: total as u64,
            wins: wins as u64,
            losses: (total - wins) as u64,
            pnl: row.try_get("pnl")?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TradeSummary {
    pub total: u64,
    pub wins: u64,
    pub losses: u64,
    pub pnl: f64,
}

fn decode(row: &SqliteRow) -> Result<TradeRecord> {
    let parse_time = |col: &str| -> Result<DateTime<Utc>> {
        let raw: String = row.try_get(col)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| Error::Other(format!("bad {col} '{raw}': {e}")))
    };
    let side: String = row.try_get("side")?;
    let exit_type: String = row.try_get("exit_type")?;
    Ok(TradeRecord {
        coin: row.try_get("coin")?,
        side: side.parse()?,
        entry_time: parse_time("entry_time")?,
        exit_time: parse_time("exit_time")?,
        entry_price: row.try_get("entry_price")?,
        exit_price: row.try_get("exit_price")?,
        quantity: row.try_get("quantity")?,
        pnl_pct: row.try_get("pnl_pct")?,
        pnl_value: row.try_get("pnl_value")?,
        exit_type: exit_type.parse()?,
        fees: row.try_get("fees")?,
        slippage: row.try_get("slippage")?,
    })
}

#[async_trait]
impl TradeStore for SqliteTradeStore {
    async fn record(&self, trade: &TradeRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trades
                (coin, side, entry_time, exit_time, entry_price, exit_price, quantity,
                 pnl_pct, pnl_value, exit_type, fees, slippage)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&trade.coin)
        .bind(trade.side.to_string())
        .bind(trade.entry_time.to_rfc3339())
        .bind(trade.exit_time.to_rfc3339())
        .bind(trade.entry_price)
        .bind(trade.exit_price)
        .bind(trade.quantity)
        .bind(trade.pnl_pct)
        .bind(trade.pnl_value)
        .bind(trade.exit_type.to_string())
        .bind(trade.fees)
        .bind(trade.slippage)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<TradeRecord>> {
        let rows = sqlx::query("SELECT * FROM trades ORDER BY exit_time DESC, id DESC LIMIT ?1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode).collect()
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let done = sqlx::query("DELETE FROM trades WHERE exit_time < ?1")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }
}
