//! Binance futures kline CSV files (`BTCUSDT-1m-2024-05.csv`).
//!
//! Columns are `open_time, open, high, low, close, volume, ...`; later columns are
//! ignored. Older files have no header row, newer ones do. Open times are epoch
//! milliseconds, or microseconds in files from 2025 on.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use common::Candle;

use crate::error::BacktestError;

/// Epoch values above this are microseconds.
const MICROS_THRESHOLD: i64 = 100_000_000_000_000;

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    let value: i64 = raw.trim().parse().ok()?;
    let ms = if value > MICROS_THRESHOLD { value / 1_000 } else { value };
    Utc.timestamp_millis_opt(ms).single()
}

fn parse_record(record: &StringRecord) -> Result<Candle, String> {
    if record.len() < 6 {
        return Err(format!("expected at least 6 columns, found {}", record.len()));
    }
    let open_time = parse_time(&record[0]).ok_or_else(|| format!("bad open time '{}'", &record[0]))?;
    let num = |i: usize, name: &str| -> Result<f64, String> {
        record[i].trim().parse::<f64>().map_err(|_| format!("bad {name} '{}'", &record[i]))
    };
    Ok(Candle {
        open_time,
        open: num(1, "open")?,
        high: num(2, "high")?,
        low: num(3, "low")?,
        close: num(4, "close")?,
        volume: num(5, "volume")?,
    })
}

/// Read one kline file, sorted by open time with duplicates removed.
pub fn load_klines(path: &Path) -> Result<Vec<Candle>, BacktestError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|source| BacktestError::Csv { path: path.to_path_buf(), source })?;

    let mut candles = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|source| BacktestError::Csv { path: path.to_path_buf(), source })?;
        let line = record.position().map_or(i as u64 + 1, |p| p.line());
        // Header row.
        if i == 0 && parse_time(&record[0]).is_none() {
            continue;
        }
        let candle = parse_record(&record).map_err(|reason| BacktestError::BadRow {
            path: path.to_path_buf(),
            line,
            reason,
        })?;
        candles.push(candle);
    }

    candles.sort_by_key(|c| c.open_time);
    candles.dedup_by_key(|c| c.open_time);
    if candles.is_empty() {
        return Err(BacktestError::Empty(path.to_path_buf()));
    }
    debug!(path = %path.display(), candles = candles.len(), "klines loaded");
    Ok(candles)
}

/// Load several files as independent segments, in the order given.
pub fn load_segments<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Vec<Candle>>, BacktestError> {
    paths.iter().map(|p| load_klines(p.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, body: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("filterbot-{}-{name}", std::process::id()));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_headered_microsecond_file() {
        let path = write_temp(
            "micros.csv",
            "open_time,open,high,low,close,volume,close_time\n\
             1735689660000000,2.0,2.5,1.5,2.2,10,1735689719999999\n\
             1735689600000000,1.0,1.5,0.5,1.2,5,1735689659999999\n",
        );
        let candles = load_klines(&path).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open, 1.0);
        assert_eq!(candles[0].open_time.timestamp(), 1_735_689_600);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn reads_headerless_millisecond_file() {
        let path = write_temp("millis.csv", "1704067200000,42000.1,42010,41990,42005.5,12.5,1704067259999,0,0,0,0,0\n");
        let candles = load_klines(&path).unwrap();
        assert_eq!(candles[0].close, 42005.5);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn reports_bad_row_with_line() {
        let path = write_temp("bad.csv", "1704067200000,1,1,1,1,1\n1704067260000,x,1,1,1,1\n");
        match load_klines(&path) {
            Err(BacktestError::BadRow { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {other:?}"),
        }
        std::fs::remove_file(path).ok();
    }
}
