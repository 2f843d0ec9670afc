use chrono::{DateTime, Utc};

use common::{Candle, Timeframe, TimeframeCombo};

use crate::calculator::IndicatorEngine;
use crate::params::ParameterSet;
use crate::row::IndicatorRow;

/// For each entry close time, the index of the latest trend row that closed at or before it.
///
/// Both inputs must be ascending. A trend value therefore applies from the moment its
/// candle closes until the next trend candle closes (forward fill, no look-ahead).
pub fn align_forward_fill(entry_close: &[DateTime<Utc>], trend_close: &[DateTime<Utc>]) -> Vec<Option<usize>> {
    let mut out = Vec::with_capacity(entry_close.len());
    let mut j = 0usize;
    let mut current: Option<usize> = None;
    for &t in entry_close {
        while j < trend_close.len() && trend_close[j] <= t {
            current = Some(j);
            j += 1;
        }
        out.push(current);
    }
    out
}

/// Entry-timeframe rows with the aligned higher-timeframe rows.
#[derive(Debug, Clone, Default)]
pub struct SignalFrame {
    entry: Vec<IndicatorRow>,
    trend: Vec<IndicatorRow>,
    trend_at: Vec<Option<usize>>,
}

impl SignalFrame {
    /// Compute indicators on both series and align them.
    pub fn build(params: &ParameterSet, entry: &[Candle], trend: &[Candle]) -> Self {
        let engine = IndicatorEngine::new(params);
        let combo = params.timeframes();
        Self::from_rows(engine.compute(entry), engine.compute(trend), combo)
    }

    pub fn from_rows(entry: Vec<IndicatorRow>, trend: Vec<IndicatorRow>, combo: TimeframeCombo) -> Self {
        let entry_close = close_times(&entry, combo.entry);
        let trend_close = close_times(&trend, combo.trend);
        let trend_at = align_forward_fill(&entry_close, &trend_close);
        Self { entry, trend, trend_at }
    }

    /// A frame with no higher-timeframe data.
    pub fn entry_only(entry: Vec<IndicatorRow>) -> Self {
        let trend_at = vec![None; entry.len()];
        Self { entry, trend: Vec::new(), trend_at }
    }

    pub fn len(&self) -> usize {
        self.entry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_empty()
    }

    pub fn rows(&self) -> &[IndicatorRow] {
        &self.entry
    }

    pub fn row(&self, i: usize) -> Option<&IndicatorRow> {
        self.entry.get(i)
    }

    /// Higher-timeframe row in force when entry row `i` closed.
    pub fn trend_for(&self, i: usize) -> Option<&IndicatorRow> {
        self.trend_at.get(i).copied().flatten().and_then(|j| self.trend.get(j))
    }

    /// The first `n` entry rows, keeping the same alignment.
    pub fn prefix(&self, n: usize) -> Self {
        let n = n.min(self.entry.len());
        Self {
            entry: self.entry[..n].to_vec(),
            trend: self.trend.clone(),
            trend_at: self.trend_at[..n].to_vec(),
        }
    }
}

fn close_times(rows: &[IndicatorRow], tf: Timeframe) -> Vec<DateTime<Utc>> {
    rows.iter().map(|r| tf.close_time(r.open_time)).collect()
}
