//! Performance metrics and the composite optimizer score.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use common::Candle;
use strategy::{FilterKind, ParameterSet};

use crate::error::BacktestError;
use crate::runner::{BacktestConfig, BacktestResult, BacktestRunner, BacktestTrade};

/// Score given to rejected candidates. Lower is better.
pub const REJECTED_SCORE: f64 = 1000.0;

/// Contributions weaker than this are not counted as filter usage.
const USAGE_MIN_SIGNAL: f64 = 0.1;

/// Months the optimizer's data window spans, for trade-frequency scoring.
const SCORED_MONTHS: f64 = 13.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterUsage {
    pub count: usize,
    pub wins: usize,
    pub total_contribution: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percent of trades with positive net pnl.
    pub win_rate: f64,
    /// Percent change from initial to final balance.
    pub total_return: f64,
    /// Largest peak-to-trough fall of the daily equity curve, as a negative percent.
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub profit_factor: f64,
    /// Mean winning trade as percent of entry notional.
    pub avg_win: f64,
    /// Mean losing trade as percent of entry notional, positive.
    pub avg_loss: f64,
    pub profit_per_trade: f64,
    /// Percent of traded months with positive net pnl.
    pub monthly_consistency: f64,
    /// Net pnl per entry month as percent of the initial balance.
    pub monthly_returns: BTreeMap<String, f64>,
    pub total_fees: f64,
    pub total_slippage: f64,
    pub filter_usage: BTreeMap<FilterKind, FilterUsage>,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Balance at the end of each calendar day from the first entry to the last exit,
/// preceded by the initial balance.
pub fn daily_equity(trades: &[BacktestTrade], initial_balance: f64) -> Vec<f64> {
    let mut curve = vec![initial_balance];
    let (Some(first), Some(last)) = (trades.first(), trades.last()) else {
        return curve;
    };
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for t in trades {
        by_day.insert(t.record.exit_time.date_naive(), t.balance);
    }

    let mut day = first.record.entry_time.date_naive();
    let end = last.record.exit_time.date_naive();
    let mut balance = initial_balance;
    while day <= end {
        if let Some(&b) = by_day.get(&day) {
            balance = b;
        }
        curve.push(balance);
        day += Duration::days(1);
    }
    curve
}

pub fn max_drawdown(curve: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0f64;
    for &v in curve {
        peak = peak.max(v);
        if peak > 0.0 {
            worst = worst.min((v - peak) / peak);
        }
    }
    worst * 100.0
}

/// Annualised (365 days) Sharpe ratio of day-over-day equity returns.
pub fn sharpe_ratio(curve: &[f64]) -> f64 {
    let returns: Vec<f64> =
        curve.windows(2).filter(|w| w[0] != 0.0).map(|w| (w[1] - w[0]) / w[0]).collect();
    let sd = std_dev(&returns);
    if returns.len() < 2 || sd == 0.0 {
        return 0.0;
    }
    mean(&returns) / sd * 365f64.sqrt()
}

impl Metrics {
    pub fn compute(result: &BacktestResult) -> Self {
        let trades = &result.trades;
        let initial = result.initial_balance;
        if trades.is_empty() {
            return Self::default();
        }
        let n = trades.len();

        let wins: Vec<&BacktestTrade> = trades.iter().filter(|t| t.record.pnl_value > 0.0).collect();
        let losses: Vec<&BacktestTrade> = trades.iter().filter(|t| t.record.pnl_value < 0.0).collect();

        let gross_win: f64 = wins.iter().map(|t| t.record.pnl_value).sum();
        let gross_loss: f64 = losses.iter().map(|t| t.record.pnl_value).sum::<f64>().abs();
        let profit_factor = if gross_loss > 0.0 {
            gross_win / gross_loss
        } else if gross_win > 0.0 {
            100.0
        } else {
            0.0
        };

        let pct_of_notional = |t: &&BacktestTrade| {
            let notional = t.entry_notional();
            if notional > 0.0 {
                t.record.pnl_value / notional * 100.0
            } else {
                0.0
            }
        };
        let avg_win = mean(&wins.iter().map(pct_of_notional).collect::<Vec<_>>());
        let avg_loss = mean(&losses.iter().map(|t| pct_of_notional(t).abs()).collect::<Vec<_>>());

        let mut monthly_pnl: BTreeMap<String, f64> = BTreeMap::new();
        for t in trades {
            let at = t.record.entry_time;
            *monthly_pnl.entry(format!("{:04}-{:02}", at.year(), at.month())).or_default() += t.record.pnl_value;
        }
        let profitable_months = monthly_pnl.values().filter(|&&v| v > 0.0).count();
        let monthly_consistency = profitable_months as f64 / monthly_pnl.len() as f64 * 100.0;
        let monthly_returns = monthly_pnl.into_iter().map(|(m, v)| (m, v / initial * 100.0)).collect();

        let curve = daily_equity(trades, initial);

        let mut filter_usage: BTreeMap<FilterKind, FilterUsage> = BTreeMap::new();
        for t in trades {
            for c in t.contributions.iter().filter(|c| c.signal.abs() > USAGE_MIN_SIGNAL) {
                let usage = filter_usage.entry(c.filter).or_default();
                usage.count += 1;
                usage.total_contribution += c.contribution.abs();
                if t.record.pnl_value > 0.0 {
                    usage.wins += 1;
                }
            }
        }

        Self {
            total_trades: n,
            wins: wins.len(),
            losses: losses.len(),
            win_rate: wins.len() as f64 / n as f64 * 100.0,
            total_return: (result.final_balance - initial) / initial * 100.0,
            max_drawdown: max_drawdown(&curve),
            sharpe_ratio: sharpe_ratio(&curve),
            profit_factor,
            avg_win,
            avg_loss,
            profit_per_trade: (result.final_balance - initial) / n as f64,
            monthly_consistency,
            monthly_returns,
            total_fees: trades.iter().map(|t| t.record.fees).sum(),
            total_slippage: trades.iter().map(|t| t.record.slippage).sum(),
            filter_usage,
        }
    }
}

fn sigmoid(value: f64, center: f64, scale: f64) -> f64 {
    1.0 / (1.0 + (-(value - center) / scale).exp())
}

/// Win-rate focused composite score, negated so lower is better.
///
/// Candidates winning under 20 % of trades or losing 1 % or more get [`REJECTED_SCORE`].
pub fn score(m: &Metrics) -> f64 {
    if m.win_rate < 20.0 || m.total_return <= -1.0 {
        return REJECTED_SCORE;
    }
    let risk_reward = if m.avg_loss.abs() > 0.0 { m.avg_win / m.avg_loss.abs() } else { 0.0 };

    let trades_per_month = m.total_trades as f64 / SCORED_MONTHS;
    let trade_penalty = if trades_per_month < 10.0 {
        0.3
    } else if trades_per_month > 390.0 {
        0.8
    } else {
        1.0
    };

    let return_score = sigmoid(m.total_return, 0.0, 15.0);
    let sharpe_score = sigmoid(m.sharpe_ratio, 0.0, 1.5);
    let drawdown_score = 1.0 - (m.max_drawdown.abs() / 40.0).min(1.0);
    let risk_reward_score = sigmoid(risk_reward, 1.0, 1.0);
    let profit_efficiency = sigmoid(m.profit_per_trade, 0.0, 1.5);
    let consistency_score = m.monthly_consistency / 100.0;

    let s = 0.10 * return_score
        + 0.5 * (m.win_rate / 100.0)
        + 0.1 * profit_efficiency
        + 0.1 * consistency_score
        + 0.1 * sharpe_score
        + 0.05 * drawdown_score
        + 0.05 * risk_reward_score;
    -(s * trade_penalty)
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub score: f64,
    pub metrics: Metrics,
    pub result: BacktestResult,
}

/// Backtest `params` over 1-minute segments and score the outcome.
pub fn evaluate(
    coin: &str,
    params: &ParameterSet,
    config: BacktestConfig,
    segments: &[Vec<Candle>],
) -> Result<Evaluation, BacktestError> {
    if let Some(reason) = params.constraint_violation() {
        return Err(BacktestError::Parameters(reason));
    }
    let result = BacktestRunner::new(coin, params, config).run_segments(segments);
    let metrics = Metrics::compute(&result);
    Ok(Evaluation { score: score(&metrics), metrics, result })
}
