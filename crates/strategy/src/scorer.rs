use serde::Serialize;

use common::Direction;

use crate::filters::FilterKind;
use crate::frame::SignalFrame;
use crate::params::{is_active, ParameterSet};
use crate::row::IndicatorRow;

/// One evaluated filter's share of the weighted sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilterContribution {
    pub filter: FilterKind,
    pub weight: f64,
    pub signal: f64,
    pub contribution: f64,
}

/// Result of scoring one indicator row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Signal {
    pub direction: Direction,
    /// Weighted sum of the evaluated filters.
    pub strength: f64,
    /// Evaluated filters, in evaluation order.
    pub contributions: Vec<FilterContribution>,
    /// Enabled filters whose inputs were not yet available on the row.
    pub unavailable: Vec<FilterKind>,
}

impl Signal {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_directional(&self) -> bool {
        self.direction != Direction::None
    }

    pub fn contribution(&self, filter: FilterKind) -> Option<&FilterContribution> {
        self.contributions.iter().find(|c| c.filter == filter)
    }
}

/// Weighted multi-filter scorer. Pure: reads rows, never mutates them.
#[derive(Debug, Clone, Copy)]
pub struct Scorer<'a> {
    params: &'a ParameterSet,
}

impl<'a> Scorer<'a> {
    pub fn new(params: &'a ParameterSet) -> Self {
        Self { params }
    }

    /// Score a single row against its aligned higher-timeframe row.
    ///
    /// A row where any enabled filter cannot be evaluated yet scores NONE with zero
    /// strength; the missing filters are listed in [`Signal::unavailable`].
    pub fn evaluate(&self, row: &IndicatorRow, trend_row: Option<&IndicatorRow>) -> Signal {
        let p = self.params;
        let mut signal = Signal::none();

        for filter in FilterKind::ALL {
            let weight = filter.weight(p);
            if !is_active(weight) {
                continue;
            }
            if filter.reading_disabled(row, p) {
                signal.unavailable.push(filter);
                continue;
            }
            match filter.evaluate(row, trend_row, p) {
                Some(value) => {
                    let contribution = weight * value;
                    signal.strength += contribution;
                    signal.contributions.push(FilterContribution {
                        filter,
                        weight,
                        signal: value,
                        contribution,
                    });
                }
                None => signal.unavailable.push(filter),
            }
        }
        if !signal.unavailable.is_empty() {
            return Signal { unavailable: signal.unavailable, ..Signal::none() };
        }

        signal.direction = if signal.strength > p.long_threshold() {
            Direction::Long
        } else if signal.strength < -p.short_threshold() {
            Direction::Short
        } else {
            Direction::None
        };
        signal
    }

    /// Score the latest row.
    pub fn immediate(&self, frame: &SignalFrame) -> Signal {
        match frame.len() {
            0 => Signal::none(),
            n => self.score_row(frame, n - 1),
        }
    }

    /// Score the second-to-last row, leaving the newest one unused.
    pub fn delayed(&self, frame: &SignalFrame) -> Signal {
        self.delayed_at(frame, frame.len().saturating_sub(1))
    }

    /// Delayed score as seen when row `i` is the newest: row `i - 1` is scored.
    pub fn delayed_at(&self, frame: &SignalFrame, i: usize) -> Signal {
        if i == 0 || i >= frame.len() {
            return Signal::none();
        }
        self.score_row(frame, i - 1)
    }

    fn score_row(&self, frame: &SignalFrame, i: usize) -> Signal {
        match frame.row(i) {
            Some(row) => self.evaluate(row, frame.trend_for(i)),
            None => Signal::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::fixtures::all_disabled;
    use crate::row::{Reading, Trend};
    use chrono::{Duration, TimeZone, Utc};
    use common::Candle;

    fn row(i: i64, close: f64) -> IndicatorRow {
        IndicatorRow::bare(&Candle {
            open_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(5 * i),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        })
    }

    fn with_rsi(i: i64, rsi: f64) -> IndicatorRow {
        let mut r = row(i, 100.0);
        r.rsi = Reading::Ready(rsi);
        r
    }

    #[test]
    fn no_enabled_filters_scores_zero() {
        let p = all_disabled();
        let s = Scorer::new(&p).evaluate(&row(0, 100.0), None);
        assert_eq!(s.direction, Direction::None);
        assert_eq!(s.strength, 0.0);
        assert!(s.contributions.is_empty());
    }

    #[test]
    fn strength_above_threshold_goes_long() {
        let mut p = all_disabled();
        p.rsi_weight = 0.6;
        let s = Scorer::new(&p).evaluate(&with_rsi(0, 20.0), None);
        assert!((s.strength - 0.6).abs() < 1e-12);
        assert_eq!(s.direction, Direction::Long);
        assert_eq!(s.contribution(FilterKind::Rsi).map(|c| c.signal), Some(1.0));
    }

    #[test]
    fn strength_equal_to_threshold_is_none() {
        let mut p = all_disabled();
        p.rsi_weight = 0.5;
        let s = Scorer::new(&p).evaluate(&with_rsi(0, 20.0), None);
        assert_eq!(s.strength, 0.5);
        assert_eq!(s.direction, Direction::None);
    }

    #[test]
    fn short_threshold_overrides_long_one() {
        let mut p = all_disabled();
        p.rsi_weight = 0.6;
        p.entry_threshold_short = Some(0.7);
        let s = Scorer::new(&p).evaluate(&with_rsi(0, 80.0), None);
        assert_eq!(s.direction, Direction::None);
        p.entry_threshold_short = Some(0.55);
        let s = Scorer::new(&p).evaluate(&with_rsi(0, 80.0), None);
        assert_eq!(s.direction, Direction::Short);
    }

    #[test]
    fn warming_filter_forces_none() {
        let mut p = all_disabled();
        p.rsi_weight = 0.6;
        p.time_filter_weight = 1.0;
        p.entry_threshold = 0.05;
        let mut r = row(0, 100.0);
        r.rsi = Reading::Warming;
        let s = Scorer::new(&p).evaluate(&r, None);
        assert_eq!(s.unavailable, vec![FilterKind::Rsi]);
        assert_eq!(s.direction, Direction::None);
        assert_eq!(s.strength, 0.0);
        assert!(s.contributions.is_empty());

        r.rsi = Reading::Ready(50.0);
        let s = Scorer::new(&p).evaluate(&r, None);
        assert_eq!(s.direction, Direction::Long);
        assert!((s.strength - 0.1).abs() < 1e-12);
    }

    #[test]
    fn missing_trend_row_forces_none_when_mtf_enabled() {
        let mut p = all_disabled();
        p.mtf_confirmation_weight = 1.0;
        p.time_filter_weight = 1.0;
        p.entry_threshold = 0.05;
        let s = Scorer::new(&p).evaluate(&row(0, 100.0), None);
        assert_eq!(s.unavailable, vec![FilterKind::MtfConfirmation]);
        assert_eq!(s.direction, Direction::None);
    }

    #[test]
    fn delayed_scores_second_to_last_row() {
        let mut p = all_disabled();
        p.rsi_weight = 0.6;
        let frame = SignalFrame::entry_only(vec![with_rsi(0, 50.0), with_rsi(1, 20.0), with_rsi(2, 80.0)]);
        let scorer = Scorer::new(&p);
        assert_eq!(scorer.immediate(&frame).direction, Direction::Short);
        assert_eq!(scorer.delayed(&frame).direction, Direction::Long);
        assert_eq!(scorer.delayed_at(&frame, 1).direction, Direction::None);
    }

    #[test]
    fn delayed_needs_two_rows() {
        let mut p = all_disabled();
        p.rsi_weight = 0.6;
        let scorer = Scorer::new(&p);
        let one = SignalFrame::entry_only(vec![with_rsi(0, 20.0)]);
        let s = scorer.delayed(&one);
        assert_eq!(s.direction, Direction::None);
        assert_eq!(s.strength, 0.0);
        assert_eq!(scorer.immediate(&SignalFrame::default()), Signal::none());
    }

    #[test]
    fn mtf_uses_aligned_trend_row() {
        let mut p = all_disabled();
        p.mtf_confirmation_weight = 1.0;
        let mut entry = row(3, 100.0);
        entry.trend = Reading::Ready(Trend::Bearish);
        let mut higher = row(0, 100.0);
        higher.trend = Reading::Ready(Trend::Bearish);
        let s = Scorer::new(&p).evaluate(&entry, Some(&higher));
        assert!((s.strength + 0.6).abs() < 1e-12);
        assert_eq!(s.direction, Direction::Short);
    }
}
