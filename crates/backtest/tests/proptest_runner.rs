use backtest::{resample, BacktestConfig, BacktestRunner};
use chrono::{Duration, TimeZone, Utc};
use common::{Candle, Timeframe};
use proptest::prelude::*;
use strategy::ParameterSet;

fn params(rsi_weight: f64, momentum_weight: f64, threshold: f64, use_trailing: f64) -> ParameterSet {
    let json = format!(
        r#"{{
        "parameters": {{
            "tp_percent": 0.01, "sl_percent": 0.005, "entry_threshold": {threshold},
            "use_trailing": {use_trailing}, "trailing_activation": 0.3, "trailing_distance": 0.002,
            "rsi_weight": {rsi_weight}, "trend_ema_weight": 0, "price_ema_weight": 0, "macd_weight": 0,
            "volume_spike_weight": 0, "bollinger_weight": 0, "stochastic_weight": 0,
            "atr_weight": 0, "adx_weight": 0, "sr_weight": 0, "momentum_weight": {momentum_weight},
            "market_structure_weight": 0, "time_filter_weight": 0, "mtf_confirmation_weight": 0,
            "rsi_period": 4, "rsi_oversold": 35, "rsi_overbought": 65,
            "trend_fast_ema": 4, "trend_slow_ema": 9, "entry_ema_period": 5,
            "macd_fast": 4, "macd_slow": 8, "macd_signal": 3, "macd_flip_only": 0,
            "volume_ma_period": 5, "volume_spike_multiplier": 1.5,
            "bollinger_period": 8, "bollinger_std": 2.0,
            "bollinger_squeeze_enabled": 0, "bollinger_squeeze_length": 4,
            "stochastic_k": 6, "stochastic_overbought": 80, "stochastic_oversold": 20,
            "atr_period": 5, "atr_min_threshold": 0.5,
            "adx_period": 4, "adx_threshold": 20,
            "sr_lookback": 10, "sr_touch_distance": 0.002,
            "momentum_period": 3, "momentum_threshold": 0.002,
            "structure_lookback": 3,
            "trade_start_hour": 0, "trade_end_hour": 23,
            "timeframe_combo": 0
        }}
    }}"#
    );
    ParameterSet::from_json(&json).unwrap()
}

fn minutes(moves: &[f64]) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
    let mut close = 100.0;
    moves
        .iter()
        .enumerate()
        .map(|(i, &m)| {
            let open = close;
            close = (close * (1.0 + m)).max(1.0);
            Candle {
                open_time: start + Duration::minutes(i as i64),
                open,
                high: open.max(close) * 1.0005,
                low: open.min(close) * 0.9995,
                close,
                volume: 5.0,
            }
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Trades never overlap and each balance is the previous one plus the trade's pnl.
    #[test]
    fn trades_are_sequential_and_balances_chain(
        moves in prop::collection::vec(-0.006f64..0.006, 200..600),
        rsi_weight in 0.0f64..1.0,
        momentum_weight in 0.0f64..1.0,
        threshold in 0.05f64..0.8,
        use_trailing in prop_oneof![Just(0.0), Just(1.0)],
    ) {
        let p = params(rsi_weight, momentum_weight, threshold, use_trailing);
        let config = BacktestConfig::default();
        let result = BacktestRunner::new("ETHUSDT", &p, config.clone()).run_segments(&[minutes(&moves)]);

        let mut balance = config.initial_balance;
        let mut last_exit = None;
        for t in &result.trades {
            prop_assert!(t.record.exit_time > t.record.entry_time);
            if let Some(prev) = last_exit {
                prop_assert!(t.record.entry_time >= prev);
            }
            last_exit = Some(t.record.exit_time);
            balance += t.record.pnl_value;
            prop_assert!((t.balance - balance).abs() < 1e-9);
            prop_assert!(t.record.fees >= 0.0 && t.record.slippage >= 0.0);
        }
        prop_assert!((result.final_balance - balance).abs() < 1e-9);
    }

    /// Resampling keeps every unit of volume and stays within the source range.
    #[test]
    fn resample_conserves_volume(moves in prop::collection::vec(-0.01f64..0.01, 1..300)) {
        let source = minutes(&moves);
        for tf in [Timeframe::M5, Timeframe::M15, Timeframe::H1] {
            let out = resample(&source, tf);
            let total: f64 = out.iter().map(|c| c.volume).sum();
            prop_assert!((total - 5.0 * source.len() as f64).abs() < 1e-6);
            for c in &out {
                prop_assert!(c.low <= c.open && c.open <= c.high);
                prop_assert!(c.low <= c.close && c.close <= c.high);
                prop_assert_eq!(c.open_time, tf.bucket_start(c.open_time));
            }
        }
    }
}
