use common::{Candle, Timeframe};

/// Aggregate ascending candles into `timeframe` buckets aligned like exchange klines.
///
/// Each output candle opens at its bucket start; open is the first open, close the last
/// close, high/low the extremes and volume the sum. Empty buckets produce no candle.
pub fn resample(candles: &[Candle], timeframe: Timeframe) -> Vec<Candle> {
    let mut out: Vec<Candle> = Vec::new();
    for c in candles {
        let bucket = timeframe.bucket_start(c.open_time);
        match out.last_mut() {
            Some(last) if last.open_time == bucket => {
                last.high = last.high.max(c.high);
                last.low = last.low.min(c.low);
                last.close = c.close;
                last.volume += c.volume;
            }
            _ => out.push(Candle { open_time: bucket, ..*c }),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn minute(i: i64, price: f64) -> Candle {
        Candle {
            open_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 3, 0).unwrap() + Duration::minutes(i),
            open: price,
            high: price + 1.0,
            low: price - 1.0,
            close: price + 0.5,
            volume: 1.0,
        }
    }

    #[test]
    fn buckets_align_to_epoch() {
        // 00:03 .. 00:11 -> buckets 00:00 (2 bars), 00:05 (5 bars), 00:10 (2 bars)
        let bars: Vec<Candle> = (0..9).map(|i| minute(i, 100.0 + i as f64)).collect();
        let out = resample(&bars, Timeframe::M5);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].open_time, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(out[0].volume, 2.0);
        assert_eq!(out[1].open, 102.0);
        assert_eq!(out[1].close, 106.5);
        assert_eq!(out[1].high, 107.0);
        assert_eq!(out[1].low, 101.0);
        assert_eq!(out[2].volume, 2.0);
    }
}
