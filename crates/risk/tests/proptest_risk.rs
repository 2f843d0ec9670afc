use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use risk::{AccountGate, DailyRiskLimits, Rejection};

proptest! {
    /// Gate decisions on arbitrary balances and position counts never panic and
    /// never admit an entry at or past the position limit.
    #[test]
    fn gate_never_admits_past_limit(
        balance in -1_000.0f64..1_000_000.0,
        open in 0usize..50,
        limit in 1usize..20,
    ) {
        let gate = AccountGate { min_balance: 20.0, margin_per_trade: 100.0, max_total_positions: limit };
        match gate.check(balance, open) {
            Ok(()) => {
                prop_assert!(open < limit);
                prop_assert!(balance >= 100.0);
            }
            Err(Rejection::MaxPositions { open: o, limit: l }) => {
                prop_assert_eq!(o, open);
                prop_assert!(o >= l);
            }
            Err(_) => prop_assert!(balance < 100.0),
        }
    }

    /// Counters always start clean on a new UTC day.
    #[test]
    fn new_day_always_admits(
        pnls in prop::collection::vec(-50.0f64..50.0, 0..40),
        hours in 0i64..24,
    ) {
        let start = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let mut limits = DailyRiskLimits::new(5, 3, 0.05, 1000.0);
        for (i, pnl) in pnls.iter().enumerate() {
            let at = start + Duration::minutes(i as i64 * 10);
            if limits.check(at).is_ok() {
                limits.record_entry(at);
            }
            limits.record_exit(at, *pnl);
        }
        prop_assert!(limits.check(start + Duration::days(1) + Duration::hours(hours)).is_ok());
    }
}
