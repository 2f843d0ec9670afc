use chrono::{Duration, TimeZone, Utc};
use common::Side;
use position::{Brackets, ExitRules, Position};
use proptest::prelude::*;

fn rules() -> ExitRules {
    ExitRules {
        tp_percent: 0.02,
        use_trailing: true,
        trailing_activation: 0.3,
        trailing_distance: 0.004,
        manual_grace: Duration::seconds(30),
    }
}

fn open(side: Side) -> Position {
    let t = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let (tp, sl) = match side {
        Side::Long => (102.0, 99.0),
        Side::Short => (98.0, 101.0),
    };
    Position::new("ETHUSDT", side, 100.0, 1.0, t, Brackets { tp_price: tp, sl_price: sl })
}

proptest! {
    /// The extreme never moves backwards and only follows the price while the trail is
    /// active; the trail fires exactly when an active position retraces the distance.
    #[test]
    fn long_trail_follows_current_profit(
        moves in prop::collection::vec(-0.01f64..0.01, 1..60),
    ) {
        let r = rules();
        let mut p = open(Side::Long);
        let mut price = 100.0;
        let mut high = p.highest_price;
        for m in moves {
            price *= 1.0 + m;
            let fired = p.trail(price, price, &r);

            let active = (price - 100.0) / 100.0 >= r.tp_percent * r.trailing_activation;
            prop_assert_eq!(p.trailing_active, active);
            if active {
                high = high.max(price);
            }
            prop_assert_eq!(p.highest_price, high);
            let retrace = (high - price) / high;
            prop_assert_eq!(fired, active && retrace >= r.trailing_distance);
            if fired {
                break;
            }
        }
    }

    #[test]
    fn short_extreme_only_falls(
        moves in prop::collection::vec(-0.01f64..0.01, 1..60),
    ) {
        let r = rules();
        let mut p = open(Side::Short);
        let mut price = 100.0;
        let mut prev_low = p.lowest_price;
        for m in moves {
            price *= 1.0 + m;
            let fired = p.trail(price, price, &r);
            prop_assert!(p.lowest_price <= prev_low);
            prev_low = p.lowest_price;
            if fired {
                prop_assert!(p.trailing_active);
                prop_assert!((100.0 - price) / 100.0 >= r.tp_percent * r.trailing_activation);
                prop_assert!((price - p.lowest_price) / p.lowest_price >= r.trailing_distance);
                break;
            }
        }
    }
}
