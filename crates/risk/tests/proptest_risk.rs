use proptest::prelude::*;

use common::{FundamentalTier, Regime, Side};
use risk::{ConfluenceMap, ConfluencePoi, DcaInputs, DcaPlanner, PredictiveTargets};
use strategy::indicators::{FibTrend, Fibonacci};

fn fib_around(price: f64) -> Fibonacci {
    let (low, high) = (price * 0.8, price * 1.1);
    let r = high - low;
    Fibonacci {
        trend: FibTrend::Up,
        level0: high,
        level236: high - 0.236 * r,
        level382: high - 0.382 * r,
        level5: high - 0.5 * r,
        level618: high - 0.618 * r,
        level786: high - 0.786 * r,
        level1: low,
        tp1: high + 0.272 * r,
        tp2: high + 0.414 * r,
        tp3: high + 0.618 * r,
        tp4: high + r,
        tp5: high + 1.618 * r,
    }
}

fn pois(price: f64, offsets: &[f64]) -> Vec<ConfluencePoi> {
    offsets
        .iter()
        .map(|o| ConfluencePoi { price: price + o, score: 3.0, factors: vec!["prop".into()] })
        .collect()
}

fn side_strategy() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Long), Just(Side::Short)]
}

fn regime_strategy() -> impl Strategy<Value = Regime> {
    prop_oneof![
        Just(Regime::Trending),
        Just(Regime::Ranging),
        Just(Regime::Volatile),
        Just(Regime::Extreme),
    ]
}

proptest! {
    /// Ladder, stop and targets keep their geometric relationships for any
    /// positive price and ATR, with or without nearby structure.
    #[test]
    fn plan_geometry_holds(
        price in 0.01f64..100_000.0,
        atr_pct in 0.001f64..0.1,
        side in side_strategy(),
        regime in regime_strategy(),
        support_offsets in prop::collection::vec(-0.2f64..-0.001, 0..5),
        resistance_offsets in prop::collection::vec(0.001f64..0.2, 0..5),
        wall_offset in prop::option::of(-0.2f64..0.2),
    ) {
        let atr = price * atr_pct;
        let map = ConfluenceMap {
            top_supports: pois(price, &support_offsets.iter().map(|o| o * price).collect::<Vec<_>>()),
            top_resistances: pois(price, &resistance_offsets.iter().map(|o| o * price).collect::<Vec<_>>()),
        };
        let fib = fib_around(price);
        let inputs = DcaInputs {
            side,
            price,
            atr,
            regime,
            tier: FundamentalTier::B,
            pois: &map,
            fibonacci: &fib,
            harmonics: &[],
            predictive: PredictiveTargets {
                order_book_wall: wall_offset.map(|o| price * (1.0 + o)),
                ..PredictiveTargets::default()
            },
        };
        let plan = DcaPlanner::default().plan(&inputs).unwrap();
        let sign = side.sign();

        let total: f64 = plan.entries.iter().map(|e| e.allocation_pct).sum();
        prop_assert!((total - 100.0).abs() < 1e-9);

        let dist = |p: f64| (price - p) * sign;
        prop_assert_eq!(plan.entries[0].price, price);
        prop_assert!(dist(plan.entries[1].price) > 0.0);
        prop_assert!(dist(plan.entries[2].price) > dist(plan.entries[1].price));

        prop_assert!((plan.average_entry - plan.stop_loss) * sign > 0.0);
        prop_assert!((plan.entries[2].price - plan.stop_loss) * sign > 0.0);

        let tps = plan.targets();
        prop_assert!((tps.tp1 - plan.average_entry) * sign > 0.0);
        prop_assert!((tps.tp2 - tps.tp1) * sign > 0.0);
        prop_assert!((tps.tp3 - tps.tp2) * sign > 0.0);
        prop_assert!(plan.reward_risk.is_finite() && plan.reward_risk > 0.0);
    }

    /// Blue chips get wider stops than speculative assets on identical input.
    #[test]
    fn s_tier_stop_is_wider_than_c_tier(
        price in 1.0f64..100_000.0,
        atr_pct in 0.001f64..0.05,
        side in side_strategy(),
    ) {
        let map = ConfluenceMap::default();
        let fib = fib_around(price);
        let planner = DcaPlanner::default();
        let plan_for = |tier| {
            planner
                .plan(&DcaInputs {
                    side,
                    price,
                    atr: price * atr_pct,
                    regime: Regime::Ranging,
                    tier,
                    pois: &map,
                    fibonacci: &fib,
                    harmonics: &[],
                    predictive: PredictiveTargets::default(),
                })
                .unwrap()
        };
        let s = plan_for(FundamentalTier::S);
        let c = plan_for(FundamentalTier::C);
        prop_assert!((s.average_entry - s.stop_loss).abs() > (c.average_entry - c.stop_loss).abs());
    }
}
