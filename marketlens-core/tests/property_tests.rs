//! Property tests for scoring and key-encoding invariants.
//!
//! Uses proptest to verify:
//! 1. Sub-signal bounds: every sub-signal stays within [-1, 1]
//! 2. Score bounds: index scores stay within [-1, 1], confidence within [20, 95]
//! 3. Ranking bounds: overall scores are non-negative and at most 1
//! 4. Key encoding: injective, and reversible for unshortened names

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use marketlens_core::data::storage_key;
use marketlens_core::signals::{SignalAggregator, SignalWeights, SubSignals};
use marketlens_core::{
    MarketObservation, OptionsSnapshot, TrendBasis, TrendDirection, TrendSnapshot,
};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_float() -> impl Strategy<Value = f64> {
    prop_oneof![
        8 => -1000.0..1000.0_f64,
        1 => prop::num::f64::ANY,
    ]
}

fn arb_observation() -> impl Strategy<Value = MarketObservation> {
    (arb_float(), 0.0..20.0_f64, arb_float(), arb_float(), arb_float()).prop_map(
        |(pct, ratio, low, price, high)| MarketObservation {
            symbol: "X".into(),
            current_price: price,
            price_change: 0.0,
            price_change_pct: pct,
            volume: 1,
            avg_volume: 1,
            volume_ratio: ratio,
            day_high: high,
            day_low: low,
            open_price: price,
            timestamp: Utc::now(),
            is_fallback: false,
            fallback_reason: None,
        },
    )
}

fn arb_options() -> impl Strategy<Value = OptionsSnapshot> {
    (arb_float(), any::<bool>()).prop_map(|(pcr, synthetic)| OptionsSnapshot {
        symbol: "X".into(),
        total_call_oi: 1.0,
        total_put_oi: pcr,
        put_call_ratio: pcr,
        avg_call_iv: 0.2,
        avg_put_iv: 0.2,
        expiry_date: NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
        timestamp: Utc::now(),
        is_synthetic: synthetic,
        synthetic_reason: None,
    })
}

fn arb_trend() -> impl Strategy<Value = TrendSnapshot> {
    (prop::sample::select(TrendDirection::ALL.to_vec()), arb_float()).prop_map(
        |(direction, strength)| TrendSnapshot {
            symbol: "X".into(),
            direction,
            strength,
            slope: 0.0,
            timestamp: Utc::now(),
            basis: TrendBasis::Regression { bars: 20 },
        },
    )
}

fn arb_sub_signals() -> impl Strategy<Value = SubSignals> {
    (arb_observation(), arb_options(), arb_trend())
        .prop_map(|(p, o, t)| SubSignals::from_inputs(&p, &o, &t))
}

fn in_unit(x: f64) -> bool {
    x.is_finite() && (-1.0..=1.0).contains(&x)
}

// ── 1. Sub-signal bounds ─────────────────────────────────────────────

proptest! {
    #[test]
    fn sub_signals_are_bounded(s in arb_sub_signals()) {
        prop_assert!(in_unit(s.price_momentum));
        prop_assert!(in_unit(s.volume_pressure));
        prop_assert!(in_unit(s.options_sentiment));
        prop_assert!(in_unit(s.trend));
        prop_assert!(in_unit(s.volatility));
    }
}

// ── 2. Score bounds ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn index_score_and_confidence_are_bounded(s in arb_sub_signals()) {
        let evaluation = SignalAggregator::default().evaluate(&s);
        prop_assert!(in_unit(evaluation.score));
        prop_assert!((20.0..=95.0).contains(&evaluation.confidence));
        prop_assert!(!evaluation.rationale.is_empty());
        prop_assert!(evaluation.rationale.len() <= 3);
    }
}

// ── 3. Ranking bounds ────────────────────────────────────────────────

proptest! {
    #[test]
    fn ranking_score_is_in_unit_interval(s in arb_sub_signals(), news in -1.0..=1.0_f64) {
        let score = SignalWeights::RANKING.combine_positive(&s, news);
        prop_assert!(score.is_finite());
        prop_assert!((0.0..=1.0 + 1e-12).contains(&score));
    }
}

// ── 4. Key encoding ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn distinct_keys_get_distinct_names(a in ".{0,200}", b in ".{0,200}") {
        prop_assume!(a != b);
        prop_assert_ne!(storage_key::encode(&a), storage_key::encode(&b));
    }

    #[test]
    fn short_names_decode_to_their_key(key in ".{0,13}") {
        let stem = storage_key::encode(&key);
        prop_assert!(!storage_key::is_shortened(&stem));
        prop_assert_eq!(storage_key::decode(&stem), Some(key));
    }

    #[test]
    fn names_are_file_system_safe(key in ".{0,400}") {
        let stem = storage_key::encode(&key);
        prop_assert!(stem.len() <= storage_key::MAX_ENCODED_LEN);
        prop_assert!(!stem.is_empty() && !stem.starts_with('.'));
        prop_assert!(stem
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_.%~".contains(&b)));
    }
}
