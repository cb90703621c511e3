//! Synthetic placeholder data for when the provider cannot answer.
//!
//! Values are a static per-symbol base perturbed by bounded noise from the
//! seeded [`SeedHierarchy`]. They are structurally valid and always flagged
//! synthetic; nothing about them tracks the real market.

use crate::clock::{Clock, SystemClock};
use crate::domain::{
    DataKind, MarketObservation, OptionsSnapshot, Sourced, TrendBasis, TrendDirection,
    TrendSnapshot,
};
use crate::rng::SeedHierarchy;
use chrono::Days;
use rand::Rng;
use std::sync::Arc;
use tracing::warn;

pub const PRICE_FALLBACK_REASON: &str = "Real-time data unavailable";
pub const OPTIONS_FALLBACK_REASON: &str = "Options data unavailable";
pub const TREND_FALLBACK_REASON: &str = "Trend analysis unavailable";

pub const DEFAULT_BASE_PRICE: f64 = 1000.0;

const BASE_PRICES: &[(&str, f64)] = &[
    ("^NSEI", 23_500.0),
    ("^NSEBANK", 60_000.0),
    ("^BSESN", 78_000.0),
    ("RELIANCE.NS", 2_800.0),
    ("TCS.NS", 3_800.0),
    ("INFY.NS", 1_600.0),
    ("HDFCBANK.NS", 1_700.0),
    ("ICICIBANK.NS", 1_000.0),
];

const INDEX_BASE_OI: f64 = 50_000.0;
const STOCK_BASE_OI: f64 = 10_000.0;
const SYNTHETIC_EXPIRY_DAYS: u64 = 7;

/// Reference price used to centre synthetic quotes.
pub fn base_price(symbol: &str) -> f64 {
    BASE_PRICES
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|&(_, price)| price)
        .unwrap_or(DEFAULT_BASE_PRICE)
}

pub struct FallbackSynthesizer {
    seeds: SeedHierarchy,
    clock: Arc<dyn Clock>,
}

impl FallbackSynthesizer {
    pub fn new(seeds: SeedHierarchy, clock: Arc<dyn Clock>) -> Self {
        Self { seeds, clock }
    }

    /// Reproducible synthesizer on the system clock.
    pub fn seeded(seed: u64) -> Self {
        Self::new(SeedHierarchy::new(seed), Arc::new(SystemClock))
    }

    pub fn from_entropy() -> Self {
        Self::new(SeedHierarchy::from_entropy(), Arc::new(SystemClock))
    }

    pub fn master_seed(&self) -> u64 {
        self.seeds.master_seed()
    }

    pub fn price(&self, symbol: &str) -> Sourced<MarketObservation> {
        warn!(symbol, kind = %DataKind::Price, "serving synthetic data");
        let mut rng = self.seeds.next_rng(symbol, DataKind::Price);
        let base = base_price(symbol);

        let variation: f64 = rng.gen_range(-0.02..=0.02);
        let current = base * (1.0 + variation);
        let volume = rng.gen_range(1_000_000..=10_000_000u64);
        let avg_volume = rng.gen_range(2_000_000..=8_000_000u64);
        let volume_ratio = rng.gen_range(0.5..=2.0);
        let day_high = current * rng.gen_range(1.0..=1.03);
        let day_low = current * rng.gen_range(0.97..=1.0);

        let observation = MarketObservation {
            symbol: symbol.to_string(),
            current_price: current,
            price_change: current - base,
            price_change_pct: variation * 100.0,
            volume,
            avg_volume,
            volume_ratio,
            day_high,
            day_low,
            open_price: base,
            timestamp: self.clock.now(),
            is_fallback: true,
            fallback_reason: Some(PRICE_FALLBACK_REASON.to_string()),
        };
        Sourced::Synthetic(observation, PRICE_FALLBACK_REASON.to_string())
    }

    pub fn options(&self, symbol: &str) -> Sourced<OptionsSnapshot> {
        warn!(symbol, kind = %DataKind::Options, "serving synthetic data");
        let mut rng = self.seeds.next_rng(symbol, DataKind::Options);
        let base_oi = if symbol.contains('^') {
            INDEX_BASE_OI
        } else {
            STOCK_BASE_OI
        };

        let total_call_oi = base_oi * rng.gen_range(0.8..=1.5);
        let total_put_oi = base_oi * rng.gen_range(0.6..=1.2);
        let avg_call_iv = rng.gen_range(0.15..=0.35);
        let avg_put_iv = rng.gen_range(0.18..=0.40);

        let now = self.clock.now();
        let today = now.date_naive();
        let expiry_date = today
            .checked_add_days(Days::new(SYNTHETIC_EXPIRY_DAYS))
            .unwrap_or(today);

        let snapshot = OptionsSnapshot {
            symbol: symbol.to_string(),
            total_call_oi,
            total_put_oi,
            put_call_ratio: total_put_oi / total_call_oi,
            avg_call_iv,
            avg_put_iv,
            expiry_date,
            timestamp: now,
            is_synthetic: true,
            synthetic_reason: Some(OPTIONS_FALLBACK_REASON.to_string()),
        };
        Sourced::Synthetic(snapshot, OPTIONS_FALLBACK_REASON.to_string())
    }

    pub fn trend(&self, symbol: &str) -> Sourced<TrendSnapshot> {
        warn!(symbol, kind = %DataKind::Trend, "serving synthetic data");
        let mut rng = self.seeds.next_rng(symbol, DataKind::Trend);

        let direction = TrendDirection::ALL[rng.gen_range(0..TrendDirection::ALL.len())];
        let strength = rng.gen_range(0.0..=5.0);
        let slope = direction.sign() * rng.gen_range(0.0..=0.1);

        let snapshot = TrendSnapshot {
            symbol: symbol.to_string(),
            direction,
            strength,
            slope,
            timestamp: self.clock.now(),
            basis: TrendBasis::Synthetic {
                reason: TREND_FALLBACK_REASON.to_string(),
            },
        };
        Sourced::Synthetic(snapshot, TREND_FALLBACK_REASON.to_string())
    }
}
