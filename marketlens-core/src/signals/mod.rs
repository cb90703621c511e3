//! Signal scoring: sub-signal extraction, weighted classification, stock
//! ranking and news sentiment.
//!
//! Every sub-signal is normalized to `[-1, 1]`, positive meaning bullish.

pub mod aggregator;
pub mod news;
pub mod ranking;
pub mod weights;

pub use aggregator::{Classification, Signal, SignalAggregator, SignalInputs};
pub use news::{NewsSentiment, ScoredHeadline};
pub use ranking::{PickTables, StockCandidate, StockPick, StockRanker, UniverseTier};
pub use weights::{SignalWeights, WeightsError};

use crate::domain::{MarketObservation, OptionsSnapshot, TrendSnapshot};
use serde::{Deserialize, Serialize};

/// The five normalized market sub-signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SubSignals {
    pub price_momentum: f64,
    pub volume_pressure: f64,
    pub options_sentiment: f64,
    pub trend: f64,
    pub volatility: f64,
}

impl SubSignals {
    pub fn from_inputs(
        price: &MarketObservation,
        options: &OptionsSnapshot,
        trend: &TrendSnapshot,
    ) -> Self {
        Self {
            price_momentum: price_momentum(price),
            volume_pressure: volume_pressure(price),
            options_sentiment: options_sentiment(options),
            trend: trend_signal(trend),
            volatility: volatility_signal(price),
        }
    }
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// Half the percent change, clamped.
pub fn price_momentum(price: &MarketObservation) -> f64 {
    (finite_or_zero(price.price_change_pct) / 2.0).clamp(-1.0, 1.0)
}

/// Heavy volume amplifies the direction of the move.
pub fn volume_pressure(price: &MarketObservation) -> f64 {
    let pct = finite_or_zero(price.price_change_pct);
    let ratio = finite_or_zero(price.volume_ratio);
    let raw = if ratio > 1.5 {
        if pct > 0.0 {
            0.8
        } else if pct < 0.0 {
            -0.8
        } else {
            0.2
        }
    } else if ratio > 1.2 {
        pct / 5.0
    } else {
        pct / 10.0
    };
    raw.clamp(-1.0, 1.0)
}

/// Low put/call ratio is bullish. Synthetic options carry no information.
pub fn options_sentiment(options: &OptionsSnapshot) -> f64 {
    if options.is_synthetic {
        return 0.0;
    }
    let pcr = options.put_call_ratio;
    if !pcr.is_finite() {
        return 0.0;
    }
    let raw = if pcr < 0.8 {
        0.7
    } else if pcr > 1.2 {
        -0.7
    } else {
        (1.0 - pcr) * 1.5
    };
    raw.clamp(-1.0, 1.0)
}

pub fn trend_signal(trend: &TrendSnapshot) -> f64 {
    let strength = finite_or_zero(trend.strength).max(0.0);
    trend.direction.sign() * (strength / 5.0).min(1.0)
}

/// Where the price sits in the day's range, mapped to `[-1, 1]`.
pub fn volatility_signal(price: &MarketObservation) -> f64 {
    let range = price.day_high - price.day_low;
    if !range.is_finite() || range <= 0.0 {
        return 0.0;
    }
    let position = ((price.current_price - price.day_low) / range).clamp(0.0, 1.0);
    if position.is_finite() {
        (position - 0.5) * 2.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TrendBasis, TrendDirection};
    use chrono::{NaiveDate, Utc};

    fn observation(pct: f64, ratio: f64, low: f64, price: f64, high: f64) -> MarketObservation {
        MarketObservation {
            symbol: "X".into(),
            current_price: price,
            price_change: 0.0,
            price_change_pct: pct,
            volume: 1_000,
            avg_volume: 1_000,
            volume_ratio: ratio,
            day_high: high,
            day_low: low,
            open_price: price,
            timestamp: Utc::now(),
            is_fallback: false,
            fallback_reason: None,
        }
    }

    fn options(pcr: f64, synthetic: bool) -> OptionsSnapshot {
        OptionsSnapshot {
            symbol: "X".into(),
            total_call_oi: 100.0,
            total_put_oi: 100.0 * pcr,
            put_call_ratio: pcr,
            avg_call_iv: 0.2,
            avg_put_iv: 0.2,
            expiry_date: NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
            timestamp: Utc::now(),
            is_synthetic: synthetic,
            synthetic_reason: None,
        }
    }

    fn trend(direction: TrendDirection, strength: f64) -> TrendSnapshot {
        TrendSnapshot {
            symbol: "X".into(),
            direction,
            strength,
            slope: 0.0,
            timestamp: Utc::now(),
            basis: TrendBasis::Regression { bars: 20 },
        }
    }

    #[test]
    fn momentum_is_half_pct_clamped() {
        assert_eq!(price_momentum(&observation(1.0, 1.0, 1.0, 1.0, 1.0)), 0.5);
        assert_eq!(price_momentum(&observation(-5.0, 1.0, 1.0, 1.0, 1.0)), -1.0);
    }

    #[test]
    fn volume_pressure_bands() {
        assert_eq!(volume_pressure(&observation(1.0, 2.0, 1.0, 1.0, 1.0)), 0.8);
        assert_eq!(volume_pressure(&observation(-1.0, 2.0, 1.0, 1.0, 1.0)), -0.8);
        assert_eq!(volume_pressure(&observation(0.0, 2.0, 1.0, 1.0, 1.0)), 0.2);
        assert_eq!(volume_pressure(&observation(2.0, 1.3, 1.0, 1.0, 1.0)), 0.4);
        assert_eq!(volume_pressure(&observation(2.0, 1.0, 1.0, 1.0, 1.0)), 0.2);
        assert_eq!(volume_pressure(&observation(40.0, 1.3, 1.0, 1.0, 1.0)), 1.0);
    }

    #[test]
    fn options_sentiment_bands() {
        assert_eq!(options_sentiment(&options(0.5, false)), 0.7);
        assert_eq!(options_sentiment(&options(1.5, false)), -0.7);
        assert!((options_sentiment(&options(1.0, false))).abs() < 1e-12);
        assert!((options_sentiment(&options(0.9, false)) - 0.15).abs() < 1e-12);
        assert_eq!(options_sentiment(&options(0.5, true)), 0.0);
    }

    #[test]
    fn trend_signal_scales_with_strength() {
        assert_eq!(trend_signal(&trend(TrendDirection::Bullish, 2.5)), 0.5);
        assert_eq!(trend_signal(&trend(TrendDirection::Bearish, 9.0)), -1.0);
        assert_eq!(trend_signal(&trend(TrendDirection::Neutral, 9.0)), 0.0);
    }

    #[test]
    fn volatility_position_in_range() {
        assert_eq!(volatility_signal(&observation(0.0, 1.0, 90.0, 110.0, 110.0)), 1.0);
        assert_eq!(volatility_signal(&observation(0.0, 1.0, 90.0, 90.0, 110.0)), -1.0);
        assert_eq!(volatility_signal(&observation(0.0, 1.0, 90.0, 100.0, 110.0)), 0.0);
        assert_eq!(volatility_signal(&observation(0.0, 1.0, 100.0, 100.0, 100.0)), 0.0);
        // Outside the recorded range is clamped.
        assert_eq!(volatility_signal(&observation(0.0, 1.0, 90.0, 120.0, 110.0)), 1.0);
    }
}
