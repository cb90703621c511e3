//! Validated weight vectors for combining sub-signals.

use super::SubSignals;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error, PartialEq)]
pub enum WeightsError {
    #[error("weight '{name}' is negative or not finite: {value}")]
    Invalid { name: &'static str, value: f64 },

    #[error("weights must sum to 1, got {sum}")]
    BadSum { sum: f64 },
}

/// One weight per sub-signal plus an optional news term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalWeights {
    pub price_momentum: f64,
    pub volume_pressure: f64,
    pub options_sentiment: f64,
    pub trend: f64,
    pub volatility: f64,
    #[serde(default)]
    pub news: f64,
}

impl SignalWeights {
    /// Weights for index signals.
    pub const INDEX: SignalWeights = SignalWeights {
        price_momentum: 0.30,
        volume_pressure: 0.20,
        options_sentiment: 0.25,
        trend: 0.15,
        volatility: 0.10,
        news: 0.0,
    };

    /// Weights for ranking individual stocks, with a news term.
    pub const RANKING: SignalWeights = SignalWeights {
        price_momentum: 0.25,
        volume_pressure: 0.20,
        options_sentiment: 0.20,
        trend: 0.15,
        volatility: 0.10,
        news: 0.10,
    };

    fn named(&self) -> [(&'static str, f64); 6] {
        [
            ("price_momentum", self.price_momentum),
            ("volume_pressure", self.volume_pressure),
            ("options_sentiment", self.options_sentiment),
            ("trend", self.trend),
            ("volatility", self.volatility),
            ("news", self.news),
        ]
    }

    pub fn sum(&self) -> f64 {
        self.named().iter().map(|(_, w)| w).sum()
    }

    pub fn validate(&self) -> Result<(), WeightsError> {
        for (name, value) in self.named() {
            if !value.is_finite() || value < 0.0 {
                return Err(WeightsError::Invalid { name, value });
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(WeightsError::BadSum { sum });
        }
        Ok(())
    }

    /// Signed weighted sum.
    pub fn combine(&self, s: &SubSignals, news: f64) -> f64 {
        s.price_momentum * self.price_momentum
            + s.volume_pressure * self.volume_pressure
            + s.options_sentiment * self.options_sentiment
            + s.trend * self.trend
            + s.volatility * self.volatility
            + news * self.news
    }

    /// Weighted sum of the positive parts only.
    pub fn combine_positive(&self, s: &SubSignals, news: f64) -> f64 {
        let positive = SubSignals {
            price_momentum: s.price_momentum.max(0.0),
            volume_pressure: s.volume_pressure.max(0.0),
            options_sentiment: s.options_sentiment.max(0.0),
            trend: s.trend.max(0.0),
            volatility: s.volatility.max(0.0),
        };
        self.combine(&positive, news.max(0.0))
    }
}
