//! Weighted classification of sub-signals into CALL / PUT / NEUTRAL.
//!
//! The score is the weighted sum of the five sub-signals. Classification
//! uses the unrounded score; the reported score is rounded to three decimals
//! and the confidence to one.

use super::weights::{SignalWeights, WeightsError};
use super::SubSignals;
use crate::domain::{MarketObservation, OptionsSnapshot, Sourced, TrendSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const CALL_THRESHOLD: f64 = 0.3;
pub const PUT_THRESHOLD: f64 = -0.3;
pub const MAX_RATIONALE: usize = 3;

pub const MIXED_SIGNALS: &str = "Market showing mixed signals";

/// Display names accepted in place of index symbols.
pub const INDEX_NAMES: &[(&str, &str)] = &[
    ("Nifty 50", "^NSEI"),
    ("Bank Nifty", "^NSEBANK"),
    ("Sensex", "^BSESN"),
];

/// Map an index display name to its symbol; anything else is returned as is.
pub fn resolve_symbol(name: &str) -> &str {
    INDEX_NAMES
        .iter()
        .find(|(display, _)| display.eq_ignore_ascii_case(name))
        .map_or(name, |&(_, symbol)| symbol)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
    Call,
    Put,
    Neutral,
}

impl Classification {
    pub fn from_score(score: f64) -> Self {
        if score > CALL_THRESHOLD {
            Classification::Call
        } else if score < PUT_THRESHOLD {
            Classification::Put
        } else {
            Classification::Neutral
        }
    }

    /// Unrounded confidence for a score already classified as `self`.
    pub fn confidence(self, score: f64) -> f64 {
        let magnitude = score.abs();
        match self {
            Classification::Call | Classification::Put => (50.0 + magnitude * 50.0).min(95.0),
            Classification::Neutral => (50.0 - magnitude * 30.0).max(20.0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Call => "CALL",
            Classification::Put => "PUT",
            Classification::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn round_to(x: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (x * factor).round() / factor
}

/// Human-readable reasons, most significant first, at most three.
pub fn rationale(classification: Classification, s: &SubSignals) -> Vec<String> {
    let gated: Vec<(bool, &str)> = match classification {
        Classification::Call => vec![
            (s.price_momentum > 0.5, "Price is rising strongly"),
            (s.volume_pressure > 0.3, "High trading volume supporting upward move"),
            (s.options_sentiment > 0.3, "More traders buying CALL options"),
            (s.trend > 0.3, "Uptrend momentum continues"),
            (s.volatility > 0.2, "Price near day's high levels"),
        ],
        Classification::Put => vec![
            (s.price_momentum < -0.5, "Price is falling sharply"),
            (s.volume_pressure < -0.3, "Selling pressure increasing"),
            (s.options_sentiment < -0.3, "More traders buying PUT options"),
            (s.trend < -0.3, "Downtrend momentum continues"),
            (s.volatility < -0.2, "Price near day's low levels"),
        ],
        Classification::Neutral => vec![
            (true, MIXED_SIGNALS),
            (s.price_momentum.abs() < 0.2, "Price movement is minimal"),
            (s.volume_pressure.abs() < 0.2, "Trading volume is normal"),
        ],
    };

    let mut reasons: Vec<String> = gated
        .into_iter()
        .filter(|(passed, _)| *passed)
        .map(|(_, text)| text.to_string())
        .take(MAX_RATIONALE)
        .collect();
    if reasons.is_empty() {
        reasons.push(MIXED_SIGNALS.to_string());
    }
    reasons
}

/// Classification outcome without the inputs attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub classification: Classification,
    pub score: f64,
    pub confidence: f64,
    pub rationale: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalInputs {
    pub price: MarketObservation,
    pub options: OptionsSnapshot,
    pub trend: TrendSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub symbol: String,
    pub classification: Classification,
    pub score: f64,
    pub confidence: f64,
    pub rationale: Vec<String>,
    pub sub_signals: SubSignals,
    pub inputs: SignalInputs,
    /// True if any input was synthetic.
    pub degraded: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub degraded_reasons: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SignalAggregator {
    weights: SignalWeights,
}

impl Default for SignalAggregator {
    fn default() -> Self {
        Self {
            weights: SignalWeights::INDEX,
        }
    }
}

impl SignalAggregator {
    pub fn new(weights: SignalWeights) -> Result<Self, WeightsError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &SignalWeights {
        &self.weights
    }

    /// Unrounded weighted score.
    pub fn score(&self, s: &SubSignals) -> f64 {
        self.weights.combine(s, 0.0)
    }

    pub fn evaluate(&self, s: &SubSignals) -> Evaluation {
        let raw = self.score(s);
        let classification = Classification::from_score(raw);
        Evaluation {
            classification,
            score: round_to(raw, 3),
            confidence: round_to(classification.confidence(raw), 1),
            rationale: rationale(classification, s),
        }
    }

    pub fn aggregate(
        &self,
        symbol: &str,
        price: Sourced<MarketObservation>,
        options: Sourced<OptionsSnapshot>,
        trend: Sourced<TrendSnapshot>,
        timestamp: DateTime<Utc>,
    ) -> Signal {
        let degraded_reasons: Vec<String> = [price.reason(), options.reason(), trend.reason()]
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();

        let inputs = SignalInputs {
            price: price.into_inner(),
            options: options.into_inner(),
            trend: trend.into_inner(),
        };
        let sub_signals = SubSignals::from_inputs(&inputs.price, &inputs.options, &inputs.trend);
        let evaluation = self.evaluate(&sub_signals);

        Signal {
            symbol: symbol.to_string(),
            classification: evaluation.classification,
            score: evaluation.score,
            confidence: evaluation.confidence,
            rationale: evaluation.rationale,
            sub_signals,
            inputs,
            degraded: !degraded_reasons.is_empty(),
            degraded_reasons,
            timestamp,
        }
    }
}
