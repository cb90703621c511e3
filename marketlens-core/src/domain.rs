//! Observation records shared by the fetcher, the synthesizer and the scorers.
//!
//! All records are plain immutable values created fresh per fetch. They
//! serialize to JSON, which is also their cached representation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three kinds of data a symbol can be fetched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Price,
    Options,
    Trend,
}

impl DataKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DataKind::Price => "price",
            DataKind::Options => "options",
            DataKind::Trend => "trend",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live price reading for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketObservation {
    pub symbol: String,
    pub current_price: f64,
    pub price_change: f64,
    pub price_change_pct: f64,
    pub volume: u64,
    pub avg_volume: u64,
    pub volume_ratio: f64,
    pub day_high: f64,
    pub day_low: f64,
    pub open_price: f64,
    pub timestamp: DateTime<Utc>,
    pub is_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

/// Aggregated open interest and implied volatility for the nearest expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsSnapshot {
    pub symbol: String,
    pub total_call_oi: f64,
    pub total_put_oi: f64,
    pub put_call_ratio: f64,
    pub avg_call_iv: f64,
    pub avg_put_iv: f64,
    pub expiry_date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    pub is_synthetic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthetic_reason: Option<String>,
}

/// Short-term trend direction, serialized as -1 / 0 / 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum TrendDirection {
    Bearish,
    Neutral,
    Bullish,
}

impl TrendDirection {
    pub const ALL: [TrendDirection; 3] = [
        TrendDirection::Bearish,
        TrendDirection::Neutral,
        TrendDirection::Bullish,
    ];

    pub fn as_i8(self) -> i8 {
        match self {
            TrendDirection::Bearish => -1,
            TrendDirection::Neutral => 0,
            TrendDirection::Bullish => 1,
        }
    }

    pub fn sign(self) -> f64 {
        f64::from(self.as_i8())
    }

    pub fn label(self) -> &'static str {
        match self {
            TrendDirection::Bearish => "BEARISH",
            TrendDirection::Neutral => "NEUTRAL",
            TrendDirection::Bullish => "BULLISH",
        }
    }
}

impl From<TrendDirection> for i8 {
    fn from(direction: TrendDirection) -> Self {
        direction.as_i8()
    }
}

impl TryFrom<i8> for TrendDirection {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(TrendDirection::Bearish),
            0 => Ok(TrendDirection::Neutral),
            1 => Ok(TrendDirection::Bullish),
            other => Err(format!("trend direction must be -1, 0 or 1, got {other}")),
        }
    }
}

/// How a trend snapshot was obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrendBasis {
    /// Least-squares fit over this many closes.
    Regression { bars: usize },
    /// The provider answered, but with fewer bars than requested.
    InsufficientData { available: usize, required: usize },
    /// Placeholder produced because the provider failed.
    Synthetic { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSnapshot {
    pub symbol: String,
    pub direction: TrendDirection,
    /// Normalized strength in `[0, 10]`.
    pub strength: f64,
    pub slope: f64,
    pub timestamp: DateTime<Utc>,
    pub basis: TrendBasis,
}

impl TrendSnapshot {
    /// Flat, zero-strength trend for a series shorter than `required`.
    pub fn insufficient(
        symbol: &str,
        available: usize,
        required: usize,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            direction: TrendDirection::Neutral,
            strength: 0.0,
            slope: 0.0,
            timestamp,
            basis: TrendBasis::InsufficientData {
                available,
                required,
            },
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.basis, TrendBasis::Synthetic { .. })
    }

    pub fn has_sufficient_data(&self) -> bool {
        !matches!(self.basis, TrendBasis::InsufficientData { .. })
    }
}

/// Provenance of a fetched value.
///
/// Every fetch resolves to a value. `Synthetic` carries the reason the real
/// data could not be used; callers decide how much to trust it.
#[derive(Debug, Clone, PartialEq)]
pub enum Sourced<T> {
    Real(T),
    Synthetic(T, String),
}

impl<T> Sourced<T> {
    pub fn value(&self) -> &T {
        match self {
            Sourced::Real(value) | Sourced::Synthetic(value, _) => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Sourced::Real(value) | Sourced::Synthetic(value, _) => value,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, Sourced::Synthetic(..))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Sourced::Real(_) => None,
            Sourced::Synthetic(_, reason) => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sourced<U> {
        match self {
            Sourced::Real(value) => Sourced::Real(f(value)),
            Sourced::Synthetic(value, reason) => Sourced::Synthetic(f(value), reason),
        }
    }
}
