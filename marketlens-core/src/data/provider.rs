//! Market-data provider trait and structured error types.
//!
//! `MarketDataProvider` abstracts over upstream sources (Yahoo Finance, the
//! offline stub, test doubles). The cache and fallback layers sit above this
//! trait; providers know nothing about either.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Intraday bar width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarInterval {
    OneMinute,
    FiveMinutes,
}

impl BarInterval {
    /// Interval string understood by the chart endpoint.
    pub fn as_query(self) -> &'static str {
        match self {
            BarInterval::OneMinute => "1m",
            BarInterval::FiveMinutes => "5m",
        }
    }
}

/// One raw intraday OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntradayBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub strike: f64,
    pub open_interest: f64,
    pub implied_volatility: f64,
}

/// Calls and puts for the nearest expiry, plus every listed expiry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsChain {
    pub calls: Vec<OptionContract>,
    pub puts: Vec<OptionContract>,
    pub expiries: Vec<NaiveDate>,
}

/// Slow-moving reference values for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticInfo {
    pub previous_close: f64,
    pub average_volume: u64,
}

/// Structured error types for provider operations.
///
/// None of these reach the caller of the fetcher: every variant resolves to
/// synthetic fallback data. They exist for logging and for tests.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status} for {symbol}")]
    HttpStatus { status: u16, symbol: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("empty {what} for {symbol}")]
    EmptyResult { symbol: String, what: &'static str },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Trait for market-data sources.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Today's intraday bars, oldest first.
    fn fetch_intraday_series(
        &self,
        symbol: &str,
        interval: BarInterval,
    ) -> Result<Vec<IntradayBar>, DataError>;

    /// Option chain for the nearest expiry.
    fn fetch_options_chain(&self, symbol: &str) -> Result<OptionsChain, DataError>;

    /// Previous close and average daily volume.
    fn fetch_static_info(&self, symbol: &str) -> Result<StaticInfo, DataError>;

    /// Whether the provider is currently accepting requests.
    fn is_available(&self) -> bool;
}

/// Provider with no upstream. Every request fails, so every fetch resolves
/// through the fallback synthesizer.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineProvider;

impl OfflineProvider {
    fn offline() -> DataError {
        DataError::Unavailable("offline mode".to_string())
    }
}

impl MarketDataProvider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    fn fetch_intraday_series(
        &self,
        _symbol: &str,
        _interval: BarInterval,
    ) -> Result<Vec<IntradayBar>, DataError> {
        Err(Self::offline())
    }

    fn fetch_options_chain(&self, _symbol: &str) -> Result<OptionsChain, DataError> {
        Err(Self::offline())
    }

    fn fetch_static_info(&self, _symbol: &str) -> Result<StaticInfo, DataError> {
        Err(Self::offline())
    }

    fn is_available(&self) -> bool {
        false
    }
}
