//! Per-symbol data resolution with cache and fallback.
//!
//! Every fetch follows the same policy:
//! 1. Live cache entry → return it as real data
//! 2. Otherwise ask the provider
//! 3. Non-empty answer → cache it and return it as real data
//! 4. Failure or empty answer → synthesize a placeholder, tagged synthetic,
//!    and do not cache it
//!
//! No error ever reaches the caller. Concurrent callers for one key share a
//! single resolution.

use super::cache::TieredCache;
use super::derive;
use super::fallback::FallbackSynthesizer;
use super::provider::{BarInterval, DataError, MarketDataProvider};
use super::single_flight::SingleFlight;
use crate::clock::Clock;
use crate::domain::{MarketObservation, OptionsSnapshot, Sourced, TrendSnapshot};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_TREND_PERIODS: usize = 20;

pub fn live_price_key(symbol: &str) -> String {
    format!("livePrice_{symbol}")
}

pub fn options_chain_key(symbol: &str) -> String {
    format!("optionsChain_{symbol}")
}

pub fn intraday_trend_key(symbol: &str, periods: usize) -> String {
    format!("intradayTrend_{symbol}_{periods}")
}

/// Cache lifetimes per data kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchTtls {
    pub live_price_secs: u64,
    pub options_secs: u64,
    pub trend_secs: u64,
}

impl Default for FetchTtls {
    fn default() -> Self {
        Self {
            live_price_secs: 30,
            options_secs: 60,
            trend_secs: 45,
        }
    }
}

/// Resolve `key` through the cache, then `fetch`, then `fallback`.
///
/// Only real values are cached. `fallback` receives the error that made the
/// real path fail.
pub fn fetch_or_fallback<T, F, G>(
    cache: &TieredCache,
    key: &str,
    ttl: Duration,
    fetch: F,
    fallback: G,
) -> Sourced<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Result<T, DataError>,
    G: FnOnce(&DataError) -> Sourced<T>,
{
    if let Some(hit) = cache.get_as::<T>(key, None) {
        return Sourced::Real(hit);
    }

    match fetch() {
        Ok(value) => {
            if let Err(e) = cache.set_as(key, &value, ttl) {
                warn!(key, error = %e, "could not cache fetched value");
            }
            Sourced::Real(value)
        }
        Err(e) => {
            warn!(key, error = %e, "provider failed, falling back");
            fallback(&e)
        }
    }
}

pub struct DataFetcher {
    cache: Arc<TieredCache>,
    provider: Arc<dyn MarketDataProvider>,
    synthesizer: FallbackSynthesizer,
    ttls: FetchTtls,
    clock: Arc<dyn Clock>,
    price_flights: SingleFlight<Sourced<MarketObservation>>,
    options_flights: SingleFlight<Sourced<OptionsSnapshot>>,
    trend_flights: SingleFlight<Sourced<TrendSnapshot>>,
}

impl DataFetcher {
    pub fn new(
        cache: Arc<TieredCache>,
        provider: Arc<dyn MarketDataProvider>,
        synthesizer: FallbackSynthesizer,
        ttls: FetchTtls,
    ) -> Self {
        let clock = cache.clock();
        Self {
            cache,
            provider,
            synthesizer,
            ttls,
            clock,
            price_flights: SingleFlight::new(),
            options_flights: SingleFlight::new(),
            trend_flights: SingleFlight::new(),
        }
    }

    pub fn cache(&self) -> &TieredCache {
        &self.cache
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn ttls(&self) -> FetchTtls {
        self.ttls
    }

    pub fn get_live_price(&self, symbol: &str) -> Sourced<MarketObservation> {
        let key = live_price_key(symbol);
        self.price_flights.run(&key, || {
            fetch_or_fallback(
                &self.cache,
                &key,
                Duration::from_secs(self.ttls.live_price_secs),
                || self.fetch_live_price(symbol),
                |_| self.synthesizer.price(symbol),
            )
        })
    }

    pub fn get_options_chain(&self, symbol: &str) -> Sourced<OptionsSnapshot> {
        let key = options_chain_key(symbol);
        self.options_flights.run(&key, || {
            fetch_or_fallback(
                &self.cache,
                &key,
                Duration::from_secs(self.ttls.options_secs),
                || self.fetch_options(symbol),
                |_| self.synthesizer.options(symbol),
            )
        })
    }

    /// Trend over the last `periods` 5-minute closes. A series shorter than
    /// `periods` is a real, flat result and is cached like any other.
    pub fn get_intraday_trend(&self, symbol: &str, periods: usize) -> Sourced<TrendSnapshot> {
        let key = intraday_trend_key(symbol, periods);
        self.trend_flights.run(&key, || {
            fetch_or_fallback(
                &self.cache,
                &key,
                Duration::from_secs(self.ttls.trend_secs),
                || self.fetch_trend(symbol, periods),
                |_| self.synthesizer.trend(symbol),
            )
        })
    }

    fn ensure_available(&self) -> Result<(), DataError> {
        if self.provider.is_available() {
            Ok(())
        } else {
            Err(DataError::Unavailable(self.provider.name().to_string()))
        }
    }

    fn fetch_live_price(&self, symbol: &str) -> Result<MarketObservation, DataError> {
        self.ensure_available()?;
        let bars = self
            .provider
            .fetch_intraday_series(symbol, BarInterval::OneMinute)?;
        let info = self.provider.fetch_static_info(symbol)?;
        debug!(symbol, bars = bars.len(), "fetched live price inputs");
        derive::observation_from_bars(symbol, &bars, &info, self.clock.now())
    }

    fn fetch_options(&self, symbol: &str) -> Result<OptionsSnapshot, DataError> {
        self.ensure_available()?;
        let chain = self.provider.fetch_options_chain(symbol)?;
        derive::options_snapshot(symbol, &chain, self.clock.now())
    }

    fn fetch_trend(&self, symbol: &str, periods: usize) -> Result<TrendSnapshot, DataError> {
        self.ensure_available()?;
        let bars = self
            .provider
            .fetch_intraday_series(symbol, BarInterval::FiveMinutes)?;
        derive::trend_from_bars(symbol, &bars, periods, self.clock.now())
    }
}
