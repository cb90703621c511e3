//! The market service: one object owning cache, fetcher, aggregator and
//! ranker, opened once and closed explicitly.

use std::sync::Arc;

use anyhow::{Context, Result};
use marketlens_core::clock::{Clock, SystemClock};
use marketlens_core::data::{
    CacheStats, CircuitBreaker, CleanupReport, DataFetcher, FallbackSynthesizer,
    MarketDataProvider, OfflineProvider, TieredCache, YahooProvider,
};
use marketlens_core::rng::SeedHierarchy;
use marketlens_core::signals::aggregator::{resolve_symbol, INDEX_NAMES};
use marketlens_core::signals::{
    NewsSentiment, PickTables, ScoredHeadline, Signal, SignalAggregator, StockCandidate,
    StockRanker, UniverseTier,
};
use marketlens_core::{MarketObservation, OptionsSnapshot, Sourced, TrendSnapshot};
use rayon::prelude::*;
use tracing::info;

use crate::config::{ProviderConfig, ServiceConfig};

/// Provider selected by the `[provider]` section.
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn MarketDataProvider>> {
    if config.offline {
        return Ok(Arc::new(OfflineProvider));
    }
    let breaker = Arc::new(CircuitBreaker::with_threshold(
        config.breaker_cooldown(),
        config.breaker_threshold,
    ));
    let provider = YahooProvider::new(breaker, config.yahoo_settings())
        .context("failed to build Yahoo Finance provider")?;
    Ok(Arc::new(provider))
}

pub struct MarketService {
    config: ServiceConfig,
    clock: Arc<dyn Clock>,
    fetcher: DataFetcher,
    aggregator: SignalAggregator,
    ranker: StockRanker,
}

impl MarketService {
    pub fn open(config: ServiceConfig) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(config: ServiceConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let provider = build_provider(&config.provider)?;
        Self::open_with_provider(config, provider, clock)
    }

    /// Assemble the service around an explicit provider.
    pub fn open_with_provider(
        config: ServiceConfig,
        provider: Arc<dyn MarketDataProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate().context("invalid service configuration")?;

        let cache = TieredCache::open_with_clock(&config.cache, Arc::clone(&clock))
            .with_context(|| format!("failed to open cache at {}", config.cache.dir.display()))?;

        let seeds = match config.fallback.seed {
            Some(seed) => SeedHierarchy::new(seed),
            None => SeedHierarchy::from_entropy(),
        };
        let synthesizer = FallbackSynthesizer::new(seeds, Arc::clone(&clock));

        let aggregator =
            SignalAggregator::new(config.weights.index).context("invalid index weights")?;
        let ranker = StockRanker::new(config.weights.ranking).context("invalid ranking weights")?;

        info!(
            provider = provider.name(),
            fallback_seed = synthesizer.master_seed(),
            universe = config.universe.len(),
            "market service opened"
        );

        let fetcher = DataFetcher::new(Arc::new(cache), provider, synthesizer, config.ttl);
        Ok(Self {
            config,
            clock,
            fetcher,
            aggregator,
            ranker,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.fetcher.provider_name()
    }

    pub fn get_live_price(&self, symbol: &str) -> Sourced<MarketObservation> {
        self.fetcher.get_live_price(symbol)
    }

    pub fn get_options_chain(&self, symbol: &str) -> Sourced<OptionsSnapshot> {
        self.fetcher.get_options_chain(symbol)
    }

    /// `None` uses the configured trend window.
    pub fn get_intraday_trend(&self, symbol: &str, periods: Option<usize>) -> Sourced<TrendSnapshot> {
        let periods = periods.unwrap_or(self.config.trend.periods);
        self.fetcher.get_intraday_trend(symbol, periods)
    }

    /// Classify a symbol or index display name ("Nifty 50", "Bank Nifty",
    /// "Sensex").
    pub fn get_signal(&self, name: &str) -> Signal {
        let symbol = resolve_symbol(name);
        let price = self.get_live_price(symbol);
        let options = self.get_options_chain(symbol);
        let trend = self.get_intraday_trend(symbol, None);
        self.aggregator
            .aggregate(symbol, price, options, trend, self.clock.now())
    }

    /// Signals for every tracked index, in display order.
    pub fn index_signals(&self) -> Vec<(&'static str, Signal)> {
        INDEX_NAMES
            .par_iter()
            .map(|&(display, symbol)| (display, self.get_signal(symbol)))
            .collect()
    }

    pub fn candidate(&self, symbol: &str, tier: UniverseTier) -> StockCandidate {
        StockCandidate {
            symbol: symbol.to_string(),
            tier,
            price: self.get_live_price(symbol),
            options: self.get_options_chain(symbol),
            trend: self.get_intraday_trend(symbol, None),
        }
    }

    /// Map scored headlines onto the configured universe.
    pub fn news_sentiment(&self, headlines: &[ScoredHeadline]) -> NewsSentiment {
        NewsSentiment::from_headlines(headlines, &self.config.universe.all_symbols())
    }

    /// Fetch the whole universe in parallel and rank it.
    pub fn pick_tables(&self, news: &NewsSentiment) -> PickTables {
        let candidates: Vec<StockCandidate> = self
            .config
            .universe
            .members()
            .into_par_iter()
            .map(|(symbol, tier)| self.candidate(symbol, tier))
            .collect();

        let degraded = candidates.iter().filter(|c| c.is_degraded()).count();
        let tables = self.ranker.tables(&candidates, news);
        info!(
            scanned = candidates.len(),
            degraded,
            regular = tables.regular.len(),
            penny = tables.penny.len(),
            "universe ranked"
        );
        tables
    }

    pub fn clear_cache(&self, pattern: Option<&str>) -> CleanupReport {
        self.fetcher.cache().clear(pattern)
    }

    pub fn cleanup_expired(&self) -> CleanupReport {
        self.fetcher.cache().cleanup_expired()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.fetcher.cache().stats()
    }

    pub fn persisted_keys(&self) -> Vec<String> {
        self.fetcher.cache().persisted_keys()
    }

    /// Sweep expired records and release the in-process tier.
    pub fn close(self) -> CleanupReport {
        let report = self.fetcher.cache().close();
        info!("market service closed");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketlens_core::ManualClock;
    use marketlens_core::signals::Classification;

    fn offline_config(dir: &std::path::Path) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.cache.dir = dir.to_path_buf();
        config.provider.offline = true;
        config.fallback.seed = Some(11);
        config
    }

    #[test]
    fn offline_signal_is_degraded_and_uncached() {
        let dir = tempfile::tempdir().unwrap();
        let service = MarketService::open_with_clock(
            offline_config(dir.path()),
            Arc::new(ManualClock::starting_now()),
        )
        .unwrap();
        assert_eq!(service.provider_name(), "offline");

        let signal = service.get_signal("Nifty 50");
        assert_eq!(signal.symbol, "^NSEI");
        assert!(signal.degraded);
        assert_eq!(signal.degraded_reasons.len(), 3);
        // Synthetic options never move the score.
        assert_eq!(signal.sub_signals.options_sentiment, 0.0);
        assert!(matches!(
            signal.classification,
            Classification::Call | Classification::Put | Classification::Neutral
        ));
        assert_eq!(service.cache_stats().persisted_records, 0);
    }

    #[test]
    fn index_signals_cover_every_index() {
        let dir = tempfile::tempdir().unwrap();
        let service = MarketService::open(offline_config(dir.path())).unwrap();
        let signals = service.index_signals();
        let names: Vec<&str> = signals.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["Nifty 50", "Bank Nifty", "Sensex"]);
        assert_eq!(signals[2].1.symbol, "^BSESN");
    }

    #[test]
    fn invalid_weights_fail_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = offline_config(dir.path());
        config.weights.index.trend = 0.9;
        assert!(MarketService::open(config).is_err());
    }
}
