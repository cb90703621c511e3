//! Market data: provider access, caching, fallback synthesis

pub mod cache;
pub mod circuit_breaker;
pub mod derive;
pub mod fallback;
pub mod fetcher;
pub mod provider;
pub mod single_flight;
pub mod storage_key;
pub mod yahoo;

pub use cache::{CacheConfig, CacheError, CacheRecord, CacheStats, CleanupReport, TieredCache};
pub use circuit_breaker::CircuitBreaker;
pub use fallback::FallbackSynthesizer;
pub use fetcher::{fetch_or_fallback, DataFetcher, FetchTtls};
pub use provider::{
    BarInterval, DataError, IntradayBar, MarketDataProvider, OfflineProvider, OptionContract,
    OptionsChain, StaticInfo,
};
pub use single_flight::SingleFlight;
pub use yahoo::{YahooProvider, YahooSettings};
