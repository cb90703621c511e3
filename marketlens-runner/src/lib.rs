//! MarketLens Runner: service assembly, configuration and export.
//!
//! This crate builds on `marketlens-core` to provide:
//! - TOML service configuration with validated defaults
//! - The stock universe scanned for picks
//! - `MarketService`, the single entry point for prices, signals and picks
//! - JSON and CSV export of pick tables, JSON import of scored headlines

pub mod config;
pub mod export;
pub mod service;
pub mod universe;

pub use config::{
    ConfigError, FallbackConfig, ProviderConfig, ServiceConfig, TrendConfig, WeightsConfig,
};
pub use export::{
    export_picks_csv, export_picks_json, export_signal_json, load_headlines, write_file,
};
pub use service::{build_provider, MarketService};
pub use universe::Universe;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn service_is_send_sync() {
        assert_send::<MarketService>();
        assert_sync::<MarketService>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<ServiceConfig>();
        assert_sync::<ServiceConfig>();
        assert_send::<Universe>();
        assert_sync::<Universe>();
    }
}
