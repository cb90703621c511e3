//! Service configuration, loaded from TOML.
//!
//! Every section is optional and falls back to its default:
//!
//! ```toml
//! [cache]
//! dir = "cache"
//! default_ttl_secs = 30
//!
//! [ttl]
//! live_price_secs = 30
//! options_secs = 60
//! trend_secs = 45
//!
//! [trend]
//! periods = 20
//!
//! [fallback]
//! seed = 42
//!
//! [provider]
//! offline = false
//! timeout_secs = 10
//!
//! [universe]
//! regular = ["RELIANCE.NS", "TCS.NS"]
//! penny = ["SUZLON.NS"]
//! ```

use marketlens_core::data::derive::MIN_TREND_PERIODS;
use marketlens_core::data::fetcher::DEFAULT_TREND_PERIODS;
use marketlens_core::data::{CacheConfig, FetchTtls, YahooSettings};
use marketlens_core::signals::{SignalWeights, WeightsError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::universe::Universe;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid [weights.{section}]: {source}")]
    Weights {
        section: &'static str,
        #[source]
        source: WeightsError,
    },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("trend periods must be at least 2, got {0}")]
    TrendPeriods(usize),

    #[error("provider.max_retries must be at most 10, got {0}")]
    Retries(u32),
}

const MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub periods: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            periods: DEFAULT_TREND_PERIODS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsConfig {
    /// Drives index signals.
    pub index: SignalWeights,
    /// Drives stock picks.
    pub ranking: SignalWeights,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            index: SignalWeights::INDEX,
            ranking: SignalWeights::RANKING,
        }
    }
}

/// Seed for synthetic data. Unset draws a fresh seed per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Skip the network entirely; every fetch is synthetic.
    pub offline: bool,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub breaker_cooldown_secs: u64,
    pub breaker_threshold: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            offline: false,
            timeout_secs: 10,
            max_retries: 2,
            base_delay_ms: 500,
            breaker_cooldown_secs: 300,
            breaker_threshold: 3,
        }
    }
}

impl ProviderConfig {
    pub fn yahoo_settings(&self) -> YahooSettings {
        YahooSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
        }
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker_cooldown_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub cache: CacheConfig,
    pub ttl: FetchTtls,
    pub trend: TrendConfig,
    pub weights: WeightsConfig,
    pub fallback: FallbackConfig,
    pub provider: ProviderConfig,
    pub universe: Universe,
}

impl ServiceConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights
            .index
            .validate()
            .map_err(|source| ConfigError::Weights {
                section: "index",
                source,
            })?;
        self.weights
            .ranking
            .validate()
            .map_err(|source| ConfigError::Weights {
                section: "ranking",
                source,
            })?;

        let positive = [
            ("cache.default_ttl_secs", self.cache.default_ttl_secs),
            ("ttl.live_price_secs", self.ttl.live_price_secs),
            ("ttl.options_secs", self.ttl.options_secs),
            ("ttl.trend_secs", self.ttl.trend_secs),
            ("provider.timeout_secs", self.provider.timeout_secs),
        ];
        if let Some(&(field, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Zero { field });
        }

        if self.trend.periods < MIN_TREND_PERIODS {
            return Err(ConfigError::TrendPeriods(self.trend.periods));
        }
        if self.provider.max_retries > MAX_RETRIES {
            return Err(ConfigError::Retries(self.provider.max_retries));
        }
        Ok(())
    }
}
