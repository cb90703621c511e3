//! Stock universe: the regular and penny symbol lists scanned for picks.
//!
//! Loaded from the `[universe]` section of the service config, or from a
//! standalone TOML file with the same two lists.

use marketlens_core::signals::UniverseTier;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::ConfigError;

const NSE_REGULAR: &[&str] = &[
    "RELIANCE", "TCS", "INFY", "HDFCBANK", "ICICIBANK", "KOTAKBANK", "WIPRO", "HINDUNILVR",
    "ITC", "MARUTI", "BAJFINANCE", "ADANIENT", "TECHM", "COALINDIA", "BPCL", "AXISBANK", "SBIN",
    "SUNPHARMA", "ULTRACEMCO", "DRREDDY",
];

const NSE_PENNY: &[&str] = &[
    "SUZLON", "RPOWER", "JPPOWER", "VTL", "RCOM", "HFCL", "TATATEL", "IDEA", "YESBANK", "DISHTV",
    "MANINFRA", "GMRINFRA", "NCC", "IVRCL", "HCC", "JISLJALEQS", "TRIDENT", "BOMDYEING",
    "CENTURYTEX", "ARVIND", "FORTIS", "MUTHOOTFIN", "RELIGOLD", "PCJEWELLER", "TANLA",
];

fn nse_symbols(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| format!("{name}.NS")).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Universe {
    pub regular: Vec<String>,
    pub penny: Vec<String>,
}

impl Default for Universe {
    fn default() -> Self {
        Self::nse()
    }
}

impl Universe {
    /// Large caps and penny stocks listed on the NSE.
    pub fn nse() -> Self {
        Self {
            regular: nse_symbols(NSE_REGULAR),
            penny: nse_symbols(NSE_PENNY),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Every member tagged with its tier, regular first.
    pub fn members(&self) -> Vec<(&str, UniverseTier)> {
        self.regular
            .iter()
            .map(|s| (s.as_str(), UniverseTier::Regular))
            .chain(self.penny.iter().map(|s| (s.as_str(), UniverseTier::Penny)))
            .collect()
    }

    pub fn all_symbols(&self) -> Vec<&str> {
        self.members().into_iter().map(|(s, _)| s).collect()
    }

    pub fn len(&self) -> usize {
        self.regular.len() + self.penny.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
