//! Per-symbol news sentiment from pre-scored headlines.
//!
//! Headlines arrive already scored (a compound polarity in `[-1, 1]`). A
//! headline counts toward a symbol when it mentions the symbol's base name,
//! case-insensitively.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredHeadline {
    pub text: String,
    pub compound: f64,
}

/// Symbol without its exchange suffix, lowercased: `RELIANCE.NS` → `reliance`.
pub fn base_name(symbol: &str) -> String {
    symbol
        .split('.')
        .next()
        .unwrap_or(symbol)
        .trim_start_matches('^')
        .to_lowercase()
}

/// Bucket an average compound score into a news sub-signal.
pub fn news_signal(sentiment: f64) -> f64 {
    if sentiment > 0.1 {
        0.8
    } else if sentiment > 0.05 {
        0.5
    } else if sentiment < -0.1 {
        -0.8
    } else if sentiment < -0.05 {
        -0.5
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewsSentiment {
    by_symbol: BTreeMap<String, f64>,
}

impl NewsSentiment {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Average the compounds of matching headlines for each symbol in the
    /// universe. Symbols with no matching headline are absent.
    pub fn from_headlines<S: AsRef<str>>(headlines: &[ScoredHeadline], universe: &[S]) -> Self {
        let lowered: Vec<(String, f64)> = headlines
            .iter()
            .filter(|h| h.compound.is_finite())
            .map(|h| (h.text.to_lowercase(), h.compound))
            .collect();

        let mut by_symbol = BTreeMap::new();
        for symbol in universe {
            let symbol = symbol.as_ref();
            let name = base_name(symbol);
            if name.is_empty() {
                continue;
            }
            let matches: Vec<f64> = lowered
                .iter()
                .filter(|(text, _)| text.contains(&name))
                .map(|&(_, compound)| compound)
                .collect();
            if !matches.is_empty() {
                let mean = matches.iter().sum::<f64>() / matches.len() as f64;
                by_symbol.insert(symbol.to_string(), mean);
            }
        }
        Self { by_symbol }
    }

    pub fn sentiment(&self, symbol: &str) -> Option<f64> {
        self.by_symbol.get(symbol).copied()
    }

    /// News sub-signal for a symbol; 0 when no headline mentions it.
    pub fn signal_for(&self, symbol: &str) -> f64 {
        self.sentiment(symbol).map_or(0.0, news_signal)
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.by_symbol.iter().map(|(s, v)| (s.as_str(), *v))
    }
}
