//! Ranking a stock universe into intraday pick tables.
//!
//! Stocks are scored on the positive parts of their sub-signals plus news.
//! Only stocks scoring above the pick threshold appear; each tier's table
//! keeps the best eight, and the mixed table merges the best three of each.

use super::aggregator::round_to;
use super::news::NewsSentiment;
use super::weights::{SignalWeights, WeightsError};
use super::SubSignals;
use crate::domain::{MarketObservation, OptionsSnapshot, Sourced, TrendSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PICK_THRESHOLD: f64 = 0.3;
pub const PENNY_PRICE: f64 = 50.0;
const ULTRA_LOW_PRICE: f64 = 20.0;
const MAX_REASONS: usize = 3;
const MAX_RISK_FACTORS: usize = 2;

/// Which universe list a candidate was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniverseTier {
    Regular,
    Penny,
}

/// Price-based category of a pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickCategory {
    Regular,
    Penny,
}

impl PickCategory {
    pub fn for_price(price: f64) -> Self {
        if price < PENNY_PRICE {
            PickCategory::Penny
        } else {
            PickCategory::Regular
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PickCategory::Regular => "Regular Stock",
            PickCategory::Penny => "Penny Stock",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryBasis {
    Momentum,
    Dip,
    Current,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetBasis {
    StrongTrend,
    Moderate,
    Conservative,
}

impl EntryBasis {
    pub fn label(self) -> &'static str {
        match self {
            EntryBasis::Momentum => "Momentum",
            EntryBasis::Dip => "Dip",
            EntryBasis::Current => "Current",
        }
    }
}

impl TargetBasis {
    pub fn label(self) -> &'static str {
        match self {
            TargetBasis::StrongTrend => "Strong trend",
            TargetBasis::Moderate => "Moderate",
            TargetBasis::Conservative => "Conservative",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuyPosition {
    pub price: f64,
    pub basis: EntryBasis,
}

impl BuyPosition {
    pub fn for_move(price: f64, change_pct: f64) -> Self {
        if change_pct > 1.0 {
            Self {
                price,
                basis: EntryBasis::Momentum,
            }
        } else if change_pct < -1.0 {
            Self {
                price: price * 0.98,
                basis: EntryBasis::Dip,
            }
        } else {
            Self {
                price,
                basis: EntryBasis::Current,
            }
        }
    }
}

impl fmt::Display for BuyPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buy at ₹{:.2} ({})", self.price, self.basis.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SellPosition {
    pub price: f64,
    pub basis: TargetBasis,
}

impl SellPosition {
    pub fn for_trend(price: f64, strength: f64) -> Self {
        let (factor, basis) = if strength > 3.0 {
            (1.05, TargetBasis::StrongTrend)
        } else if strength > 1.0 {
            (1.03, TargetBasis::Moderate)
        } else {
            (1.02, TargetBasis::Conservative)
        };
        Self {
            price: price * factor,
            basis,
        }
    }
}

impl fmt::Display for SellPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "₹{:.2} ({})", self.price, self.basis.label())
    }
}

/// Expected return band in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnRange {
    pub low_pct: f64,
    pub high_pct: f64,
}

impl ReturnRange {
    pub fn estimate(price: f64, trend_strength: f64, volatility: f64) -> Self {
        let mut base = if trend_strength > 3.0 {
            8.0
        } else if trend_strength > 2.0 {
            5.0
        } else if trend_strength > 1.0 {
            3.0
        } else {
            2.0
        };
        if volatility > 0.7 {
            base *= 1.5;
        }
        if price < PENNY_PRICE {
            base *= 1.8;
        }
        Self {
            low_pct: base,
            high_pct: base * 1.5,
        }
    }
}

impl fmt::Display for ReturnRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}% - {:.1}%", self.low_pct, self.high_pct)
    }
}

/// Fetched inputs for one universe member.
#[derive(Debug, Clone)]
pub struct StockCandidate {
    pub symbol: String,
    pub tier: UniverseTier,
    pub price: Sourced<MarketObservation>,
    pub options: Sourced<OptionsSnapshot>,
    pub trend: Sourced<TrendSnapshot>,
}

impl StockCandidate {
    pub fn is_degraded(&self) -> bool {
        self.price.is_synthetic() || self.options.is_synthetic() || self.trend.is_synthetic()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockPick {
    pub symbol: String,
    pub display_name: String,
    pub tier: UniverseTier,
    pub category: PickCategory,
    pub price: f64,
    pub price_change_pct: f64,
    pub volume_ratio: f64,
    pub overall_score: f64,
    pub sub_signals: SubSignals,
    pub news_score: f64,
    pub buy_position: BuyPosition,
    pub sell_position: SellPosition,
    pub potential_return: ReturnRange,
    pub reasons: Vec<String>,
    pub risk_factors: Vec<String>,
    pub risk_score: f64,
    pub confidence: f64,
    pub degraded: bool,
}

impl StockPick {
    pub fn reason_summary(&self) -> String {
        self.reasons.join(" | ")
    }

    pub fn risk_summary(&self) -> String {
        self.risk_factors.join(" | ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PickTables {
    pub regular: Vec<StockPick>,
    pub penny: Vec<StockPick>,
    pub mixed: Vec<StockPick>,
}

fn pick_reasons(s: &SubSignals, news: f64) -> Vec<String> {
    let gated = [
        (s.price_momentum > 0.3, "Strong price momentum"),
        (s.volume_pressure > 0.3, "High volume support"),
        (s.options_sentiment > 0.3, "Bullish options activity"),
        (s.trend > 0.3, "Uptrend continuation"),
        (news > 0.3, "Positive news sentiment"),
    ];
    let mut reasons: Vec<String> = gated
        .iter()
        .filter(|(passed, _)| *passed)
        .map(|(_, text)| text.to_string())
        .take(MAX_REASONS)
        .collect();
    if reasons.is_empty() {
        reasons.push("Mixed signals - monitor closely".to_string());
    }
    reasons
}

fn risk_factors(price: &MarketObservation, volatility: f64) -> Vec<String> {
    let gated = [
        (price.price_change_pct.abs() > 3.0, "High price volatility"),
        (price.volume_ratio > 3.0, "Unusual volume spike"),
        (volatility > 0.8, "Extreme volatility"),
        (price.current_price < ULTRA_LOW_PRICE, "Ultra-low price stock"),
    ];
    let mut risks: Vec<String> = gated
        .iter()
        .filter(|(passed, _)| *passed)
        .map(|(_, text)| text.to_string())
        .take(MAX_RISK_FACTORS)
        .collect();
    if risks.is_empty() {
        risks.push("Moderate risk levels".to_string());
    }
    risks
}

/// Risk in `[0, 1]`: mean of move size, volume anomaly and implied volatility.
pub fn risk_score(price: &MarketObservation, options: &Sourced<OptionsSnapshot>) -> f64 {
    let move_risk = (price.price_change_pct.abs() / 10.0).min(1.0);
    let volume_risk = if price.volume_ratio > 3.0 {
        0.8
    } else if price.volume_ratio < 0.5 {
        0.6
    } else {
        0.2
    };
    let iv_risk = match options {
        Sourced::Real(o) if !o.is_synthetic => {
            let mean_iv = (o.avg_call_iv + o.avg_put_iv) / 2.0;
            (mean_iv * 2.0).clamp(0.0, 1.0)
        }
        _ => 0.3,
    };
    let risk = (move_risk + volume_risk + iv_risk) / 3.0;
    if risk.is_finite() {
        risk
    } else {
        1.0
    }
}

#[derive(Debug, Clone)]
pub struct StockRanker {
    weights: SignalWeights,
    table_size: usize,
    mixed_per_tier: usize,
    mixed_size: usize,
}

impl Default for StockRanker {
    fn default() -> Self {
        Self {
            weights: SignalWeights::RANKING,
            table_size: 8,
            mixed_per_tier: 3,
            mixed_size: 6,
        }
    }
}

impl StockRanker {
    pub fn new(weights: SignalWeights) -> Result<Self, WeightsError> {
        weights.validate()?;
        Ok(Self {
            weights,
            ..Self::default()
        })
    }

    pub fn weights(&self) -> &SignalWeights {
        &self.weights
    }

    /// Score one candidate; `None` unless it clears the pick threshold.
    pub fn analyze(&self, candidate: &StockCandidate, news_score: f64) -> Option<StockPick> {
        let price = candidate.price.value();
        let options = candidate.options.value();
        let trend = candidate.trend.value();

        let sub_signals = SubSignals::from_inputs(price, options, trend);
        let overall_score = self.weights.combine_positive(&sub_signals, news_score);
        if overall_score <= PICK_THRESHOLD {
            return None;
        }

        let current = price.current_price;
        Some(StockPick {
            symbol: candidate.symbol.clone(),
            display_name: candidate
                .symbol
                .strip_suffix(".NS")
                .unwrap_or(&candidate.symbol)
                .to_string(),
            tier: candidate.tier,
            category: PickCategory::for_price(current),
            price: current,
            price_change_pct: price.price_change_pct,
            volume_ratio: price.volume_ratio,
            overall_score,
            sub_signals,
            news_score,
            buy_position: BuyPosition::for_move(current, price.price_change_pct),
            sell_position: SellPosition::for_trend(current, trend.strength),
            potential_return: ReturnRange::estimate(current, trend.strength, sub_signals.volatility),
            reasons: pick_reasons(&sub_signals, news_score),
            risk_factors: risk_factors(price, sub_signals.volatility),
            risk_score: risk_score(price, &candidate.options),
            confidence: round_to((60.0 + overall_score * 40.0).min(95.0), 1),
            degraded: candidate.is_degraded(),
        })
    }

    fn sorted_top(mut picks: Vec<StockPick>, n: usize) -> Vec<StockPick> {
        picks.sort_by(|a, b| b.overall_score.total_cmp(&a.overall_score));
        picks.truncate(n);
        picks
    }

    /// Build the regular, penny and mixed tables.
    pub fn tables(&self, candidates: &[StockCandidate], news: &NewsSentiment) -> PickTables {
        let picks_for = |tier: UniverseTier| -> Vec<StockPick> {
            let picks = candidates
                .iter()
                .filter(|c| c.tier == tier)
                .filter_map(|c| self.analyze(c, news.signal_for(&c.symbol)))
                .collect();
            Self::sorted_top(picks, self.table_size)
        };

        let regular = picks_for(UniverseTier::Regular);
        let penny = picks_for(UniverseTier::Penny);
        let mixed = Self::sorted_top(
            regular
                .iter()
                .take(self.mixed_per_tier)
                .chain(penny.iter().take(self.mixed_per_tier))
                .cloned()
                .collect(),
            self.mixed_size,
        );

        PickTables {
            regular,
            penny,
            mixed,
        }
    }
}
