//! MarketLens Core: tiered caching, fallback synthesis, market data fetching
//! and signal scoring.
//!
//! This crate contains:
//! - Domain records (observations, options snapshots, trends) and the
//!   `Sourced` real/synthetic tag
//! - A two-tier cache (in-process + persisted JSON records) with per-entry TTL
//! - A seeded fallback synthesizer for when the provider cannot answer
//! - The data fetcher: cache, then provider, then fallback, with single-flight
//! - Sub-signal extraction, weighted classification, stock ranking and news
//!   sentiment

pub mod clock;
pub mod data;
pub mod domain;
pub mod rng;
pub mod signals;
mod sync;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{
    DataKind, MarketObservation, OptionsSnapshot, Sourced, TrendBasis, TrendDirection,
    TrendSnapshot,
};
