//! Turning raw provider payloads into observation records.
//!
//! Each function either produces a record or reports the payload as empty;
//! an empty payload is handled exactly like a provider failure upstream.

use super::provider::{DataError, IntradayBar, OptionContract, OptionsChain, StaticInfo};
use crate::domain::{MarketObservation, OptionsSnapshot, TrendBasis, TrendDirection, TrendSnapshot};
use chrono::{DateTime, Utc};

/// Slope magnitude below which a trend counts as flat.
pub const FLAT_SLOPE: f64 = 0.01;
pub const MAX_TREND_STRENGTH: f64 = 10.0;
pub const MIN_TREND_PERIODS: usize = 2;

fn finite_bars(bars: &[IntradayBar]) -> Vec<&IntradayBar> {
    bars.iter().filter(|b| b.close.is_finite()).collect()
}

/// Live price from today's 1-minute bars and the symbol's static info.
pub fn observation_from_bars(
    symbol: &str,
    bars: &[IntradayBar],
    info: &StaticInfo,
    now: DateTime<Utc>,
) -> Result<MarketObservation, DataError> {
    let bars = finite_bars(bars);
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return Err(DataError::EmptyResult {
            symbol: symbol.to_string(),
            what: "intraday series",
        });
    };

    let current_price = last.close;
    let previous_close = info.previous_close;
    let price_change = current_price - previous_close;
    let price_change_pct = if previous_close > 0.0 {
        price_change / previous_close * 100.0
    } else {
        0.0
    };

    let volume = last.volume;
    let avg_volume = info.average_volume;
    let volume_ratio = if avg_volume > 0 {
        volume as f64 / avg_volume as f64
    } else {
        1.0
    };

    let day_high = bars
        .iter()
        .map(|b| if b.high.is_finite() { b.high } else { b.close })
        .fold(f64::NEG_INFINITY, f64::max);
    let day_low = bars
        .iter()
        .map(|b| if b.low.is_finite() { b.low } else { b.close })
        .fold(f64::INFINITY, f64::min);
    let open_price = if first.open.is_finite() {
        first.open
    } else {
        first.close
    };

    Ok(MarketObservation {
        symbol: symbol.to_string(),
        current_price,
        price_change,
        price_change_pct,
        volume,
        avg_volume,
        volume_ratio,
        day_high,
        day_low,
        open_price,
        timestamp: now,
        is_fallback: false,
        fallback_reason: None,
    })
}

fn mean_iv(contracts: &[OptionContract]) -> f64 {
    if contracts.is_empty() {
        return 0.0;
    }
    contracts.iter().map(|c| c.implied_volatility).sum::<f64>() / contracts.len() as f64
}

/// Open-interest and IV aggregates for the nearest expiry.
pub fn options_snapshot(
    symbol: &str,
    chain: &OptionsChain,
    now: DateTime<Utc>,
) -> Result<OptionsSnapshot, DataError> {
    let Some(&expiry_date) = chain.expiries.iter().min() else {
        return Err(DataError::EmptyResult {
            symbol: symbol.to_string(),
            what: "option chain",
        });
    };

    let total_call_oi: f64 = chain.calls.iter().map(|c| c.open_interest).sum();
    let total_put_oi: f64 = chain.puts.iter().map(|c| c.open_interest).sum();
    let put_call_ratio = if total_call_oi > 0.0 {
        total_put_oi / total_call_oi
    } else {
        1.0
    };

    Ok(OptionsSnapshot {
        symbol: symbol.to_string(),
        total_call_oi,
        total_put_oi,
        put_call_ratio,
        avg_call_iv: mean_iv(&chain.calls),
        avg_put_iv: mean_iv(&chain.puts),
        expiry_date,
        timestamp: now,
        is_synthetic: false,
        synthetic_reason: None,
    })
}

/// Least-squares slope of `values` against their index, and the population
/// standard deviation of `values`.
pub fn linear_fit(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n < 2 {
        return (0.0, 0.0);
    }
    let nf = n as f64;
    let x_mean = (nf - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / nf;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        let dy = y - y_mean;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    (slope, (syy / nf).sqrt())
}

/// Trend over the last `periods` 5-minute closes.
///
/// Fewer closes than `periods` gives a flat, real snapshot with
/// [`TrendBasis::InsufficientData`]; no closes at all is an empty result.
pub fn trend_from_bars(
    symbol: &str,
    bars: &[IntradayBar],
    periods: usize,
    now: DateTime<Utc>,
) -> Result<TrendSnapshot, DataError> {
    let required = periods.max(MIN_TREND_PERIODS);
    let closes: Vec<f64> = finite_bars(bars).iter().map(|b| b.close).collect();

    if closes.is_empty() {
        return Err(DataError::EmptyResult {
            symbol: symbol.to_string(),
            what: "intraday series",
        });
    }
    if closes.len() < required {
        return Ok(TrendSnapshot::insufficient(symbol, closes.len(), required, now));
    }

    let window = &closes[closes.len() - required..];
    let (slope, std_dev) = linear_fit(window);
    let strength = if std_dev > 0.0 {
        (slope.abs() / std_dev).min(MAX_TREND_STRENGTH)
    } else {
        0.0
    };
    let direction = if slope > FLAT_SLOPE {
        TrendDirection::Bullish
    } else if slope < -FLAT_SLOPE {
        TrendDirection::Bearish
    } else {
        TrendDirection::Neutral
    };

    Ok(TrendSnapshot {
        symbol: symbol.to_string(),
        direction,
        strength,
        slope,
        timestamp: now,
        basis: TrendBasis::Regression { bars: required },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn bars(closes: &[f64]) -> Vec<IntradayBar> {
        let start = Utc::now();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| IntradayBar {
                timestamp: start + Duration::minutes(i as i64),
                open: c - 0.5,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 1000 * (i as u64 + 1),
            })
            .collect()
    }

    fn info(previous_close: f64, average_volume: u64) -> StaticInfo {
        StaticInfo {
            previous_close,
            average_volume,
        }
    }

    #[test]
    fn observation_uses_last_close_and_session_range() {
        let obs =
            observation_from_bars("X", &bars(&[100.0, 104.0, 102.0]), &info(100.0, 1500), Utc::now())
                .unwrap();
        assert_eq!(obs.current_price, 102.0);
        assert!((obs.price_change_pct - 2.0).abs() < 1e-12);
        assert_eq!(obs.volume, 3000);
        assert!((obs.volume_ratio - 2.0).abs() < 1e-12);
        assert_eq!(obs.day_high, 105.0);
        assert_eq!(obs.day_low, 99.0);
        assert_eq!(obs.open_price, 99.5);
        assert!(!obs.is_fallback);
    }

    #[test]
    fn zero_previous_close_and_volume_are_neutral() {
        let obs = observation_from_bars("X", &bars(&[10.0]), &info(0.0, 0), Utc::now()).unwrap();
        assert_eq!(obs.price_change_pct, 0.0);
        assert_eq!(obs.volume_ratio, 1.0);
    }

    #[test]
    fn empty_series_is_an_error() {
        let err = observation_from_bars("X", &[], &info(1.0, 1), Utc::now()).unwrap_err();
        assert!(matches!(err, DataError::EmptyResult { .. }));

        let mut nan = bars(&[1.0]);
        nan[0].close = f64::NAN;
        assert!(observation_from_bars("X", &nan, &info(1.0, 1), Utc::now()).is_err());
    }

    #[test]
    fn options_aggregates() {
        let contract = |oi, iv| OptionContract {
            strike: 100.0,
            open_interest: oi,
            implied_volatility: iv,
        };
        let d1 = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let chain = OptionsChain {
            calls: vec![contract(100.0, 0.2), contract(300.0, 0.4)],
            puts: vec![contract(200.0, 0.3)],
            expiries: vec![d2, d1],
        };
        let snap = options_snapshot("X", &chain, Utc::now()).unwrap();
        assert_eq!(snap.total_call_oi, 400.0);
        assert_eq!(snap.total_put_oi, 200.0);
        assert_eq!(snap.put_call_ratio, 0.5);
        assert!((snap.avg_call_iv - 0.3).abs() < 1e-12);
        assert_eq!(snap.expiry_date, d1);
    }

    #[test]
    fn options_without_calls_have_unit_ratio() {
        let chain = OptionsChain {
            calls: vec![],
            puts: vec![],
            expiries: vec![NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()],
        };
        let snap = options_snapshot("X", &chain, Utc::now()).unwrap();
        assert_eq!(snap.put_call_ratio, 1.0);
        assert_eq!(snap.avg_call_iv, 0.0);
        assert_eq!(snap.avg_put_iv, 0.0);
    }

    #[test]
    fn options_without_expiries_are_empty() {
        let err = options_snapshot("X", &OptionsChain::default(), Utc::now()).unwrap_err();
        assert!(matches!(err, DataError::EmptyResult { .. }));
    }

    #[test]
    fn linear_fit_of_a_line() {
        let (slope, std) = linear_fit(&[1.0, 3.0, 5.0, 7.0]);
        assert!((slope - 2.0).abs() < 1e-12);
        assert!((std - 5.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn rising_series_is_bullish() {
        let t = trend_from_bars("X", &bars(&[100.0, 101.0, 102.0, 103.0]), 4, Utc::now()).unwrap();
        assert_eq!(t.direction, TrendDirection::Bullish);
        assert!((t.slope - 1.0).abs() < 1e-12);
        // |1| / sqrt(1.25)
        assert!((t.strength - 1.0 / 1.25f64.sqrt()).abs() < 1e-12);
        assert_eq!(t.basis, TrendBasis::Regression { bars: 4 });
    }

    #[test]
    fn uses_only_the_last_periods_closes() {
        let t = trend_from_bars("X", &bars(&[500.0, 1.0, 1.0, 1.0]), 3, Utc::now()).unwrap();
        assert_eq!(t.direction, TrendDirection::Neutral);
        assert_eq!(t.strength, 0.0);
    }

    #[test]
    fn short_series_is_insufficient_not_an_error() {
        let t = trend_from_bars("X", &bars(&[1.0, 2.0]), 20, Utc::now()).unwrap();
        assert_eq!(
            t.basis,
            TrendBasis::InsufficientData {
                available: 2,
                required: 20
            }
        );
        assert_eq!(t.direction, TrendDirection::Neutral);
        assert!(trend_from_bars("X", &[], 20, Utc::now()).is_err());
    }

    #[test]
    fn periods_below_two_are_raised() {
        let t = trend_from_bars("X", &bars(&[1.0]), 0, Utc::now()).unwrap();
        assert_eq!(
            t.basis,
            TrendBasis::InsufficientData {
                available: 1,
                required: 2
            }
        );
    }
}
