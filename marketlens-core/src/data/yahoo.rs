//! Yahoo Finance market-data provider.
//!
//! Intraday bars come from the v8 chart API, previous close and average
//! volume from the v7 quote API (falling back to a daily chart when the quote
//! endpoint demands authentication), and option chains from the v7 options
//! API. Handles retries with exponential backoff, response parsing and the
//! circuit breaker.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes. Every failure here ends in synthetic fallback data upstream.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{
    BarInterval, DataError, IntradayBar, MarketDataProvider, OptionContract, OptionsChain,
    StaticInfo,
};
use chrono::{DateTime, NaiveDate};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Upper bound on a single retry wait.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Characters left unescaped in a symbol placed in a URL path or query.
const SYMBOL_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'-').remove(b'_');

// ── Chart API ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

// ── Quote API ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    quote_response: QuoteResult,
}

#[derive(Debug, Deserialize)]
struct QuoteResult {
    result: Option<Vec<QuoteSummary>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummary {
    regular_market_previous_close: Option<f64>,
    average_daily_volume3_month: Option<f64>,
    average_daily_volume10_day: Option<f64>,
}

// ── Options API ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsResponse {
    option_chain: OptionsResult,
}

#[derive(Debug, Deserialize)]
struct OptionsResult {
    result: Option<Vec<OptionsData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsData {
    #[serde(default)]
    expiration_dates: Vec<i64>,
    #[serde(default)]
    options: Vec<OptionsForExpiry>,
}

#[derive(Debug, Deserialize)]
struct OptionsForExpiry {
    #[serde(default)]
    calls: Vec<RawContract>,
    #[serde(default)]
    puts: Vec<RawContract>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContract {
    strike: f64,
    open_interest: Option<f64>,
    implied_volatility: Option<f64>,
}

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq)]
pub struct YahooSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for YahooSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(
        circuit_breaker: Arc<CircuitBreaker>,
        settings: YahooSettings,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries: settings.max_retries,
            base_delay: settings.base_delay,
        })
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    fn encode_symbol(symbol: &str) -> String {
        utf8_percent_encode(symbol, SYMBOL_SET).to_string()
    }

    fn chart_url(symbol: &str, range: &str, interval: &str) -> String {
        let symbol = Self::encode_symbol(symbol);
        format!(
            "{BASE_URL}/v8/finance/chart/{symbol}\
             ?range={range}&interval={interval}&includePrePost=false"
        )
    }

    fn quote_url(symbol: &str) -> String {
        format!(
            "{BASE_URL}/v7/finance/quote?symbols={}",
            Self::encode_symbol(symbol)
        )
    }

    fn options_url(symbol: &str) -> String {
        format!(
            "{BASE_URL}/v7/finance/options/{}",
            Self::encode_symbol(symbol)
        )
    }

    fn api_error(symbol: &str, error: Option<ApiError>) -> DataError {
        match error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        }
    }

    fn first_chart(symbol: &str, resp: ChartResponse) -> Result<ChartData, DataError> {
        let ChartResult { result, error } = resp.chart;
        result
            .ok_or_else(|| Self::api_error(symbol, error))?
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))
    }

    /// Parse a chart response into bars, skipping slots where every field is
    /// null and slots without a close.
    fn parse_bars(symbol: &str, data: ChartData) -> Result<Vec<IntradayBar>, DataError> {
        let timestamps = data.timestamp.unwrap_or_default();
        let quote = data.indicators.quote.into_iter().next().unwrap_or_default();

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let timestamp = DateTime::from_timestamp(ts, 0).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
            })?;

            let Some(close) = quote.close.get(i).copied().flatten() else {
                continue;
            };
            let open = quote.open.get(i).copied().flatten().unwrap_or(close);
            let high = quote.high.get(i).copied().flatten().unwrap_or(close);
            let low = quote.low.get(i).copied().flatten().unwrap_or(close);
            let volume = quote.volume.get(i).copied().flatten().unwrap_or(0);

            bars.push(IntradayBar {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        debug!(symbol, bars = bars.len(), "parsed chart response");
        Ok(bars)
    }

    fn parse_quote(symbol: &str, resp: QuoteResponse) -> Result<StaticInfo, DataError> {
        let QuoteResult { result, error } = resp.quote_response;
        let summary = result
            .ok_or_else(|| Self::api_error(symbol, error))?
            .into_iter()
            .next()
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;

        let previous_close = summary.regular_market_previous_close.ok_or_else(|| {
            DataError::ResponseFormatChanged(format!("no previous close for {symbol}"))
        })?;
        let average_volume = summary
            .average_daily_volume3_month
            .or(summary.average_daily_volume10_day)
            .unwrap_or(0.0);

        Ok(StaticInfo {
            previous_close,
            average_volume: average_volume.max(0.0).round() as u64,
        })
    }

    /// Static info from three months of daily bars: previous close from the
    /// chart meta, average volume over completed sessions.
    fn static_info_from_daily(symbol: &str, data: ChartData) -> Result<StaticInfo, DataError> {
        let meta_close = data.meta.previous_close;
        let bars = Self::parse_bars(symbol, data)?;
        let completed = bars.len().saturating_sub(1);
        if completed == 0 {
            return Err(DataError::EmptyResult {
                symbol: symbol.to_string(),
                what: "daily history",
            });
        }

        let history = &bars[..completed];
        let previous_close = meta_close.unwrap_or(history[completed - 1].close);
        let total: u64 = history.iter().map(|b| b.volume).sum();

        Ok(StaticInfo {
            previous_close,
            average_volume: total / completed as u64,
        })
    }

    fn parse_options(symbol: &str, resp: OptionsResponse) -> Result<OptionsChain, DataError> {
        let OptionsResult { result, error } = resp.option_chain;
        let data = result
            .ok_or_else(|| Self::api_error(symbol, error))?
            .into_iter()
            .next()
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;

        let mut expiries: Vec<NaiveDate> = data
            .expiration_dates
            .iter()
            .filter_map(|&ts| DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.date_naive())
            .collect();
        expiries.sort();
        expiries.dedup();

        let convert = |contracts: Vec<RawContract>| -> Vec<OptionContract> {
            contracts
                .into_iter()
                .map(|c| OptionContract {
                    strike: c.strike,
                    open_interest: c.open_interest.unwrap_or(0.0),
                    implied_volatility: c.implied_volatility.unwrap_or(0.0),
                })
                .collect()
        };

        let nearest = data.options.into_iter().next();
        let (calls, puts) = match nearest {
            Some(set) => (convert(set.calls), convert(set.puts)),
            None => (Vec::new(), Vec::new()),
        };

        Ok(OptionsChain {
            calls,
            puts,
            expiries,
        })
    }

    /// Execute a GET with retry and circuit breaker logic, decoding JSON.
    fn get_json<T: DeserializeOwned>(&self, url: &str, symbol: &str) -> Result<T, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                std::thread::sleep(backoff_delay(self.base_delay, attempt));
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        self.circuit_breaker.trip();
                        return Err(DataError::CircuitBreakerTripped);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(DataError::SymbolNotFound {
                            symbol: symbol.to_string(),
                        });
                    }

                    if status.is_client_error() {
                        return Err(DataError::HttpStatus {
                            status: status.as_u16(),
                            symbol: symbol.to_string(),
                        });
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::HttpStatus {
                            status: status.as_u16(),
                            symbol: symbol.to_string(),
                        });
                        continue;
                    }

                    let body: T = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;
                    self.circuit_breaker.record_success();
                    return Ok(body);
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        self.circuit_breaker.record_failure();
                        last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(DataError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_intraday_series(
        &self,
        symbol: &str,
        interval: BarInterval,
    ) -> Result<Vec<IntradayBar>, DataError> {
        let url = Self::chart_url(symbol, "1d", interval.as_query());
        let resp: ChartResponse = self.get_json(&url, symbol)?;
        Self::parse_bars(symbol, Self::first_chart(symbol, resp)?)
    }

    fn fetch_options_chain(&self, symbol: &str) -> Result<OptionsChain, DataError> {
        let resp: OptionsResponse = self.get_json(&Self::options_url(symbol), symbol)?;
        Self::parse_options(symbol, resp)
    }

    fn fetch_static_info(&self, symbol: &str) -> Result<StaticInfo, DataError> {
        match self
            .get_json::<QuoteResponse>(&Self::quote_url(symbol), symbol)
            .and_then(|resp| Self::parse_quote(symbol, resp))
        {
            Ok(info) => Ok(info),
            Err(DataError::HttpStatus { status: 401, .. }) => {
                warn!(symbol, "quote endpoint requires authentication, using daily chart");
                let url = Self::chart_url(symbol, "3mo", "1d");
                let resp: ChartResponse = self.get_json(&url, symbol)?;
                Self::static_info_from_daily(symbol, Self::first_chart(symbol, resp)?)
            }
            Err(e) => Err(e),
        }
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

/// Exponential wait before retry `attempt` (1-based), capped at [`MAX_BACKOFF`].
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_BACKOFF)
}
