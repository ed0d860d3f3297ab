use crate::data_structures::DateWindow;
use crate::error::BetaError;
use crate::provider::PriceProvider;
use crate::returns::PriceSeries;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use chrono_tz::Tz;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum YahooError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("symbol not found")]
    NotFound,
    #[error("provider returned status {0}")]
    Status(StatusCode),
    #[error("provider error {code}: {description}")]
    Provider { code: String, description: String },
    #[error("no data")]
    NoData,
    #[error("invalid base url {0}")]
    InvalidBaseUrl(String),
}

// --- Chart API response ---

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    exchange_timezone_name: Option<String>,
    #[serde(default, rename = "gmtoffset")]
    gmt_offset: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
    #[serde(default)]
    adjclose: Vec<AdjCloseBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseBlock {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Converts provider timestamps into the exchange's trading date.
enum ExchangeClock {
    Zone(Tz),
    Offset(FixedOffset),
}

impl ExchangeClock {
    fn from_meta(meta: &ChartMeta) -> Self {
        if let Some(zone) = meta.exchange_timezone_name.as_deref() {
            match zone.parse::<Tz>() {
                Ok(tz) => return ExchangeClock::Zone(tz),
                Err(e) => warn!(zone, error = %e, "Unknown exchange timezone, falling back to gmtoffset"),
            }
        }
        let offset = meta
            .gmt_offset
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        ExchangeClock::Offset(offset)
    }

    fn trading_date(&self, time: DateTime<Utc>) -> NaiveDate {
        match self {
            ExchangeClock::Zone(tz) => time.with_timezone(tz).date_naive(),
            ExchangeClock::Offset(offset) => time.with_timezone(offset).date_naive(),
        }
    }
}

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Records a request at `now` when the window has room, otherwise returns how long
/// until the oldest request leaves it.
fn reserve_slot(timestamps: &mut Vec<SystemTime>, now: SystemTime, limit: usize) -> Option<Duration> {
    timestamps.retain(|&timestamp| now.duration_since(timestamp).unwrap_or(Duration::ZERO) < RATE_WINDOW);

    if timestamps.len() < limit {
        timestamps.push(now);
        return None;
    }
    let oldest = timestamps.iter().min().copied()?;
    Some(RATE_WINDOW.saturating_sub(now.duration_since(oldest).unwrap_or(Duration::ZERO)))
}

/// Parse a chart API body into a close series restricted to `window`.
pub fn parse_chart(
    symbol: &str,
    body: &str,
    window: &DateWindow,
    use_adjusted_close: bool,
) -> Result<PriceSeries, YahooError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)?;

    if let Some(error) = envelope.chart.error {
        if error.code == "Not Found" {
            return Err(YahooError::NotFound);
        }
        return Err(YahooError::Provider {
            code: error.code,
            description: error.description,
        });
    }

    let result = envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or(YahooError::NoData)?;
    if result.timestamp.is_empty() {
        return Err(YahooError::NoData);
    }

    let adjusted = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|block| block.adjclose)
        .filter(|closes| use_adjusted_close && closes.len() == result.timestamp.len());
    let closes = match adjusted {
        Some(closes) => closes,
        None => result
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|block| block.close)
            .ok_or(YahooError::NoData)?,
    };

    let clock = ExchangeClock::from_meta(&result.meta);
    let mut series = PriceSeries::new(symbol);
    let mut skipped = 0usize;

    for (timestamp, close) in result.timestamp.iter().zip(closes) {
        let Some(time) = DateTime::<Utc>::from_timestamp(*timestamp, 0) else {
            skipped += 1;
            continue;
        };
        let date = clock.trading_date(time);
        if !window.contains(date) {
            continue;
        }
        match close {
            Some(close) if series.insert(date, close) => {}
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(symbol, skipped, "Skipped rows without a usable close");
    }
    if series.is_empty() {
        return Err(YahooError::NoData);
    }
    Ok(series)
}

pub struct YahooClient {
    client: Client,
    base_url: Url,
    use_adjusted_close: bool,
    rate_limit_per_minute: u32,
    request_timestamps: Mutex<Vec<SystemTime>>,
    user_agents: Vec<String>,
}

impl YahooClient {
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        rate_limit_per_minute: u32,
        use_adjusted_close: bool,
    ) -> Result<Self, YahooError> {
        let client = Client::builder().timeout(request_timeout).gzip(true).build()?;
        let base_url = Url::parse(base_url).map_err(|e| YahooError::InvalidBaseUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(YahooError::InvalidBaseUrl(base_url.to_string()));
        }

        let user_agents = vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Safari/605.1.15".to_string(),
        ];

        Ok(YahooClient {
            client,
            base_url,
            use_adjusted_close,
            rate_limit_per_minute: rate_limit_per_minute.max(1),
            request_timestamps: Mutex::new(Vec::new()),
            user_agents,
        })
    }

    fn get_user_agent(&self) -> &str {
        use rand::seq::IndexedRandom;
        self.user_agents
            .choose(&mut rand::rng())
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Waits for a free slot in the one-minute window. The lock is released while sleeping.
    async fn enforce_rate_limit(&self) {
        loop {
            let wait_time = {
                let mut timestamps = self.request_timestamps.lock().await;
                match reserve_slot(&mut timestamps, SystemTime::now(), self.rate_limit_per_minute as usize) {
                    None => return,
                    Some(wait_time) => wait_time,
                }
            };
            debug!(wait_ms = wait_time.as_millis() as u64, "Rate limit reached, waiting");
            sleep(wait_time + Duration::from_millis(100)).await;
        }
    }

    /// Chart endpoint for `symbol`; the symbol is percent-encoded as one path segment.
    pub fn chart_url(&self, symbol: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["v8", "finance", "chart", symbol]);
        }
        url
    }

    fn chart_request(&self, symbol: &str, window: &DateWindow) -> RequestBuilder {
        let period1 = window.start.and_hms_opt(0, 0, 0).map(|t| t.and_utc().timestamp()).unwrap_or(0);
        let period2 = window.end.and_hms_opt(0, 0, 0).map(|t| t.and_utc().timestamp()).unwrap_or(0);

        self.client
            .get(self.chart_url(symbol))
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "history".to_string()),
                ("includeAdjustedClose", "true".to_string()),
            ])
            .header("Accept", "application/json, text/plain, */*")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("User-Agent", self.get_user_agent())
    }

    #[instrument(skip(self, window), fields(start = %window.start, end = %window.end))]
    pub async fn get_history(&self, symbol: &str, window: &DateWindow) -> Result<PriceSeries, YahooError> {
        self.enforce_rate_limit().await;

        let response = self.chart_request(symbol, window).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(parse_chart(symbol, &body, window, self.use_adjusted_close)
                .err()
                .unwrap_or(YahooError::NotFound));
        }
        if !status.is_success() {
            return Err(YahooError::Status(status));
        }

        let series = parse_chart(symbol, &body, window, self.use_adjusted_close)?;
        info!(
            symbol,
            closes = series.len(),
            first = ?series.first_date(),
            last = ?series.last_date(),
            "Fetched daily closes"
        );
        Ok(series)
    }
}

#[async_trait]
impl PriceProvider for YahooClient {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_close_series(&self, symbol: &str, window: &DateWindow) -> Result<PriceSeries, BetaError> {
        self.get_history(symbol, window).await.map_err(|e| {
            warn!(symbol, error = %e, "Price retrieval failed");
            let reason = match &e {
                YahooError::Http(inner) if inner.is_timeout() => "request timed out".to_string(),
                _ => e.to_string(),
            };
            BetaError::data_unavailable(symbol, reason)
        })
    }
}
