use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::http_client::{HttpClient, HttpError, HttpRequest, DEFAULT_REQUEST_TIMEOUT};
use crate::market_rules::DEFAULT_TIMEZONE;
use crate::provider::{
    DailyHistory, InstrumentProfile, IntradayBatch, IntradayInterval, MarketDataProvider,
    ProviderError, ProviderFuture,
};
use crate::retry::RetryPolicy;
use crate::{AssetClassification, BarSeries, DailyBar, IntradayBar, IntradaySeries, Symbol};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_REQUESTS_PER_SECOND: NonZeroU32 = match NonZeroU32::new(4) {
    Some(value) => value,
    None => NonZeroU32::MIN,
};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Yahoo Finance chart API adapter.
///
/// The chart endpoint serves one symbol per request, so an intraday "batch"
/// is a paced fan-out over the requested symbols. Each symbol gets its own
/// retries; a symbol that still fails is left out of the batch.
#[derive(Clone)]
pub struct YahooChartAdapter {
    http_client: Arc<dyn HttpClient>,
    limiter: Arc<DirectRateLimiter>,
    base_url: String,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl YahooChartAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(
                DEFAULT_REQUESTS_PER_SECOND,
            ))),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_requests_per_second(mut self, requests: NonZeroU32) -> Self {
        self.limiter = Arc::new(RateLimiter::direct(Quota::per_second(requests)));
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Retry schedule for each symbol of an intraday fan-out.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn chart_request(&self, symbol: &Symbol) -> HttpRequest {
        HttpRequest::get(format!(
            "{}/v8/finance/chart/{}",
            self.base_url,
            urlencoding::encode(symbol.as_str())
        ))
        .referer("https://finance.yahoo.com/")
        .timeout(self.request_timeout)
    }

    /// Fetch one chart; `Ok(None)` when Yahoo has no data for the symbol.
    async fn fetch_chart(
        &self,
        symbol: &Symbol,
        request: HttpRequest,
    ) -> Result<Option<ChartResult>, ProviderError> {
        self.limiter.until_ready().await;

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| {
                let message = format!("yahoo chart for '{symbol}': {error}");
                match error {
                    HttpError::Timeout(_) => ProviderError::timeout(message),
                    HttpError::InvalidRequest(_) => ProviderError::internal(message),
                    HttpError::Connect(_) | HttpError::Transport(_) => {
                        ProviderError::unavailable(message)
                    }
                }
            })?;

        match response.status {
            404 => return Ok(None),
            429 => {
                return Err(ProviderError::rate_limited(format!(
                    "yahoo rate limited request for '{symbol}'"
                )))
            }
            status if status >= 500 => {
                return Err(ProviderError::unavailable(format!(
                    "yahoo returned status {status} for '{symbol}'"
                )))
            }
            _ if !response.is_success() => {
                return Err(ProviderError::invalid_request(format!(
                    "yahoo returned status {} for '{symbol}'",
                    response.status
                )))
            }
            _ => {}
        }

        let parsed: ChartResponse = serde_json::from_str(&response.body).map_err(|error| {
            ProviderError::internal(format!("failed to parse yahoo chart for '{symbol}': {error}"))
        })?;

        if let Some(error) = parsed.chart.error {
            if error.code.eq_ignore_ascii_case("Not Found") {
                return Ok(None);
            }
            return Err(ProviderError::unavailable(format!(
                "yahoo chart error for '{symbol}': {} ({})",
                error.description, error.code
            )));
        }

        Ok(parsed.chart.result.and_then(|mut results| {
            if results.is_empty() {
                None
            } else {
                Some(results.swap_remove(0))
            }
        }))
    }

    async fn intraday_series(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
        interval: IntradayInterval,
    ) -> Result<Option<IntradaySeries>, ProviderError> {
        let request = self
            .chart_request(symbol)
            .query("period1", utc_midnight(start).timestamp())
            .query("period2", utc_midnight(end).timestamp())
            .query("interval", interval.as_str())
            .query("includePrePost", false);
        let Some(chart) = self.fetch_chart(symbol, request).await? else {
            return Ok(None);
        };

        let closes = chart.closes();
        let bars: Vec<IntradayBar> = chart
            .timestamps()
            .iter()
            .zip(closes)
            .filter_map(|(seconds, close)| {
                let timestamp = DateTime::<Utc>::from_timestamp(*seconds, 0)?;
                let date = timestamp.date_naive();
                let close = (*close)?;
                (date >= start && date < end).then_some(IntradayBar { timestamp, close })
            })
            .collect();

        Ok(Some(IntradaySeries::new(symbol.clone(), bars)))
    }
}

impl MarketDataProvider for YahooChartAdapter {
    fn daily_history<'a>(
        &'a self,
        symbol: &'a Symbol,
        lookback_days: u32,
    ) -> ProviderFuture<'a, DailyHistory> {
        Box::pin(async move {
            let request = self
                .chart_request(symbol)
                .query("range", range_for(lookback_days))
                .query("interval", "1d");
            let chart = self.fetch_chart(symbol, request).await?.ok_or_else(|| {
                ProviderError::empty_result(format!("yahoo has no daily history for '{symbol}'"))
            })?;

            let classification = AssetClassification::parse(
                chart.meta.instrument_type.as_deref().unwrap_or("UNKNOWN"),
            );
            let timezone = chart
                .meta
                .exchange_timezone_name
                .clone()
                .unwrap_or_else(|| DEFAULT_TIMEZONE.name().to_string());
            let exchange_zone: Tz = timezone.parse().unwrap_or(DEFAULT_TIMEZONE);

            let closes = chart.adjusted_closes();
            let mut bars: Vec<DailyBar> = Vec::with_capacity(closes.len());
            for (seconds, close) in chart.timestamps().iter().zip(closes) {
                let Some(close) = *close else { continue };
                if !close.is_finite() || close <= 0.0 {
                    continue;
                }
                let Some(timestamp) = DateTime::<Utc>::from_timestamp(*seconds, 0) else {
                    continue;
                };
                let date = timestamp.with_timezone(&exchange_zone).date_naive();
                if let Some(last) = bars.last_mut() {
                    // a live quote can be appended with the same session date
                    if last.date == date {
                        last.close = close;
                        continue;
                    }
                    if last.date > date {
                        continue;
                    }
                }
                bars.push(DailyBar::new(date, close));
            }

            if bars.is_empty() {
                return Err(ProviderError::empty_result(format!(
                    "yahoo returned no usable daily closes for '{symbol}'"
                )));
            }

            let series = BarSeries::new(symbol.clone(), bars)
                .map_err(|error| ProviderError::internal(error.to_string()))?;
            debug!(
                symbol = %symbol,
                classification = %classification,
                timezone = %timezone,
                bars = series.len(),
                "fetched daily history"
            );

            Ok(DailyHistory {
                profile: InstrumentProfile {
                    classification,
                    timezone,
                },
                series,
            })
        })
    }

    fn intraday<'a>(
        &'a self,
        symbols: &'a [Symbol],
        start: NaiveDate,
        end: NaiveDate,
        interval: IntradayInterval,
    ) -> ProviderFuture<'a, IntradayBatch> {
        Box::pin(async move {
            if symbols.is_empty() {
                return Err(ProviderError::invalid_request(
                    "intraday request must include at least one symbol",
                ));
            }
            if end <= start {
                return Err(ProviderError::invalid_request(format!(
                    "intraday range is empty: [{start}, {end})"
                )));
            }

            let mut batch = IntradayBatch::new();
            let mut first_error = None;
            for symbol in symbols {
                let fetched = self
                    .retry
                    .run("intraday_chart", || {
                        self.intraday_series(symbol, start, end, interval)
                    })
                    .await;
                match fetched {
                    Ok(Some(series)) if !series.is_empty() => batch.insert(series),
                    Ok(_) => debug!(symbol = %symbol, %start, "no intraday bars"),
                    Err(error) => {
                        warn!(
                            symbol = %symbol,
                            %start,
                            code = error.code(),
                            error = %error,
                            "intraday fetch failed after retries"
                        );
                        first_error.get_or_insert(error);
                    }
                }
            }

            if batch.is_empty() {
                return Err(first_error.unwrap_or_else(|| {
                    ProviderError::empty_result(format!(
                        "no intraday data for {} symbol(s) in [{start}, {end})",
                        symbols.len()
                    ))
                }));
            }

            Ok(batch)
        })
    }
}

fn utc_midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn range_for(lookback_days: u32) -> &'static str {
    match lookback_days {
        0..=5 => "5d",
        6..=31 => "1mo",
        32..=92 => "3mo",
        93..=183 => "6mo",
        184..=366 => "1y",
        367..=731 => "2y",
        732..=1827 => "5y",
        1828..=3653 => "10y",
        _ => "max",
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

impl ChartResult {
    fn timestamps(&self) -> &[i64] {
        self.timestamp.as_deref().unwrap_or(&[])
    }

    fn closes(&self) -> &[Option<f64>] {
        self.indicators
            .quote
            .first()
            .map(|quote| quote.close.as_slice())
            .unwrap_or(&[])
    }

    /// Split/dividend adjusted closes when Yahoo supplies them.
    fn adjusted_closes(&self) -> &[Option<f64>] {
        match self.indicators.adjclose.as_deref().and_then(<[_]>::first) {
            Some(adjusted) if adjusted.adjclose.len() == self.timestamps().len() => {
                &adjusted.adjclose
            }
            _ => self.closes(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    instrument_type: Option<String>,
    #[serde(default)]
    exchange_timezone_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
    #[serde(default)]
    adjclose: Option<Vec<ChartAdjClose>>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ChartAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}
