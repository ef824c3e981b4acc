//! Behavior-driven tests for the Yahoo chart provider
//!
//! These tests verify WHAT the adapter hands to the engine for canned chart
//! responses: instrument profiles, exchange-dated daily bars, intraday
//! batches with absent instruments, and the structured errors it reports.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use volgauge_core::{
    AssetClassification, Backoff, EngineConfig, FixedClock, ForecastStore, HttpClient, HttpError,
    HttpFuture, HttpRequest, HttpResponse, IntradayInterval, MarketDataProvider, MemoryStore,
    ModelConfig, NewForecast, ProviderErrorKind, ReconciliationDriver, RetryPolicy, Symbol,
    YahooChartAdapter,
};

// =============================================================================
// Test doubles
// =============================================================================

/// Answers by symbol path segment; unknown symbols get a 404.
struct RoutedHttpClient {
    routes: Vec<(String, u16, String)>,
    /// Status served before a route's own answer, and how many times.
    outages: Vec<(String, u16, AtomicUsize)>,
    transport_failure: Option<HttpError>,
    urls: Mutex<Vec<String>>,
}

impl RoutedHttpClient {
    fn new() -> Self {
        Self {
            routes: Vec::new(),
            outages: Vec::new(),
            transport_failure: None,
            urls: Mutex::new(Vec::new()),
        }
    }

    fn failing(error: HttpError) -> Self {
        Self {
            transport_failure: Some(error),
            ..Self::new()
        }
    }

    fn route(mut self, symbol: &str, status: u16, body: &str) -> Self {
        self.routes
            .push((format!("/chart/{symbol}?"), status, body.to_string()));
        self
    }

    fn failing_first(mut self, symbol: &str, status: u16, times: usize) -> Self {
        self.outages
            .push((format!("/chart/{symbol}?"), status, AtomicUsize::new(times)));
        self
    }

    fn urls(&self) -> Vec<String> {
        self.urls.lock().expect("urls lock").clone()
    }

    fn requests_for(&self, symbol: &str) -> usize {
        let path = format!("/chart/{symbol}?");
        self.urls().iter().filter(|url| url.contains(&path)).count()
    }
}

impl HttpClient for RoutedHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        self.urls.lock().expect("urls lock").push(request.url.clone());
        if let Some(error) = self.transport_failure.clone() {
            return Box::pin(async move { Err(error) });
        }

        let outage = self.outages.iter().find(|(path, _, remaining)| {
            request.url.contains(path.as_str())
                && remaining
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                    .is_ok()
        });
        if let Some((_, status, _)) = outage {
            let response = HttpResponse {
                status: *status,
                body: String::new(),
            };
            return Box::pin(async move { Ok(response) });
        }

        let response = self
            .routes
            .iter()
            .find(|(path, _, _)| request.url.contains(path.as_str()))
            .map(|(_, status, body)| HttpResponse {
                status: *status,
                body: body.clone(),
            })
            .unwrap_or(HttpResponse {
                status: 404,
                body: String::new(),
            });
        Box::pin(async move { Ok(response) })
    }
}

/// Serves the same intraday chart for every symbol after a short delay.
struct SlowChartClient {
    delay: Duration,
    requests: AtomicUsize,
}

impl HttpClient for SlowChartClient {
    fn execute<'a>(&'a self, _request: HttpRequest) -> HttpFuture<'a> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            Ok(HttpResponse {
                status: 200,
                body: AAPL_INTRADAY.to_string(),
            })
        })
    }
}

fn quick_retries() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        backoff: Backoff::Fixed(Duration::ZERO),
        attempt_timeout: Duration::from_secs(1),
    }
}

fn adapter(client: Arc<dyn HttpClient>) -> YahooChartAdapter {
    YahooChartAdapter::new(client)
        .with_base_url("http://yahoo.test")
        .with_retry_policy(quick_retries())
}

fn after_the_week(
    store: Arc<MemoryStore>,
    provider: YahooChartAdapter,
    config: EngineConfig,
) -> ReconciliationDriver {
    let clock = FixedClock::new(
        Utc.with_ymd_and_hms(2026, 10, 19, 6, 0, 0)
            .single()
            .expect("valid timestamp"),
    );
    ReconciliationDriver::new(store, Arc::new(provider), Arc::new(clock), config).expect("driver")
}

fn store_forecast(store: &MemoryStore, raw: &str) {
    store
        .insert_forecast(&NewForecast {
            symbol: symbol(raw),
            issued_at: Utc
                .with_ymd_and_hms(2026, 10, 15, 21, 0, 0)
                .single()
                .expect("valid timestamp"),
            target_date: date(16),
            model: ModelConfig::default(),
            predicted_volatility: 1.0,
        })
        .expect("forecast insert");
}

fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("valid symbol")
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, day).expect("valid date")
}

/// AAPL on 2026-10-16 from 13:30 UTC, with a missing close and one bar
/// already on the next UTC day.
const AAPL_INTRADAY: &str = r#"{"chart":{"result":[{
    "meta":{"instrumentType":"EQUITY","exchangeTimezoneName":"America/New_York"},
    "timestamp":[1792157400,1792157700,1792158000,1792158300,1792195500],
    "indicators":{"quote":[{"close":[100.0,101.0,null,100.0,250.0]}]}
}],"error":null}}"#;

const BTC_DAILY: &str = r#"{"chart":{"result":[{
    "meta":{"instrumentType":"CRYPTOCURRENCY","exchangeTimezoneName":"UTC"},
    "timestamp":[1791936000,1792022400,1792108800],
    "indicators":{"quote":[{"close":[61000.0,null,62000.0]}]}
}],"error":null}}"#;

const BARE_DAILY: &str = r#"{"chart":{"result":[{
    "meta":{},
    "timestamp":[1792080000],
    "indicators":{"quote":[{"close":[12.5]}]}
}],"error":null}}"#;

// =============================================================================
// Provider: daily history
// =============================================================================

#[tokio::test]
async fn crypto_history_is_classified_as_continuous() {
    // Given: A chart for a crypto pair with one missing close
    let client = Arc::new(RoutedHttpClient::new().route("BTC-USD", 200, BTC_DAILY));

    // When: Daily history is requested
    let history = adapter(client)
        .daily_history(&symbol("BTC-USD"), 30)
        .await
        .expect("history");

    // Then: The profile is continuous and the missing close is skipped
    assert_eq!(history.profile.classification, AssetClassification::Continuous);
    assert_eq!(history.profile.timezone, "UTC");
    let dates: Vec<NaiveDate> = history.series.bars().iter().map(|bar| bar.date).collect();
    assert_eq!(dates, vec![date(14), date(16)]);
}

#[tokio::test]
async fn chart_without_metadata_uses_defaults() {
    // Given: A chart whose metadata omits type and timezone
    let client = Arc::new(RoutedHttpClient::new().route("OBSCURE", 200, BARE_DAILY));

    // When: Daily history is requested
    let history = adapter(client)
        .daily_history(&symbol("OBSCURE"), 30)
        .await
        .expect("history");

    // Then: The classification is unrecognized and the timezone is New York
    assert_eq!(
        history.profile.classification,
        AssetClassification::Other("UNKNOWN".to_string())
    );
    assert_eq!(history.profile.timezone, "America/New_York");
    assert_eq!(history.series.last_date(), Some(date(15)));
}

#[tokio::test]
async fn rate_limiting_is_reported_as_retryable() {
    // Given: Yahoo answers 429
    let client = Arc::new(RoutedHttpClient::new().route("AAPL", 429, ""));

    // When: Daily history is requested
    let error = adapter(client)
        .daily_history(&symbol("AAPL"), 30)
        .await
        .expect_err("must fail");

    // Then: The error is a retryable rate limit
    assert_eq!(error.kind(), ProviderErrorKind::RateLimited);
    assert!(error.retryable());
}

#[tokio::test]
async fn transport_timeout_is_reported_as_a_timeout() {
    // Given: The connection to Yahoo times out
    let client = Arc::new(RoutedHttpClient::failing(HttpError::Timeout(
        "operation timed out".to_string(),
    )));

    // When: Daily history is requested
    let error = adapter(client)
        .daily_history(&symbol("AAPL"), 30)
        .await
        .expect_err("must fail");

    // Then: The provider reports a retryable timeout
    assert_eq!(error.kind(), ProviderErrorKind::Timeout);
    assert!(error.retryable());
}

// =============================================================================
// Provider: intraday batches
// =============================================================================

#[tokio::test]
async fn intraday_batch_keeps_only_the_requested_day() {
    // Given: AAPL has intraday data, MSFT is unknown to Yahoo
    let client = Arc::new(RoutedHttpClient::new().route("AAPL", 200, AAPL_INTRADAY));
    let symbols = vec![symbol("AAPL"), symbol("MSFT")];

    // When: A batch for 2026-10-16 is requested
    let batch = adapter(client.clone())
        .intraday(&symbols, date(16), date(17), IntradayInterval::FiveMinutes)
        .await
        .expect("batch");

    // Then: Only AAPL is present, with the next-day bar and the null close dropped
    assert_eq!(batch.len(), 1);
    assert!(batch.get(&symbol("MSFT")).is_none());
    let aapl = batch.get(&symbol("AAPL")).expect("AAPL series");
    assert_eq!(aapl.closes_between(date(16), date(17)), vec![100.0, 101.0, 100.0]);

    // And: One request per symbol covers UTC midnight to midnight
    let urls = client.urls();
    assert_eq!(urls.len(), 2);
    assert!(urls[0].contains("period1=1792108800&period2=1792195200&interval=5m"));
}

#[tokio::test]
async fn batch_with_no_data_at_all_is_an_empty_result() {
    // Given: Every requested symbol is unknown
    let client = Arc::new(RoutedHttpClient::new());
    let symbols = vec![symbol("AAAA"), symbol("BBBB")];

    // When: A batch is requested
    let error = adapter(client)
        .intraday(&symbols, date(16), date(17), IntradayInterval::FiveMinutes)
        .await
        .expect_err("must fail");

    // Then: The whole date is reported as empty, which is not retried
    assert_eq!(error.kind(), ProviderErrorKind::EmptyResult);
    assert!(!error.retryable());
}

#[tokio::test]
async fn batch_failing_everywhere_reports_the_upstream_error() {
    // Given: Yahoo is down for every symbol
    let client = Arc::new(
        RoutedHttpClient::new()
            .route("AAPL", 503, "")
            .route("MSFT", 503, ""),
    );
    let symbols = vec![symbol("AAPL"), symbol("MSFT")];

    // When: A batch is requested
    let error = adapter(client)
        .intraday(&symbols, date(16), date(17), IntradayInterval::FiveMinutes)
        .await
        .expect_err("must fail");

    // Then: The batch fails with a retryable unavailable error
    assert_eq!(error.kind(), ProviderErrorKind::Unavailable);
    assert!(error.retryable());
}

#[tokio::test]
async fn rate_limited_symbol_is_retried_within_the_batch() {
    // Given: AAPL answers at once, MSFT is rate limited on its first request
    let client = Arc::new(
        RoutedHttpClient::new()
            .route("AAPL", 200, AAPL_INTRADAY)
            .route("MSFT", 200, AAPL_INTRADAY)
            .failing_first("MSFT", 429, 1),
    );
    let symbols = vec![symbol("AAPL"), symbol("MSFT")];

    // When: A batch is requested
    let batch = adapter(client.clone())
        .intraday(&symbols, date(16), date(17), IntradayInterval::FiveMinutes)
        .await
        .expect("batch");

    // Then: MSFT is fetched again and lands in the batch next to AAPL
    assert_eq!(batch.len(), 2);
    assert!(batch.get(&symbol("MSFT")).is_some());
    assert_eq!(client.requests_for("MSFT"), 2);
    assert_eq!(client.requests_for("AAPL"), 1);
}

#[tokio::test]
async fn symbol_that_keeps_failing_is_left_out_after_its_retries() {
    // Given: MSFT answers 503 more often than the retry budget allows
    let client = Arc::new(
        RoutedHttpClient::new()
            .route("AAPL", 200, AAPL_INTRADAY)
            .route("MSFT", 200, AAPL_INTRADAY)
            .failing_first("MSFT", 503, 10),
    );
    let symbols = vec![symbol("AAPL"), symbol("MSFT")];

    // When: A batch is requested
    let batch = adapter(client.clone())
        .intraday(&symbols, date(16), date(17), IntradayInterval::FiveMinutes)
        .await
        .expect("batch");

    // Then: MSFT is tried once plus two retries and then missing from the batch
    assert_eq!(batch.len(), 1);
    assert!(batch.get(&symbol("MSFT")).is_none());
    assert_eq!(client.requests_for("MSFT"), 3);
}

#[tokio::test]
async fn empty_symbol_list_is_an_invalid_request() {
    // Given: No symbols
    let client = Arc::new(RoutedHttpClient::new());

    // When: A batch is requested
    let error = adapter(client.clone())
        .intraday(&[], date(16), date(17), IntradayInterval::FiveMinutes)
        .await
        .expect_err("must fail");

    // Then: It is rejected without any HTTP call
    assert_eq!(error.kind(), ProviderErrorKind::InvalidRequest);
    assert!(client.urls().is_empty());
}

// =============================================================================
// Provider: end to end with the reconciliation driver
// =============================================================================

#[tokio::test]
async fn driver_evaluates_forecasts_from_yahoo_intraday_data() {
    // Given: Two forecasts for 2026-10-16, only one of which Yahoo has data for
    let store = Arc::new(MemoryStore::new());
    store_forecast(&store, "AAPL");
    store_forecast(&store, "MSFT");
    let client = Arc::new(RoutedHttpClient::new().route("AAPL", 200, AAPL_INTRADAY));
    let driver = after_the_week(store.clone(), adapter(client), EngineConfig::default());

    // When: The driver runs
    let report = driver.run(7).await.expect("run");

    // Then: AAPL is evaluated from its intraday closes and MSFT stays pending
    assert_eq!(report.evaluated, 1);
    assert_eq!(report.failed, 1);
    let evaluations = store.evaluations();
    assert_eq!(evaluations.len(), 1);
    let expected = ((100.0_f64 * (101.0_f64 / 100.0).ln()).powi(2)
        + (100.0_f64 * (100.0_f64 / 101.0).ln()).powi(2))
    .sqrt();
    assert!((evaluations[0].realized_volatility - expected).abs() < 1e-9);
}

#[tokio::test]
async fn large_date_group_is_not_cut_off_by_the_request_timeout() {
    // Given: Eighty forecasts for one date and a chart endpoint taking 10 ms per
    // symbol, so the whole fan-out lasts far longer than one request timeout
    let store = Arc::new(MemoryStore::new());
    for index in 0..80 {
        store_forecast(&store, &format!("SYM{index}"));
    }
    let client = Arc::new(SlowChartClient {
        delay: Duration::from_millis(10),
        requests: AtomicUsize::new(0),
    });
    let provider = adapter(client.clone())
        .with_requests_per_second(NonZeroU32::new(1000).expect("non-zero rate"));
    let config = EngineConfig {
        fetch_timeout: Duration::from_millis(100),
        fetch_retries: 0,
        ..EngineConfig::default()
    };
    let driver = after_the_week(store.clone(), provider, config);

    // When: The driver runs
    let report = driver.run(7).await.expect("run");

    // Then: Every forecast of the group is evaluated from one pass over the symbols
    assert_eq!(report.evaluated, 80);
    assert_eq!(report.failed, 0);
    assert_eq!(store.evaluations().len(), 80);
    assert_eq!(client.requests.load(Ordering::SeqCst), 80);
}
