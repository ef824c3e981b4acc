//! # Volgauge Core
//!
//! Forecast horizon rules and forecast-evaluation reconciliation for daily
//! volatility forecasts.
//!
//! ## Overview
//!
//! - **Completeness and horizon rules**: decide whether the newest daily bar
//!   is final in its market's timezone, and which trading date a forecast
//!   made from it targets
//! - **Reconciliation**: find forecasts whose target date has passed without
//!   an evaluation, measure realized intraday volatility for them, and record
//!   exactly one evaluation per forecast
//! - **Issuance and reporting**: issue forecasts through a pluggable model,
//!   and summarize recorded accuracy
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`accuracy`] | Accuracy summaries by date and instrument |
//! | [`adapters`] | Market data adapters (Yahoo chart API) |
//! | [`clock`] | Injectable wall clock |
//! | [`completeness`] | Final/provisional decision for the last daily bar |
//! | [`config`] | Engine configuration from the environment |
//! | [`domain`] | Domain models (Symbol, BarSeries, Forecast, EvaluationRecord) |
//! | [`error`] | Validation and run-level errors |
//! | [`fetcher`] | Batched intraday fetch and per-forecast scoring |
//! | [`horizon`] | Next target date after the last final bar |
//! | [`http_client`] | HTTP client abstraction |
//! | [`issuance`] | Forecast issuance through a [`VolatilityModel`] |
//! | [`market_rules`] | Session-close rule table per asset classification |
//! | [`metrics`] | Realized volatility and forecast error metrics |
//! | [`provider`] | Market data provider contract |
//! | [`reconcile`] | Reconciliation driver and run report |
//! | [`retry`] | Bounded retries with backoff |
//! | [`scanner`] | Pending-evaluation scan grouped by target date |
//! | [`store`] | Forecast store contract and implementations |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │ ReconciliationDriver│
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐     ┌──────────────────────┐
//! │ Scanner             │────▶│ ForecastStore        │
//! └──────────┬──────────┘     │ (DuckDB / memory)    │
//!            │ date groups    └──────────▲───────────┘
//!            ▼                           │ insert-or-skip
//! ┌─────────────────────┐     ┌──────────┴───────────┐
//! │ OutcomeFetcher      │────▶│ Error metrics        │
//! │ (MarketDataProvider)│     └──────────────────────┘
//! └─────────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! A run only fails as a whole when it cannot start or scan:
//!
//! ```rust,ignore
//! use volgauge_core::{EngineError, ReconciliationDriver};
//!
//! async fn nightly(driver: &ReconciliationDriver) -> Result<(), EngineError> {
//!     let report = driver.run(7).await?;
//!     for failure in &report.failures {
//!         eprintln!("{failure}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod accuracy;
pub mod adapters;
pub mod clock;
pub mod completeness;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod horizon;
pub mod http_client;
pub mod issuance;
pub mod market_rules;
pub mod metrics;
pub mod provider;
pub mod reconcile;
pub mod retry;
pub mod scanner;
pub mod store;

// Adapter implementations
pub use adapters::YahooChartAdapter;

// Accuracy
pub use accuracy::{summarize, AccuracySummary, GroupAccuracy};

// Clock
pub use clock::{Clock, FixedClock, SystemClock};

// Completeness and horizon
pub use completeness::{resolve, CompletenessDecision, ResolveError};
pub use horizon::next_target_date;
pub use market_rules::{session_policy, MarketRule, SessionClose, SessionPolicy};

// Configuration
pub use config::{ConfigError, EngineConfig};

// Domain models
pub use domain::{
    AssetClassification, BarSeries, DailyBar, Distribution, EvaluatedForecast, EvaluationRecord,
    Forecast, ForecastId, IntradayBar, IntradaySeries, ModelConfig, NewForecast, Symbol,
};

// Error types
pub use error::{EngineError, ValidationError};

// Reconciliation
pub use fetcher::{EvaluationOutcome, FailureKind, FetchFailure, OutcomeFetcher};
pub use reconcile::{GroupReport, ReconciliationDriver, RunReport};
pub use scanner::{MissingEvaluationScanner, PendingByDate};

// Issuance
pub use issuance::{ForecastIssuer, IssueError, IssueReport, ModelError, VolatilityModel};

// Metrics
pub use metrics::{ErrorMetrics, MetricError, ZeroVolatilityPolicy};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpFuture, HttpRequest, HttpResponse, ReqwestHttpClient,
};

// Provider contract
pub use provider::{
    DailyHistory, InstrumentProfile, IntradayBatch, IntradayInterval, MarketDataProvider,
    ProviderError, ProviderErrorKind, ProviderFuture,
};

// Retry
pub use retry::{Backoff, RetryPolicy};

// Store
pub use store::{DateWindow, ForecastStore, InsertOutcome, MemoryStore, StoreError};

// Warehouse (re-exported from volgauge-warehouse)
pub use volgauge_warehouse::{Warehouse, WarehouseConfig, WarehouseError};
