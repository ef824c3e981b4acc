//! Forecast issuance.
//!
//! Issuing a forecast fetches daily history, drops a provisional last bar,
//! feeds the final returns to a [`VolatilityModel`] and records the
//! prediction against the next trading date after the last final bar.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::completeness::{self, CompletenessDecision, ResolveError};
use crate::horizon::next_target_date;
use crate::metrics::{self, MetricError};
use crate::provider::{MarketDataProvider, ProviderError};
use crate::retry::RetryPolicy;
use crate::store::{ForecastStore, StoreError};
use crate::{AssetClassification, Forecast, ModelConfig, NewForecast, Symbol};

pub const DEFAULT_HISTORY_DAYS: u32 = 1460;
pub const DEFAULT_ISSUE_CONCURRENCY: usize = 3;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("model needs at least {needed} returns, got {got}")]
    InsufficientData { needed: usize, got: usize },
    #[error("model did not converge: {0}")]
    NotConverged(String),
}

/// One-step-ahead volatility model, in percent units.
pub trait VolatilityModel: Send + Sync {
    fn predict(&self, returns: &[f64], config: &ModelConfig) -> Result<f64, ModelError>;
}

#[derive(Debug, Error)]
pub enum IssueError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Metric(#[from] MetricError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("model returned a non-finite or negative volatility: {0}")]
    InvalidPrediction(f64),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("issuance task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuedForecast {
    pub forecast: Forecast,
    pub classification: AssetClassification,
    pub decision: CompletenessDecision,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueFailure {
    pub symbol: Symbol,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IssueReport {
    pub issued: Vec<IssuedForecast>,
    pub failed: Vec<IssueFailure>,
}

#[derive(Clone)]
pub struct ForecastIssuer {
    provider: Arc<dyn MarketDataProvider>,
    store: Arc<dyn ForecastStore>,
    model: Arc<dyn VolatilityModel>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    history_days: u32,
}

impl ForecastIssuer {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        store: Arc<dyn ForecastStore>,
        model: Arc<dyn VolatilityModel>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            provider,
            store,
            model,
            clock,
            retry: RetryPolicy::default(),
            history_days: DEFAULT_HISTORY_DAYS,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_history_days(mut self, history_days: u32) -> Self {
        self.history_days = history_days;
        self
    }

    pub async fn issue(
        &self,
        symbol: &Symbol,
        config: &ModelConfig,
    ) -> Result<IssuedForecast, IssueError> {
        let history = self
            .retry
            .run("daily_history", || {
                self.provider.daily_history(symbol, self.history_days)
            })
            .await?;

        let decision = completeness::resolve(
            &history.series,
            &history.profile.classification,
            &history.profile.timezone,
            self.clock.as_ref(),
        )?;
        let closes: Vec<f64> = decision
            .final_bars(&history.series)
            .iter()
            .map(|bar| bar.close)
            .collect();
        let returns = metrics::percent_log_returns(&closes)?;
        if returns.is_empty() {
            return Err(MetricError::EmptyReturns {
                observations: closes.len(),
            }
            .into());
        }

        let predicted = self.model.predict(&returns, config)?;
        if !predicted.is_finite() || predicted < 0.0 {
            return Err(IssueError::InvalidPrediction(predicted));
        }

        let target_date =
            next_target_date(decision.effective_last_date, &history.profile.classification);
        let new_forecast = NewForecast {
            symbol: symbol.clone(),
            issued_at: self.clock.now(),
            target_date,
            model: *config,
            predicted_volatility: predicted,
        };

        let store = Arc::clone(&self.store);
        let forecast = tokio::task::spawn_blocking(move || store.insert_forecast(&new_forecast))
            .await
            .map_err(|error| IssueError::Task(error.to_string()))??;

        info!(
            symbol = %symbol,
            forecast_id = %forecast.id,
            classification = %history.profile.classification,
            %target_date,
            predicted_volatility = predicted,
            "issued forecast"
        );

        Ok(IssuedForecast {
            forecast,
            classification: history.profile.classification,
            decision,
        })
    }

    /// Issue for every symbol with at most `concurrency` in flight. A failed
    /// symbol is reported and does not stop the others.
    pub async fn issue_many(
        &self,
        symbols: &[Symbol],
        config: &ModelConfig,
        concurrency: usize,
    ) -> IssueReport {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for symbol in symbols {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let issuer = self.clone();
            let symbol = symbol.clone();
            let config = *config;
            tasks.spawn(async move {
                let _permit = permit;
                let result = issuer.issue(&symbol, &config).await;
                (symbol, result)
            });
        }

        let mut report = IssueReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(issued))) => report.issued.push(issued),
                Ok((symbol, Err(error))) => {
                    warn!(symbol = %symbol, error = %error, "could not issue forecast");
                    report.failed.push(IssueFailure {
                        symbol,
                        reason: error.to_string(),
                    });
                }
                Err(error) => warn!(error = %error, "issuance task did not complete"),
            }
        }

        report
            .issued
            .sort_by(|left, right| left.forecast.symbol.cmp(&right.forecast.symbol));
        report.failed.sort_by(|left, right| left.symbol.cmp(&right.symbol));
        report
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::clock::FixedClock;
    use crate::provider::{
        DailyHistory, InstrumentProfile, IntradayBatch, IntradayInterval, ProviderFuture,
    };
    use crate::store::MemoryStore;
    use crate::{BarSeries, DailyBar};

    struct WeekProvider;

    impl MarketDataProvider for WeekProvider {
        fn daily_history<'a>(
            &'a self,
            symbol: &'a Symbol,
            _lookback_days: u32,
        ) -> ProviderFuture<'a, DailyHistory> {
            Box::pin(async move {
                if symbol.as_str() == "GONE" {
                    return Err(ProviderError::empty_result("no chart"));
                }
                let bars = (12..=16)
                    .map(|day| {
                        DailyBar::new(
                            NaiveDate::from_ymd_opt(2026, 10, day).expect("date"),
                            100.0 + f64::from(day),
                        )
                    })
                    .collect();
                let series = BarSeries::new(symbol.clone(), bars)
                    .map_err(|error| ProviderError::internal(error.to_string()))?;
                Ok(DailyHistory {
                    profile: InstrumentProfile {
                        classification: AssetClassification::Equity,
                        timezone: "America/New_York".to_string(),
                    },
                    series,
                })
            })
        }

        fn intraday<'a>(
            &'a self,
            _symbols: &'a [Symbol],
            _start: NaiveDate,
            _end: NaiveDate,
            _interval: IntradayInterval,
        ) -> ProviderFuture<'a, IntradayBatch> {
            Box::pin(async { Err(ProviderError::invalid_request("not used")) })
        }
    }

    struct MeanAbsModel;

    impl VolatilityModel for MeanAbsModel {
        fn predict(&self, returns: &[f64], _config: &ModelConfig) -> Result<f64, ModelError> {
            Ok(returns.iter().map(|value| value.abs()).sum::<f64>() / returns.len() as f64)
        }
    }

    fn issuer(store: Arc<MemoryStore>, hour_utc: u32) -> ForecastIssuer {
        let clock = FixedClock::new(
            Utc.with_ymd_and_hms(2026, 10, 16, hour_utc, 0, 0)
                .single()
                .expect("timestamp"),
        );
        ForecastIssuer::new(
            Arc::new(WeekProvider),
            store,
            Arc::new(MeanAbsModel),
            Arc::new(clock),
        )
        .with_retry_policy(RetryPolicy::no_retry(Duration::from_secs(1)))
    }

    #[tokio::test]
    async fn friday_after_close_targets_monday() {
        // 21:00 UTC is 17:00 in New York
        let store = Arc::new(MemoryStore::new());
        let issued = issuer(store, 21)
            .issue(&Symbol::parse("AAPL").expect("symbol"), &ModelConfig::default())
            .await
            .expect("issue");

        assert!(issued.decision.is_final);
        assert!(!issued.decision.dropped_provisional);
        assert_eq!(
            issued.forecast.target_date,
            NaiveDate::from_ymd_opt(2026, 10, 19).expect("date")
        );
    }

    #[tokio::test]
    async fn friday_during_session_targets_friday() {
        // 15:00 UTC is 11:00 in New York
        let store = Arc::new(MemoryStore::new());
        let issued = issuer(store, 15)
            .issue(&Symbol::parse("AAPL").expect("symbol"), &ModelConfig::default())
            .await
            .expect("issue");

        assert!(issued.decision.is_final);
        assert!(issued.decision.dropped_provisional);
        assert_eq!(
            issued.decision.effective_last_date,
            NaiveDate::from_ymd_opt(2026, 10, 15).expect("date")
        );
        assert_eq!(
            issued.forecast.target_date,
            NaiveDate::from_ymd_opt(2026, 10, 16).expect("date")
        );
    }

    #[tokio::test]
    async fn one_failing_symbol_does_not_stop_the_rest() {
        let store = Arc::new(MemoryStore::new());
        let symbols = vec![
            Symbol::parse("MSFT").expect("symbol"),
            Symbol::parse("GONE").expect("symbol"),
            Symbol::parse("AAPL").expect("symbol"),
        ];

        let report = issuer(store, 21)
            .issue_many(&symbols, &ModelConfig::default(), DEFAULT_ISSUE_CONCURRENCY)
            .await;

        let issued: Vec<&str> = report
            .issued
            .iter()
            .map(|issued| issued.forecast.symbol.as_str())
            .collect();
        assert_eq!(issued, vec!["AAPL", "MSFT"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].symbol.as_str(), "GONE");
    }
}
