//! Realized-outcome fetching and per-forecast scoring for one target date.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::{debug, warn};

use crate::metrics::{self, MetricError, ZeroVolatilityPolicy};
use crate::provider::{IntradayBatch, IntradayInterval, MarketDataProvider};
use crate::retry::RetryPolicy;
use crate::{EvaluationRecord, Forecast, ForecastId, Symbol};

/// Why a forecast could not be evaluated in this run. The forecast stays
/// pending and is picked up again by the next run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The batch fetch for the whole date failed or came back empty.
    DataUnavailable,
    /// The batch succeeded but had no usable bars for this instrument.
    InstrumentDataMissing,
    /// Metric calculation rejected the instrument's data.
    ComputationError,
    /// The evaluation could not be written.
    PersistenceFailed,
}

impl FailureKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DataUnavailable => "data_unavailable",
            Self::InstrumentDataMissing => "instrument_data_missing",
            Self::ComputationError => "computation_error",
            Self::PersistenceFailed => "persistence_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchFailure {
    pub forecast_id: ForecastId,
    pub symbol: Symbol,
    pub target_date: NaiveDate,
    pub kind: FailureKind,
    pub reason: String,
}

impl FetchFailure {
    pub fn new(forecast: &Forecast, kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            forecast_id: forecast.id,
            symbol: forecast.symbol.clone(),
            target_date: forecast.target_date,
            kind,
            reason: reason.into(),
        }
    }
}

impl Display for FetchFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} for forecast {} ({} on {}): {}",
            self.kind.as_str(),
            self.forecast_id,
            self.symbol,
            self.target_date,
            self.reason
        )
    }
}

impl std::error::Error for FetchFailure {}

/// A scored forecast ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationOutcome {
    pub forecast: Forecast,
    pub record: EvaluationRecord,
}

pub type ItemResult = Result<EvaluationOutcome, FetchFailure>;

pub struct OutcomeFetcher {
    provider: Arc<dyn MarketDataProvider>,
    retry: RetryPolicy,
    interval: IntradayInterval,
    zero_policy: ZeroVolatilityPolicy,
}

impl OutcomeFetcher {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        retry: RetryPolicy,
        interval: IntradayInterval,
        zero_policy: ZeroVolatilityPolicy,
    ) -> Self {
        Self {
            provider,
            retry,
            interval,
            zero_policy,
        }
    }

    /// Fetch intraday bars for `[date, date + 1)` in one batch and score every
    /// forecast of the group. Returns one result per forecast, in input order.
    pub async fn fetch_and_score(
        &self,
        date: NaiveDate,
        forecasts: &[Forecast],
        run_date: NaiveDate,
    ) -> Vec<ItemResult> {
        if forecasts.is_empty() {
            return Vec::new();
        }

        let symbols: Vec<Symbol> = forecasts
            .iter()
            .map(|forecast| forecast.symbol.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let end = date.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX);

        // the provider fetches symbol by symbol, so one attempt covers them all
        let batch = self
            .retry
            .for_batch(symbols.len())
            .run("intraday", || {
                self.provider.intraday(&symbols, date, end, self.interval)
            })
            .await;

        let batch = match batch {
            Ok(batch) => batch,
            Err(error) => {
                warn!(
                    %date,
                    symbols = symbols.len(),
                    code = error.code(),
                    error = %error,
                    "no intraday data for date group, leaving it pending"
                );
                let reason = error.to_string();
                return forecasts
                    .iter()
                    .map(|forecast| {
                        Err(FetchFailure::new(forecast, FailureKind::DataUnavailable, reason.clone()))
                    })
                    .collect();
            }
        };

        forecasts
            .iter()
            .map(|forecast| self.score_one(forecast, &batch, date, end, run_date))
            .collect()
    }

    fn score_one(
        &self,
        forecast: &Forecast,
        batch: &IntradayBatch,
        date: NaiveDate,
        end: NaiveDate,
        run_date: NaiveDate,
    ) -> ItemResult {
        let Some(series) = batch.get(&forecast.symbol) else {
            warn!(symbol = %forecast.symbol, %date, "instrument missing from intraday batch");
            return Err(FetchFailure::new(
                forecast,
                FailureKind::InstrumentDataMissing,
                "instrument absent from intraday batch",
            ));
        };

        let closes = series.closes_between(date, end);
        let scored = metrics::score(&closes, forecast.predicted_volatility, self.zero_policy)
            .map_err(|error| {
                let kind = match error {
                    MetricError::EmptyReturns { .. } => FailureKind::InstrumentDataMissing,
                    MetricError::InvalidPrice { .. } | MetricError::InvalidPrediction(_) => {
                        FailureKind::ComputationError
                    }
                };
                warn!(symbol = %forecast.symbol, %date, error = %error, "could not score forecast");
                FetchFailure::new(forecast, kind, error.to_string())
            })?;

        if !scored.realized_volatility.is_finite() {
            return Err(FetchFailure::new(
                forecast,
                FailureKind::ComputationError,
                "realized volatility is not finite",
            ));
        }

        debug!(
            forecast_id = %forecast.id,
            symbol = %forecast.symbol,
            realized = scored.realized_volatility,
            predicted = forecast.predicted_volatility,
            "scored forecast"
        );

        Ok(EvaluationOutcome {
            forecast: forecast.clone(),
            record: EvaluationRecord {
                forecast_id: forecast.id,
                evaluation_run_date: run_date,
                realized_volatility: scored.realized_volatility,
                error_raw: scored.metrics.error_raw,
                error_abs: scored.metrics.error_abs,
                error_rel: scored.metrics.error_rel,
                error_sq: scored.metrics.error_sq,
            },
        })
    }
}
