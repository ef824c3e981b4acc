use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use volgauge_warehouse::{
    AccuracyRow, EvaluationRow, ForecastRecord, InsertStatus, NewForecastRecord, Warehouse,
};

use super::{DateWindow, ForecastStore, InsertOutcome, StoreError};
use crate::{
    Distribution, EvaluatedForecast, EvaluationRecord, Forecast, ForecastId, ModelConfig,
    NewForecast, Symbol,
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl ForecastStore for Warehouse {
    fn ensure_schema(&self) -> Result<(), StoreError> {
        self.initialize()?;
        Ok(())
    }

    fn recent_forecasts(&self, window: DateWindow) -> Result<Vec<Forecast>, StoreError> {
        let start = window.start.format(DATE_FORMAT).to_string();
        let end = window.end.format(DATE_FORMAT).to_string();
        self.forecasts_in_window(&start, &end)?
            .into_iter()
            .map(forecast_from_record)
            .collect()
    }

    fn evaluated_ids(&self, ids: &[ForecastId]) -> Result<HashSet<ForecastId>, StoreError> {
        let raw: Vec<i64> = ids.iter().map(|id| id.0).collect();
        Ok(self
            .evaluated_forecast_ids(&raw)?
            .into_iter()
            .map(ForecastId)
            .collect())
    }

    fn insert_evaluation(&self, record: &EvaluationRecord) -> Result<InsertOutcome, StoreError> {
        let row = EvaluationRow {
            forecast_id: record.forecast_id.0,
            evaluation_run_date: record.evaluation_run_date.format(DATE_FORMAT).to_string(),
            realized_volatility: record.realized_volatility,
            error_raw: record.error_raw,
            error_abs: record.error_abs,
            error_rel: record.error_rel,
            error_sq: record.error_sq,
        };

        Ok(match Warehouse::insert_evaluation(self, &row)? {
            InsertStatus::Inserted => InsertOutcome::Inserted,
            InsertStatus::Conflict => InsertOutcome::Conflict,
        })
    }

    fn insert_forecast(&self, forecast: &NewForecast) -> Result<Forecast, StoreError> {
        let stored = Warehouse::insert_forecast(
            self,
            &NewForecastRecord {
                symbol: forecast.symbol.to_string(),
                issued_at: forecast.issued_at.format(TIMESTAMP_FORMAT).to_string(),
                target_date: forecast.target_date.format(DATE_FORMAT).to_string(),
                p: to_column(forecast.model.p, "p")?,
                q: to_column(forecast.model.q, "q")?,
                dist: forecast.model.distribution.as_str().to_string(),
                predicted_volatility: forecast.predicted_volatility,
            },
        )?;

        // issued_at is stored at second precision
        let mut forecast = forecast.clone();
        forecast.issued_at = forecast
            .issued_at
            .with_nanosecond(0)
            .unwrap_or(forecast.issued_at);
        Ok(forecast.into_forecast(ForecastId(stored.id)))
    }

    fn evaluation_history(&self, since: NaiveDate) -> Result<Vec<EvaluatedForecast>, StoreError> {
        self.accuracy_history(&since.format(DATE_FORMAT).to_string())?
            .into_iter()
            .map(|AccuracyRow { forecast, evaluation }| {
                Ok(EvaluatedForecast {
                    forecast: forecast_from_record(forecast)?,
                    evaluation: EvaluationRecord {
                        forecast_id: ForecastId(evaluation.forecast_id),
                        evaluation_run_date: parse_date(&evaluation.evaluation_run_date)?,
                        realized_volatility: evaluation.realized_volatility,
                        error_raw: evaluation.error_raw,
                        error_abs: evaluation.error_abs,
                        error_rel: evaluation.error_rel,
                        error_sq: evaluation.error_sq,
                    },
                })
            })
            .collect()
    }
}

fn forecast_from_record(record: ForecastRecord) -> Result<Forecast, StoreError> {
    let symbol = Symbol::parse(&record.symbol)
        .map_err(|error| StoreError::Corrupt(format!("forecast {}: {error}", record.id)))?;
    let issued_at = NaiveDateTime::parse_from_str(&record.issued_at, TIMESTAMP_FORMAT)
        .map_err(|error| {
            StoreError::Corrupt(format!("forecast {} issued_at: {error}", record.id))
        })?
        .and_utc();
    let distribution: Distribution = record
        .dist
        .parse()
        .map_err(|error| StoreError::Corrupt(format!("forecast {}: {error}", record.id)))?;
    let model = ModelConfig::new(
        from_column(record.p, record.id)?,
        from_column(record.q, record.id)?,
        distribution,
    )
    .map_err(|error| StoreError::Corrupt(format!("forecast {}: {error}", record.id)))?;

    Ok(Forecast {
        id: ForecastId(record.id),
        symbol,
        issued_at,
        target_date: parse_date(&record.target_date)?,
        model,
        predicted_volatility: record.predicted_volatility,
    })
}

fn parse_date(value: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|error| StoreError::Corrupt(format!("date '{value}': {error}")))
}

fn to_column(value: u32, field: &str) -> Result<i32, StoreError> {
    i32::try_from(value)
        .map_err(|_| StoreError::Rejected(format!("model order {field}={value} does not fit the column")))
}

fn from_column(value: i32, id: i64) -> Result<u32, StoreError> {
    u32::try_from(value)
        .map_err(|_| StoreError::Corrupt(format!("forecast {id} has negative model order {value}")))
}
