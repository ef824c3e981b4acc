//! Forecast store contract.
//!
//! The store is the only durable shared resource. Implementations must make
//! [`ForecastStore::insert_evaluation`] atomic per forecast: either the whole
//! record lands, or it reports [`InsertOutcome::Conflict`] because a record
//! already exists, or it fails without writing anything.

mod memory;
mod warehouse;

use std::collections::HashSet;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use thiserror::Error;
use volgauge_warehouse::WarehouseError;

use crate::{EvaluatedForecast, EvaluationRecord, Forecast, ForecastId, NewForecast};

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("stored row is corrupt: {0}")]
    Corrupt(String),

    #[error("forecast {0} does not exist")]
    UnknownForecast(ForecastId),

    #[error("record rejected: {0}")]
    Rejected(String),
}

/// Result of an insert-or-skip evaluation write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertOutcome {
    Inserted,
    /// The forecast already had an evaluation; nothing was written.
    Conflict,
}

/// Half-open target-date window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// The `lookback_days` days strictly before `today`.
    pub fn lookback(today: NaiveDate, lookback_days: u32) -> Self {
        let start = today
            .checked_sub_days(Days::new(u64::from(lookback_days)))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end: today }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

pub trait ForecastStore: Send + Sync {
    /// Create tables if missing. Idempotent.
    fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Forecasts whose target date lies in `window`, ordered by target date
    /// then id.
    fn recent_forecasts(&self, window: DateWindow) -> Result<Vec<Forecast>, StoreError>;

    /// The subset of `ids` that already have an evaluation.
    fn evaluated_ids(&self, ids: &[ForecastId]) -> Result<HashSet<ForecastId>, StoreError>;

    fn insert_evaluation(&self, record: &EvaluationRecord) -> Result<InsertOutcome, StoreError>;

    fn insert_forecast(&self, forecast: &NewForecast) -> Result<Forecast, StoreError>;

    /// Evaluated forecasts with a target date on or after `since`.
    fn evaluation_history(&self, since: NaiveDate) -> Result<Vec<EvaluatedForecast>, StoreError>;

    /// Forecasts due in the lookback window that have no evaluation yet.
    fn list_unevaluated(
        &self,
        today: NaiveDate,
        lookback_days: u32,
    ) -> Result<Vec<Forecast>, StoreError> {
        let recent = self.recent_forecasts(DateWindow::lookback(today, lookback_days))?;
        let ids: Vec<ForecastId> = recent.iter().map(|forecast| forecast.id).collect();
        let evaluated = self.evaluated_ids(&ids)?;

        Ok(recent
            .into_iter()
            .filter(|forecast| !evaluated.contains(&forecast.id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookback_window_excludes_today() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).expect("date");
        let window = DateWindow::lookback(today, 7);

        assert!(window.contains(NaiveDate::from_ymd_opt(2026, 10, 12).expect("date")));
        assert!(window.contains(NaiveDate::from_ymd_opt(2026, 10, 18).expect("date")));
        assert!(!window.contains(today));
        assert!(!window.contains(NaiveDate::from_ymd_opt(2026, 10, 11).expect("date")));
    }
}
