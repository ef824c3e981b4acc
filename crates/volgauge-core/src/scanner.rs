use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::clock::Clock;
use crate::store::{ForecastStore, StoreError};
use crate::Forecast;

/// Pending forecasts keyed by target date, ascending.
pub type PendingByDate = BTreeMap<NaiveDate, Vec<Forecast>>;

/// Finds forecasts that are due but have no evaluation yet.
#[derive(Clone)]
pub struct MissingEvaluationScanner {
    store: Arc<dyn ForecastStore>,
    clock: Arc<dyn Clock>,
}

impl MissingEvaluationScanner {
    pub fn new(store: Arc<dyn ForecastStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Forecasts with `today - lookback_days <= target_date < today` and no
    /// evaluation, grouped by target date. "Today" is the clock's UTC date.
    pub fn find_pending(&self, lookback_days: u32) -> Result<PendingByDate, StoreError> {
        let today = self.clock.today_utc();
        let pending = self.store.list_unevaluated(today, lookback_days)?;

        let mut grouped = PendingByDate::new();
        for forecast in pending {
            grouped
                .entry(forecast.target_date)
                .or_default()
                .push(forecast);
        }
        for forecasts in grouped.values_mut() {
            forecasts.sort_by_key(|forecast| forecast.id);
        }

        if grouped.is_empty() {
            info!(%today, lookback_days, "no pending evaluations");
        } else {
            info!(
                %today,
                lookback_days,
                dates = grouped.len(),
                forecasts = grouped.values().map(Vec::len).sum::<usize>(),
                "found pending evaluations"
            );
        }
        Ok(grouped)
    }
}
