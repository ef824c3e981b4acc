use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;

use super::{DateWindow, ForecastStore, InsertOutcome, StoreError};
use crate::{EvaluatedForecast, EvaluationRecord, Forecast, ForecastId, NewForecast};

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    schema_ready: bool,
    forecasts: BTreeMap<ForecastId, Forecast>,
    evaluations: BTreeMap<ForecastId, EvaluationRecord>,
    failing_inserts: HashSet<ForecastId>,
}

/// In-process [`ForecastStore`]; every operation runs under one lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every evaluation insert for `id` fail with
    /// [`StoreError::Unavailable`].
    pub fn fail_inserts_for(&self, id: ForecastId) {
        self.lock().failing_inserts.insert(id);
    }

    pub fn evaluation(&self, id: ForecastId) -> Option<EvaluationRecord> {
        self.lock().evaluations.get(&id).cloned()
    }

    pub fn evaluations(&self) -> Vec<EvaluationRecord> {
        self.lock().evaluations.values().cloned().collect()
    }

    pub fn schema_ready(&self) -> bool {
        self.lock().schema_ready
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ForecastStore for MemoryStore {
    fn ensure_schema(&self) -> Result<(), StoreError> {
        self.lock().schema_ready = true;
        Ok(())
    }

    fn recent_forecasts(&self, window: DateWindow) -> Result<Vec<Forecast>, StoreError> {
        let state = self.lock();
        let mut recent: Vec<Forecast> = state
            .forecasts
            .values()
            .filter(|forecast| window.contains(forecast.target_date))
            .cloned()
            .collect();
        recent.sort_by_key(|forecast| (forecast.target_date, forecast.id));
        Ok(recent)
    }

    fn evaluated_ids(&self, ids: &[ForecastId]) -> Result<HashSet<ForecastId>, StoreError> {
        let state = self.lock();
        Ok(ids
            .iter()
            .filter(|id| state.evaluations.contains_key(*id))
            .copied()
            .collect())
    }

    fn insert_evaluation(&self, record: &EvaluationRecord) -> Result<InsertOutcome, StoreError> {
        let mut state = self.lock();
        if state.failing_inserts.contains(&record.forecast_id) {
            return Err(StoreError::Unavailable(format!(
                "injected failure for forecast {}",
                record.forecast_id
            )));
        }
        if !state.forecasts.contains_key(&record.forecast_id) {
            return Err(StoreError::UnknownForecast(record.forecast_id));
        }
        if state.evaluations.contains_key(&record.forecast_id) {
            return Ok(InsertOutcome::Conflict);
        }

        state.evaluations.insert(record.forecast_id, record.clone());
        Ok(InsertOutcome::Inserted)
    }

    fn insert_forecast(&self, forecast: &NewForecast) -> Result<Forecast, StoreError> {
        let mut state = self.lock();
        state.next_id += 1;
        let stored = forecast.clone().into_forecast(ForecastId(state.next_id));
        state.forecasts.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn evaluation_history(&self, since: NaiveDate) -> Result<Vec<EvaluatedForecast>, StoreError> {
        let state = self.lock();
        let mut history: Vec<EvaluatedForecast> = state
            .evaluations
            .values()
            .filter_map(|evaluation| {
                let forecast = state.forecasts.get(&evaluation.forecast_id)?;
                (forecast.target_date >= since).then(|| EvaluatedForecast {
                    forecast: forecast.clone(),
                    evaluation: evaluation.clone(),
                })
            })
            .collect();
        history.sort_by(|left, right| {
            (left.forecast.target_date, &left.forecast.symbol, left.forecast.id).cmp(&(
                right.forecast.target_date,
                &right.forecast.symbol,
                right.forecast.id,
            ))
        });
        Ok(history)
    }
}
