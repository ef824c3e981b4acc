//! Reconciliation runs.
//!
//! A run ensures the schema, asks the scanner for pending forecasts, then
//! fetches and scores each target-date group on a bounded worker pool and
//! writes every scored forecast through the store's insert-or-skip path.
//! Item failures are counted in the [`RunReport`]; only schema and scan
//! failures end a run early.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::fetcher::{FailureKind, FetchFailure, ItemResult, OutcomeFetcher};
use crate::provider::MarketDataProvider;
use crate::scanner::MissingEvaluationScanner;
use crate::store::{ForecastStore, InsertOutcome, StoreError};
use crate::{EngineError, Forecast, ForecastId};

/// Counts for one target-date group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub target_date: NaiveDate,
    pub forecasts: usize,
    pub evaluated: usize,
    pub failed: usize,
    /// Scored, but another run wrote the evaluation first.
    pub already_reconciled: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub run_date: NaiveDate,
    pub lookback_days: u32,
    pub pending: usize,
    pub evaluated: usize,
    pub failed: usize,
    pub already_reconciled: usize,
    pub groups: Vec<GroupReport>,
    pub failures: Vec<FetchFailure>,
}

impl RunReport {
    fn new(run_id: Uuid, run_date: NaiveDate, lookback_days: u32) -> Self {
        Self {
            run_id,
            run_date,
            lookback_days,
            pending: 0,
            evaluated: 0,
            failed: 0,
            already_reconciled: 0,
            groups: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn absorb(&mut self, group: GroupReport, failures: Vec<FetchFailure>) {
        self.pending += group.forecasts;
        self.evaluated += group.evaluated;
        self.failed += group.failed;
        self.already_reconciled += group.already_reconciled;
        self.groups.push(group);
        self.failures.extend(failures);
    }
}

pub struct ReconciliationDriver {
    store: Arc<dyn ForecastStore>,
    clock: Arc<dyn Clock>,
    fetcher: Arc<OutcomeFetcher>,
    config: EngineConfig,
}

impl ReconciliationDriver {
    pub fn new(
        store: Arc<dyn ForecastStore>,
        provider: Arc<dyn MarketDataProvider>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let fetcher = OutcomeFetcher::new(
            provider,
            config.retry_policy(),
            config.intraday_interval,
            config.zero_volatility_policy,
        );

        Ok(Self {
            store,
            clock,
            fetcher: Arc::new(fetcher),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run with the configured lookback.
    pub async fn run_default(&self) -> Result<RunReport, EngineError> {
        self.run(self.config.lookback_days).await
    }

    pub async fn run(&self, lookback_days: u32) -> Result<RunReport, EngineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("reconcile", %run_id, lookback_days);
        self.run_inner(run_id, lookback_days).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, lookback_days: u32) -> Result<RunReport, EngineError> {
        let run_date = self.clock.today_utc();
        let mut report = RunReport::new(run_id, run_date, lookback_days);

        let store = Arc::clone(&self.store);
        off_runtime(move || store.ensure_schema())
            .await
            .map_err(|err| {
                error!(error = %err, "could not ensure evaluation schema");
                err
            })?;
        let scanner = MissingEvaluationScanner::new(Arc::clone(&self.store), Arc::clone(&self.clock));
        let pending = off_runtime(move || scanner.find_pending(lookback_days))
            .await
            .map_err(|err| {
                error!(error = %err, "could not scan for pending forecasts");
                err
            })?;

        if pending.is_empty() {
            info!(%run_date, "reconciliation finished with nothing to do");
            return Ok(report);
        }

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = JoinSet::new();
        let mut expected: BTreeMap<NaiveDate, Vec<Forecast>> = BTreeMap::new();

        for (target_date, forecasts) in pending {
            expected.insert(target_date, forecasts.clone());

            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let store = Arc::clone(&self.store);
            let fetcher = Arc::clone(&self.fetcher);
            let span = info_span!("date_group", %target_date, forecasts = forecasts.len());
            tasks.spawn(
                async move {
                    let _permit = permit;
                    process_group(store, fetcher, target_date, forecasts, run_date).await
                }
                .instrument(span),
            );
        }

        let mut finished: BTreeMap<NaiveDate, (GroupReport, Vec<FetchFailure>)> = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((group, failures)) => {
                    finished.insert(group.target_date, (group, failures));
                }
                Err(join_error) => {
                    error!(error = %join_error, "date group task did not complete");
                }
            }
        }

        for (target_date, forecasts) in expected {
            let (group, failures) = finished
                .remove(&target_date)
                .unwrap_or_else(|| abandoned_group(target_date, &forecasts));
            report.absorb(group, failures);
        }

        info!(
            %run_date,
            pending = report.pending,
            evaluated = report.evaluated,
            failed = report.failed,
            already_reconciled = report.already_reconciled,
            "reconciliation finished"
        );
        Ok(report)
    }
}

async fn process_group(
    store: Arc<dyn ForecastStore>,
    fetcher: Arc<OutcomeFetcher>,
    target_date: NaiveDate,
    forecasts: Vec<Forecast>,
    run_date: NaiveDate,
) -> (GroupReport, Vec<FetchFailure>) {
    let mut group = GroupReport {
        target_date,
        forecasts: forecasts.len(),
        evaluated: 0,
        failed: 0,
        already_reconciled: 0,
    };
    let mut failures = Vec::new();

    let results: Vec<ItemResult> = fetcher.fetch_and_score(target_date, &forecasts, run_date).await;
    let mut scored = Vec::new();
    for result in results {
        match result {
            Ok(outcome) => scored.push(outcome),
            Err(failure) => failures.push(failure),
        }
    }

    if !scored.is_empty() {
        let attempted: Vec<Forecast> = scored.iter().map(|outcome| outcome.forecast.clone()).collect();
        let writer_store = Arc::clone(&store);
        let writes = tokio::task::spawn_blocking(move || {
            scored
                .into_iter()
                .map(|outcome| {
                    let written = writer_store.insert_evaluation(&outcome.record);
                    (outcome.forecast, written)
                })
                .collect::<Vec<_>>()
        })
        .await;

        match writes {
            Ok(writes) => {
                for (forecast, written) in writes {
                    match written {
                        Ok(InsertOutcome::Inserted) => group.evaluated += 1,
                        Ok(InsertOutcome::Conflict) => {
                            info!(forecast_id = %forecast.id, symbol = %forecast.symbol, "forecast already reconciled");
                            group.already_reconciled += 1;
                        }
                        Err(err) => {
                            error!(
                                forecast_id = %forecast.id,
                                symbol = %forecast.symbol,
                                error = %err,
                                "could not persist evaluation"
                            );
                            failures.push(FetchFailure::new(
                                &forecast,
                                FailureKind::PersistenceFailed,
                                err.to_string(),
                            ));
                        }
                    }
                }
            }
            Err(join_error) => {
                error!(error = %join_error, "evaluation writer did not complete");
                // rows written before the writer died are durable
                let ids: Vec<ForecastId> = attempted.iter().map(|forecast| forecast.id).collect();
                let landed = off_runtime(move || store.evaluated_ids(&ids))
                    .await
                    .unwrap_or_else(|err| {
                        error!(error = %err, "could not check which evaluations were written");
                        Default::default()
                    });
                for forecast in &attempted {
                    if landed.contains(&forecast.id) {
                        group.evaluated += 1;
                    } else {
                        failures.push(FetchFailure::new(
                            forecast,
                            FailureKind::PersistenceFailed,
                            join_error.to_string(),
                        ));
                    }
                }
            }
        }
    }

    group.failed = failures.len();
    if group.failed > 0 {
        warn!(failed = group.failed, evaluated = group.evaluated, "date group finished with failures");
    } else {
        info!(evaluated = group.evaluated, "date group finished");
    }
    (group, failures)
}

/// Run a blocking store call on the blocking pool.
async fn off_runtime<T, F>(work: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|join_error| {
            StoreError::Unavailable(format!("store task did not complete: {join_error}"))
        })?
}

fn abandoned_group(target_date: NaiveDate, forecasts: &[Forecast]) -> (GroupReport, Vec<FetchFailure>) {
    let failures: Vec<FetchFailure> = forecasts
        .iter()
        .map(|forecast| {
            FetchFailure::new(forecast, FailureKind::ComputationError, "date group task aborted")
        })
        .collect();
    let group = GroupReport {
        target_date,
        forecasts: forecasts.len(),
        evaluated: 0,
        failed: failures.len(),
        already_reconciled: 0,
    };
    (group, failures)
}
