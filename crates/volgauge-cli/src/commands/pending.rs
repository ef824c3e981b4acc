use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use volgauge_core::{Forecast, ForecastStore, MissingEvaluationScanner, SystemClock};

use crate::cli::{Cli, PendingArgs};
use crate::error::CliError;

use super::{engine_config, open_warehouse};

#[derive(Debug, Serialize)]
struct PendingGroup {
    target_date: NaiveDate,
    forecasts: Vec<Forecast>,
}

#[derive(Debug, Serialize)]
struct PendingResponseData {
    lookback_days: u32,
    total: usize,
    groups: Vec<PendingGroup>,
}

pub async fn run(args: &PendingArgs, cli: &Cli) -> Result<serde_json::Value, CliError> {
    let lookback_days = match args.lookback_days {
        Some(days) => days,
        None => engine_config()?.lookback_days,
    };

    let warehouse = open_warehouse(cli)?;
    warehouse.ensure_schema()?;
    let scanner = MissingEvaluationScanner::new(Arc::new(warehouse), Arc::new(SystemClock));
    let pending = scanner.find_pending(lookback_days)?;

    let groups: Vec<PendingGroup> = pending
        .into_iter()
        .map(|(target_date, forecasts)| PendingGroup {
            target_date,
            forecasts,
        })
        .collect();
    let total = groups.iter().map(|group| group.forecasts.len()).sum();

    Ok(serde_json::to_value(PendingResponseData {
        lookback_days,
        total,
        groups,
    })?)
}
