use std::sync::Arc;

use tracing::info;
use volgauge_core::{ReconciliationDriver, SystemClock};

use crate::cli::{Cli, EvaluateArgs};
use crate::error::CliError;

use super::{engine_config, open_warehouse, yahoo_provider};

pub async fn run(args: &EvaluateArgs, cli: &Cli) -> Result<serde_json::Value, CliError> {
    let mut config = engine_config()?;
    if let Some(lookback_days) = args.lookback_days {
        config.lookback_days = lookback_days;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }

    let warehouse = open_warehouse(cli)?;
    info!(
        db_path = %warehouse.db_path().display(),
        lookback_days = config.lookback_days,
        concurrency = config.concurrency,
        "starting reconciliation"
    );
    let driver = ReconciliationDriver::new(
        Arc::new(warehouse),
        yahoo_provider(&config),
        Arc::new(SystemClock),
        config,
    )?;
    let report = driver.run_default().await?;

    Ok(serde_json::to_value(report)?)
}
