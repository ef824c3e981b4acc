use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;
use volgauge_core::{summarize, AccuracySummary, ForecastStore};

use crate::cli::{Cli, ReportArgs};
use crate::error::CliError;

use super::open_warehouse;

#[derive(Debug, Serialize)]
struct ReportResponseData {
    since: NaiveDate,
    summary: AccuracySummary,
}

pub async fn run(args: &ReportArgs, cli: &Cli) -> Result<serde_json::Value, CliError> {
    let today = Utc::now().date_naive();
    let since = today
        .checked_sub_days(Days::new(u64::from(args.since_days)))
        .unwrap_or(NaiveDate::MIN);

    let warehouse = open_warehouse(cli)?;
    warehouse.ensure_schema()?;
    let rows = warehouse.evaluation_history(since)?;

    Ok(serde_json::to_value(ReportResponseData {
        since,
        summary: summarize(&rows, args.worst),
    })?)
}
