use serde::Serialize;
use volgauge_core::ForecastStore;

use crate::cli::Cli;
use crate::error::CliError;

use super::open_warehouse;

#[derive(Debug, Serialize)]
struct SchemaResponseData {
    db_path: String,
    ready: bool,
}

pub fn run(cli: &Cli) -> Result<serde_json::Value, CliError> {
    let warehouse = open_warehouse(cli)?;
    warehouse.ensure_schema()?;

    Ok(serde_json::to_value(SchemaResponseData {
        db_path: warehouse.db_path().display().to_string(),
        ready: true,
    })?)
}
