mod evaluate;
mod horizon;
mod pending;
mod report;
mod schema;

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use volgauge_core::{
    EngineConfig, MarketDataProvider, ReqwestHttpClient, Warehouse, WarehouseConfig,
    YahooChartAdapter,
};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub struct CommandResult {
    pub command: &'static str,
    pub data: Value,
    pub elapsed_ms: u64,
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let started = Instant::now();

    let (command, data) = match &cli.command {
        Command::Evaluate(args) => ("evaluate", evaluate::run(args, cli).await?),
        Command::Pending(args) => ("pending", pending::run(args, cli).await?),
        Command::Report(args) => ("report", report::run(args, cli).await?),
        Command::Horizon(args) => ("horizon", horizon::run(args).await?),
        Command::Schema => ("schema", schema::run(cli)?),
    };

    Ok(CommandResult {
        command,
        data,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    })
}

fn open_warehouse(cli: &Cli) -> Result<Warehouse, CliError> {
    let config = match &cli.db_path {
        Some(path) => WarehouseConfig::with_db_path(path.clone()),
        None => WarehouseConfig::default(),
    };
    Ok(Warehouse::open(config)?)
}

fn engine_config() -> Result<EngineConfig, CliError> {
    Ok(EngineConfig::from_env()?)
}

fn yahoo_provider(config: &EngineConfig) -> Arc<dyn MarketDataProvider> {
    Arc::new(
        YahooChartAdapter::new(Arc::new(ReqwestHttpClient::new()))
            .with_retry_policy(config.retry_policy()),
    )
}
