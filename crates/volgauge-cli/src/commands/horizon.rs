use serde::Serialize;
use volgauge_core::{
    next_target_date, resolve, AssetClassification, CompletenessDecision, Symbol, SystemClock,
};

use crate::cli::HorizonArgs;
use crate::error::CliError;

use super::{engine_config, yahoo_provider};

const HORIZON_HISTORY_DAYS: u32 = 30;

#[derive(Debug, Serialize)]
struct HorizonResponseData {
    symbol: Symbol,
    classification: AssetClassification,
    decision: CompletenessDecision,
    next_target_date: chrono::NaiveDate,
}

pub async fn run(args: &HorizonArgs) -> Result<serde_json::Value, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let config = engine_config()?;
    let provider = yahoo_provider(&config);
    let history = config
        .retry_policy()
        .run("daily_history", || {
            provider.daily_history(&symbol, HORIZON_HISTORY_DAYS)
        })
        .await?;

    let classification = history.profile.classification;
    let decision = resolve(
        &history.series,
        &classification,
        &history.profile.timezone,
        &SystemClock,
    )?;
    let next_target_date = next_target_date(decision.effective_last_date, &classification);

    Ok(serde_json::to_value(HorizonResponseData {
        symbol,
        classification,
        decision,
        next_target_date,
    })?)
}
