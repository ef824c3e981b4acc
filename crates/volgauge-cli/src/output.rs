use serde::Serialize;
use serde_json::Value;

use crate::commands::CommandResult;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct Output<'a> {
    command: &'a str,
    elapsed_ms: u64,
    data: &'a Value,
}

pub fn render(result: &CommandResult, pretty: bool) -> Result<(), CliError> {
    let output = Output {
        command: result.command,
        elapsed_ms: result.elapsed_ms,
        data: &result.data,
    };
    let payload = if pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{payload}");
    Ok(())
}
