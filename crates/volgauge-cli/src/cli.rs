//! CLI argument definitions for volgauge.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `evaluate` | Record evaluations for every forecast whose target date has passed |
//! | `pending` | List forecasts still waiting for an evaluation |
//! | `report` | Summarize recorded forecast accuracy |
//! | `horizon` | Show the completeness decision and next target date for a symbol |
//! | `schema` | Create the database schema if missing |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--db-path` | `$VOLGAUGE_DB_PATH` | DuckDB database file |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! # Nightly reconciliation
//! volgauge evaluate --lookback-days 7
//!
//! # Accuracy over the last month, ten worst instruments
//! volgauge report --since-days 30 --worst 10 --pretty
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "volgauge",
    author,
    version,
    about = "Volatility forecast horizon rules and evaluation reconciliation"
)]
pub struct Cli {
    /// DuckDB database file. Defaults to `<VOLGAUGE_HOME>/warehouse.duckdb`.
    #[arg(long, global = true, env = "VOLGAUGE_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Evaluate every due forecast that has no evaluation yet.
    Evaluate(EvaluateArgs),
    /// List due forecasts without an evaluation, grouped by target date.
    Pending(PendingArgs),
    /// Summarize forecast accuracy.
    Report(ReportArgs),
    /// Resolve the last final bar and the next target date for a symbol.
    Horizon(HorizonArgs),
    /// Create tables and views if missing.
    Schema,
}

#[derive(Debug, Clone, Args)]
pub struct EvaluateArgs {
    /// Days before today to scan for due forecasts.
    #[arg(long)]
    pub lookback_days: Option<u32>,

    /// Date groups processed in parallel.
    #[arg(long)]
    pub concurrency: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct PendingArgs {
    #[arg(long)]
    pub lookback_days: Option<u32>,
}

#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    /// Include target dates from this many days ago onwards.
    #[arg(long, default_value_t = 30)]
    pub since_days: u32,

    /// Number of worst instruments to list.
    #[arg(long, default_value_t = volgauge_core::accuracy::DEFAULT_WORST_LIMIT)]
    pub worst: usize,
}

#[derive(Debug, Clone, Args)]
pub struct HorizonArgs {
    /// Instrument ticker, e.g. AAPL or 7203.T.
    pub symbol: String,
}
