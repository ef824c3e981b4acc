//! # Volgauge Warehouse
//!
//! DuckDB-based storage for issued volatility forecasts and their evaluations.
//!
//! ## Overview
//!
//! The warehouse is the only durable shared resource of the system. It keeps
//! two tables and enforces the at-most-one evaluation rule with a primary key
//! on `evaluations.forecast_id`; inserts that hit an existing key report
//! [`InsertStatus::Conflict`] instead of failing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use volgauge_warehouse::{NewForecastRecord, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!
//!     let stored = warehouse.insert_forecast(&NewForecastRecord {
//!         symbol: "AAPL".to_string(),
//!         issued_at: "2026-10-16 21:05:00".to_string(),
//!         target_date: "2026-10-19".to_string(),
//!         p: 1,
//!         q: 1,
//!         dist: "skewt".to_string(),
//!         predicted_volatility: 1.42,
//!     })?;
//!
//!     println!("stored forecast #{}", stored.id);
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `forecasts` | Issued one-step-ahead forecasts (sequence id) |
//! | `evaluations` | One row per evaluated forecast, keyed by `forecast_id` |
//! | `schema_migrations` | Applied migration versions |
//!
//! ## Views
//!
//! | View | Description |
//! |------|-------------|
//! | `v_forecast_accuracy` | Forecasts joined with their evaluation |
//!
//! Dates cross this crate's boundary as `YYYY-MM-DD` strings and timestamps
//! as `YYYY-MM-DD HH:MM:SS` (UTC) strings; typed conversion belongs to the
//! caller.

pub mod duckdb;
pub mod migrations;
pub mod views;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{params, params_from_iter, Row};
use serde::Serialize;
use thiserror::Error;

pub use duckdb::{ConnectionPool, PooledConnection};

const IN_LIST_CHUNK: usize = 512;

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A record was rejected before reaching the database.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for volgauge data.
    pub home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let home = resolve_volgauge_home();
        let db_path = env::var_os("VOLGAUGE_DB_PATH")
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(|| home.join("warehouse.duckdb"));
        Self {
            home,
            db_path,
            max_pool_size: 4,
        }
    }
}

impl WarehouseConfig {
    /// Default configuration with an explicit database file.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }
}

/// A forecast row as stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastRecord {
    pub id: i64,
    pub symbol: String,
    /// Issue timestamp, `YYYY-MM-DD HH:MM:SS` in UTC.
    pub issued_at: String,
    /// Target date, `YYYY-MM-DD`.
    pub target_date: String,
    pub p: i32,
    pub q: i32,
    pub dist: String,
    pub predicted_volatility: f64,
}

/// A forecast row awaiting an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewForecastRecord {
    pub symbol: String,
    pub issued_at: String,
    pub target_date: String,
    pub p: i32,
    pub q: i32,
    pub dist: String,
    pub predicted_volatility: f64,
}

/// An evaluation row, one per forecast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRow {
    pub forecast_id: i64,
    /// Date the evaluating run happened, `YYYY-MM-DD`.
    pub evaluation_run_date: String,
    pub realized_volatility: f64,
    pub error_raw: f64,
    pub error_abs: f64,
    /// `None` when the relative error is undefined (zero realized volatility).
    pub error_rel: Option<f64>,
    pub error_sq: f64,
}

/// A forecast joined with its evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyRow {
    pub forecast: ForecastRecord,
    pub evaluation: EvaluationRow,
}

/// Result of an insert-or-skip write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertStatus {
    Inserted,
    /// A row with the same key already existed; nothing was written.
    Conflict,
}

/// The main warehouse interface for forecast storage.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    pool: ConnectionPool,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration and apply the schema.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let pool = ConnectionPool::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, pool };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Apply migrations and (re)create views. Idempotent.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.pool.checkout()?;
        migrations::apply_migrations(&connection)?;
        views::create_views(&connection)?;
        Ok(())
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Store a new forecast and return it with its assigned id.
    pub fn insert_forecast(
        &self,
        record: &NewForecastRecord,
    ) -> Result<ForecastRecord, WarehouseError> {
        if !record.predicted_volatility.is_finite() {
            return Err(WarehouseError::InvalidRecord(format!(
                "predicted volatility for '{}' is not finite",
                record.symbol
            )));
        }

        let connection = self.pool.checkout()?;
        let id: i64 = connection.query_row(
            "INSERT INTO forecasts \
             (symbol, issued_at, target_date, p, q, dist, predicted_volatility) \
             VALUES (?, CAST(? AS TIMESTAMP), CAST(? AS DATE), ?, ?, ?, ?) \
             RETURNING id",
            params![
                record.symbol,
                record.issued_at,
                record.target_date,
                record.p,
                record.q,
                record.dist,
                record.predicted_volatility,
            ],
            |row| row.get(0),
        )?;

        Ok(ForecastRecord {
            id,
            symbol: record.symbol.clone(),
            issued_at: record.issued_at.clone(),
            target_date: record.target_date.clone(),
            p: record.p,
            q: record.q,
            dist: record.dist.clone(),
            predicted_volatility: record.predicted_volatility,
        })
    }

    /// Forecasts whose target date lies in `[from_inclusive, until_exclusive)`,
    /// ordered by target date then id.
    pub fn forecasts_in_window(
        &self,
        from_inclusive: &str,
        until_exclusive: &str,
    ) -> Result<Vec<ForecastRecord>, WarehouseError> {
        let connection = self.pool.checkout()?;
        let mut statement = connection.prepare(
            "SELECT id, symbol, strftime(issued_at, '%Y-%m-%d %H:%M:%S'), \
                    CAST(target_date AS VARCHAR), p, q, dist, predicted_volatility \
             FROM forecasts \
             WHERE target_date >= CAST(? AS DATE) AND target_date < CAST(? AS DATE) \
             ORDER BY target_date ASC, id ASC",
        )?;
        let rows = statement.query_map(params![from_inclusive, until_exclusive], |row| {
            read_forecast(row, 0)
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(WarehouseError::from)
    }

    /// The subset of `ids` that already have an evaluation row.
    pub fn evaluated_forecast_ids(&self, ids: &[i64]) -> Result<Vec<i64>, WarehouseError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let connection = self.pool.checkout()?;
        let mut evaluated = Vec::new();
        for chunk in ids.chunks(IN_LIST_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT forecast_id FROM evaluations WHERE forecast_id IN ({placeholders})"
            );
            let mut statement = connection.prepare(sql.as_str())?;
            let rows = statement.query_map(params_from_iter(chunk.iter().copied()), |row| row.get(0))?;
            for id in rows {
                evaluated.push(id?);
            }
        }

        Ok(evaluated)
    }

    /// Insert an evaluation unless the forecast already has one.
    ///
    /// The write is a single statement, so it either lands completely or not
    /// at all; a duplicate `forecast_id` yields [`InsertStatus::Conflict`].
    pub fn insert_evaluation(&self, row: &EvaluationRow) -> Result<InsertStatus, WarehouseError> {
        let finite = [row.realized_volatility, row.error_raw, row.error_abs, row.error_sq]
            .iter()
            .chain(row.error_rel.iter())
            .all(|value| value.is_finite());
        if !finite {
            return Err(WarehouseError::InvalidRecord(format!(
                "evaluation for forecast {} contains a non-finite value",
                row.forecast_id
            )));
        }

        let connection = self.pool.checkout()?;
        let changed = connection.execute(
            "INSERT INTO evaluations \
             (forecast_id, evaluation_run_date, realized_volatility, error_raw, error_abs, error_rel, error_sq) \
             VALUES (?, CAST(? AS DATE), ?, ?, ?, ?, ?) \
             ON CONFLICT DO NOTHING",
            params![
                row.forecast_id,
                row.evaluation_run_date,
                row.realized_volatility,
                row.error_raw,
                row.error_abs,
                row.error_rel,
                row.error_sq,
            ],
        )?;

        Ok(if changed == 0 {
            InsertStatus::Conflict
        } else {
            InsertStatus::Inserted
        })
    }

    /// Number of evaluation rows stored for a forecast (0 or 1).
    pub fn evaluation_count(&self, forecast_id: i64) -> Result<i64, WarehouseError> {
        let connection = self.pool.checkout()?;
        let count = connection.query_row(
            "SELECT COUNT(*) FROM evaluations WHERE forecast_id = ?",
            params![forecast_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Evaluated forecasts with a target date on or after `since`, ordered by
    /// target date, symbol and id.
    pub fn accuracy_history(&self, since: &str) -> Result<Vec<AccuracyRow>, WarehouseError> {
        let connection = self.pool.checkout()?;
        let mut statement = connection.prepare(
            "SELECT forecast_id, symbol, strftime(issued_at, '%Y-%m-%d %H:%M:%S'), \
                    CAST(target_date AS VARCHAR), p, q, dist, predicted_volatility, \
                    CAST(evaluation_run_date AS VARCHAR), realized_volatility, \
                    error_raw, error_abs, error_rel, error_sq \
             FROM v_forecast_accuracy \
             WHERE target_date >= CAST(? AS DATE) \
             ORDER BY target_date ASC, symbol ASC, forecast_id ASC",
        )?;
        let rows = statement.query_map(params![since], |row| {
            let forecast = read_forecast(row, 0)?;
            let evaluation = EvaluationRow {
                forecast_id: forecast.id,
                evaluation_run_date: row.get(8)?,
                realized_volatility: row.get(9)?,
                error_raw: row.get(10)?,
                error_abs: row.get(11)?,
                error_rel: row.get(12)?,
                error_sq: row.get(13)?,
            };
            Ok(AccuracyRow {
                forecast,
                evaluation,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(WarehouseError::from)
    }
}

fn read_forecast(row: &Row<'_>, offset: usize) -> Result<ForecastRecord, ::duckdb::Error> {
    Ok(ForecastRecord {
        id: row.get(offset)?,
        symbol: row.get(offset + 1)?,
        issued_at: row.get(offset + 2)?,
        target_date: row.get(offset + 3)?,
        p: row.get(offset + 4)?,
        q: row.get(offset + 5)?,
        dist: row.get(offset + 6)?,
        predicted_volatility: row.get(offset + 7)?,
    })
}

/// Resolve the volgauge home directory from environment or default.
fn resolve_volgauge_home() -> PathBuf {
    if let Some(path) = env::var_os("VOLGAUGE_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".volgauge");
    }

    PathBuf::from(".volgauge")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_temp(temp: &tempfile::TempDir) -> Warehouse {
        Warehouse::open(WarehouseConfig {
            home: temp.path().to_path_buf(),
            db_path: temp.path().join("cache").join("warehouse.duckdb"),
            max_pool_size: 2,
        })
        .expect("warehouse open")
    }

    fn forecast(symbol: &str, target_date: &str) -> NewForecastRecord {
        NewForecastRecord {
            symbol: symbol.to_string(),
            issued_at: "2026-10-12 20:30:00".to_string(),
            target_date: target_date.to_string(),
            p: 1,
            q: 1,
            dist: "skewt".to_string(),
            predicted_volatility: 2.0,
        }
    }

    fn evaluation(forecast_id: i64) -> EvaluationRow {
        EvaluationRow {
            forecast_id,
            evaluation_run_date: "2026-10-19".to_string(),
            realized_volatility: 2.5,
            error_raw: 0.5,
            error_abs: 0.5,
            error_rel: Some(0.2),
            error_sq: 0.25,
        }
    }

    #[test]
    fn initialize_is_idempotent() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        warehouse.initialize().expect("second initialize");
        warehouse.initialize().expect("third initialize");

        let connection = warehouse.pool.checkout().expect("connection");
        let applied: i64 = connection
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .expect("count");
        assert_eq!(applied as usize, migrations::known_versions().count());
    }

    #[test]
    fn assigns_increasing_ids_to_forecasts() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);

        let first = warehouse
            .insert_forecast(&forecast("AAPL", "2026-10-13"))
            .expect("first");
        let second = warehouse
            .insert_forecast(&forecast("MSFT", "2026-10-13"))
            .expect("second");

        assert!(second.id > first.id);
    }

    #[test]
    fn window_is_half_open_on_target_date() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);
        for date in ["2026-10-11", "2026-10-12", "2026-10-18", "2026-10-19"] {
            warehouse
                .insert_forecast(&forecast("AAPL", date))
                .expect("insert");
        }

        let rows = warehouse
            .forecasts_in_window("2026-10-12", "2026-10-19")
            .expect("window");

        let dates: Vec<&str> = rows.iter().map(|row| row.target_date.as_str()).collect();
        assert_eq!(dates, vec!["2026-10-12", "2026-10-18"]);
        assert_eq!(rows[0].issued_at, "2026-10-12 20:30:00");
    }

    #[test]
    fn duplicate_evaluation_reports_conflict() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);
        let stored = warehouse
            .insert_forecast(&forecast("AAPL", "2026-10-16"))
            .expect("insert forecast");

        let first = warehouse
            .insert_evaluation(&evaluation(stored.id))
            .expect("first insert");
        let second = warehouse
            .insert_evaluation(&evaluation(stored.id))
            .expect("second insert must not fail");

        assert_eq!(first, InsertStatus::Inserted);
        assert_eq!(second, InsertStatus::Conflict);
        assert_eq!(warehouse.evaluation_count(stored.id).expect("count"), 1);
    }

    #[test]
    fn rejects_non_finite_evaluation_values() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);
        let stored = warehouse
            .insert_forecast(&forecast("AAPL", "2026-10-16"))
            .expect("insert forecast");

        let mut row = evaluation(stored.id);
        row.error_sq = f64::NAN;

        let error = warehouse.insert_evaluation(&row).expect_err("must reject");
        assert!(matches!(error, WarehouseError::InvalidRecord(_)));
        assert_eq!(warehouse.evaluation_count(stored.id).expect("count"), 0);
    }

    #[test]
    fn accuracy_history_preserves_undefined_relative_error() {
        let temp = tempdir().expect("tempdir");
        let warehouse = open_temp(&temp);
        let stored = warehouse
            .insert_forecast(&forecast("NVDA", "2026-10-16"))
            .expect("insert forecast");
        let mut row = evaluation(stored.id);
        row.error_rel = None;
        warehouse.insert_evaluation(&row).expect("insert");

        let history = warehouse.accuracy_history("2026-10-01").expect("history");

        assert_eq!(history.len(), 1);
        assert_eq!(history[0].forecast.symbol, "NVDA");
        assert_eq!(history[0].evaluation.error_rel, None);
        assert_eq!(history[0].evaluation.evaluation_run_date, "2026-10-19");
    }
}
