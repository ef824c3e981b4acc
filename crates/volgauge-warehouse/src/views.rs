//! Database views for analytical reads.

use ::duckdb::Connection;

/// Create database views used by history and accuracy reads.
///
/// Creates `v_forecast_accuracy`: every evaluated forecast joined with its
/// outcome.
///
/// # Errors
/// Returns an error if the view creation SQL fails to execute.
pub fn create_views(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r"
CREATE OR REPLACE VIEW v_forecast_accuracy AS
SELECT
    f.id AS forecast_id,
    f.symbol,
    f.issued_at,
    f.target_date,
    f.p,
    f.q,
    f.dist,
    f.predicted_volatility,
    e.evaluation_run_date,
    e.realized_volatility,
    e.error_raw,
    e.error_abs,
    e.error_rel,
    e.error_sq
FROM forecasts f
JOIN evaluations e ON e.forecast_id = f.id;

",
    )?;

    Ok(())
}
