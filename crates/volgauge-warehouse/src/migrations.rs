use ::duckdb::{params, Connection};

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_forecasts",
        sql: r#"
CREATE SEQUENCE IF NOT EXISTS forecast_id_seq START 1;

CREATE TABLE IF NOT EXISTS forecasts (
    id BIGINT PRIMARY KEY DEFAULT nextval('forecast_id_seq'),
    symbol TEXT NOT NULL,
    issued_at TIMESTAMP NOT NULL,
    target_date DATE NOT NULL,
    p INTEGER NOT NULL,
    q INTEGER NOT NULL,
    dist TEXT NOT NULL,
    predicted_volatility DOUBLE NOT NULL
);
"#,
    },
    Migration {
        version: "0002_evaluations",
        sql: r#"
CREATE TABLE IF NOT EXISTS evaluations (
    forecast_id BIGINT PRIMARY KEY REFERENCES forecasts(id),
    evaluation_run_date DATE NOT NULL,
    realized_volatility DOUBLE NOT NULL,
    error_raw DOUBLE NOT NULL,
    error_abs DOUBLE NOT NULL,
    error_rel DOUBLE,
    error_sq DOUBLE NOT NULL,
    recorded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    },
    Migration {
        version: "0003_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_forecasts_target_date ON forecasts(target_date);
CREATE INDEX IF NOT EXISTS idx_forecasts_symbol ON forecasts(symbol);
"#,
    },
];

/// Apply every migration not yet recorded in `schema_migrations`.
///
/// Safe to call on every start; already-applied versions are skipped.
pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params![migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                params![migration.version],
            )?;
        }
    }

    Ok(())
}

/// Versions of every migration this build knows about, in apply order.
pub fn known_versions() -> impl Iterator<Item = &'static str> {
    MIGRATIONS.iter().map(|migration| migration.version)
}
