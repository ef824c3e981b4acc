//! Engine configuration.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `VOLGAUGE_LOOKBACK_DAYS` | `7` | How far back the scanner looks for due forecasts |
//! | `VOLGAUGE_CONCURRENCY` | `4` | Date groups processed in parallel |
//! | `VOLGAUGE_FETCH_TIMEOUT_MS` | `15000` | Bound on one chart request; a batch attempt gets this per symbol |
//! | `VOLGAUGE_FETCH_RETRIES` | `2` | Retries after a transient fetch failure |
//! | `VOLGAUGE_ZERO_VOL_POLICY` | `zero` | Relative error on zero realized volatility (`zero` or `undefined`) |
//! | `VOLGAUGE_INTRADAY_INTERVAL` | `5m` | Bar interval used to measure realized volatility |
//!
//! The database location is configured separately through
//! [`volgauge_warehouse::WarehouseConfig`].

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::metrics::ZeroVolatilityPolicy;
use crate::provider::IntradayInterval;
use crate::retry::{Backoff, RetryPolicy};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineConfig {
    pub lookback_days: u32,
    pub concurrency: usize,
    pub fetch_timeout: Duration,
    pub fetch_retries: u32,
    pub zero_volatility_policy: ZeroVolatilityPolicy,
    pub intraday_interval: IntradayInterval,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            concurrency: 4,
            fetch_timeout: Duration::from_millis(15_000),
            fetch_retries: 2,
            zero_volatility_policy: ZeroVolatilityPolicy::Zero,
            intraday_interval: IntradayInterval::FiveMinutes,
        }
    }
}

impl EngineConfig {
    /// Read the process environment on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or blank keys keep their
    /// default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &'static str| lookup(key).filter(|value| !value.trim().is_empty());

        let config = Self {
            lookback_days: parse_or(read("VOLGAUGE_LOOKBACK_DAYS"), "VOLGAUGE_LOOKBACK_DAYS", defaults.lookback_days)?,
            concurrency: parse_or(read("VOLGAUGE_CONCURRENCY"), "VOLGAUGE_CONCURRENCY", defaults.concurrency)?
                .max(1),
            fetch_timeout: Duration::from_millis(parse_or(
                read("VOLGAUGE_FETCH_TIMEOUT_MS"),
                "VOLGAUGE_FETCH_TIMEOUT_MS",
                15_000_u64,
            )?),
            fetch_retries: parse_or(read("VOLGAUGE_FETCH_RETRIES"), "VOLGAUGE_FETCH_RETRIES", defaults.fetch_retries)?,
            zero_volatility_policy: parse_or(
                read("VOLGAUGE_ZERO_VOL_POLICY"),
                "VOLGAUGE_ZERO_VOL_POLICY",
                defaults.zero_volatility_policy,
            )?,
            intraday_interval: parse_or(
                read("VOLGAUGE_INTRADAY_INTERVAL"),
                "VOLGAUGE_INTRADAY_INTERVAL",
                defaults.intraday_interval,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "VOLGAUGE_CONCURRENCY",
                value: self.concurrency.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: "VOLGAUGE_FETCH_TIMEOUT_MS",
                value: self.fetch_timeout.as_millis().to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.fetch_retries,
            backoff: Backoff::default(),
            attempt_timeout: self.fetch_timeout,
        }
    }
}

fn parse_or<T>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|error: T::Err| ConfigError::Invalid {
            key,
            value,
            reason: error.to_string(),
        }),
    }
}
