//! Realized volatility and forecast error metrics.
//!
//! Returns are percent log returns (`100 * ln(p_t / p_{t-1})`), the same unit
//! the forecasts are issued in.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MetricError {
    #[error("no returns could be computed from {observations} observation(s)")]
    EmptyReturns { observations: usize },
    #[error("price at position {index} is not finite and positive: {value}")]
    InvalidPrice { index: usize, value: f64 },
    #[error("predicted volatility is not finite: {0}")]
    InvalidPrediction(f64),
}

/// How to report relative error when realized volatility is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroVolatilityPolicy {
    /// Record `0.0`.
    #[default]
    Zero,
    /// Record no relative error.
    Undefined,
}

impl FromStr for ZeroVolatilityPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "zero" => Ok(Self::Zero),
            "undefined" | "null" => Ok(Self::Undefined),
            other => Err(format!("expected 'zero' or 'undefined', got '{other}'")),
        }
    }
}

/// Percent log returns between consecutive prices.
pub fn percent_log_returns(prices: &[f64]) -> Result<Vec<f64>, MetricError> {
    if let Some((index, value)) = prices
        .iter()
        .enumerate()
        .find(|(_, price)| !price.is_finite() || **price <= 0.0)
    {
        return Err(MetricError::InvalidPrice {
            index,
            value: *value,
        });
    }

    Ok(prices
        .windows(2)
        .map(|pair| 100.0 * (pair[1] / pair[0]).ln())
        .collect())
}

/// Square root of the summed squared returns.
pub fn realized_volatility(returns: &[f64]) -> f64 {
    returns.iter().map(|value| value * value).sum::<f64>().sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorMetrics {
    pub error_raw: f64,
    pub error_abs: f64,
    pub error_rel: Option<f64>,
    pub error_sq: f64,
}

impl ErrorMetrics {
    pub fn compute(predicted: f64, realized: f64, policy: ZeroVolatilityPolicy) -> Self {
        let error_raw = realized - predicted;
        let error_abs = error_raw.abs();
        let error_rel = if realized != 0.0 {
            Some(error_abs / realized)
        } else {
            match policy {
                ZeroVolatilityPolicy::Zero => Some(0.0),
                ZeroVolatilityPolicy::Undefined => None,
            }
        };

        Self {
            error_raw,
            error_abs,
            error_rel,
            error_sq: error_abs * error_abs,
        }
    }
}

/// Realized volatility and errors for one instrument-day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Score {
    pub realized_volatility: f64,
    pub metrics: ErrorMetrics,
}

/// Score a prediction against the intraday prices of its target day.
pub fn score(
    prices: &[f64],
    predicted: f64,
    policy: ZeroVolatilityPolicy,
) -> Result<Score, MetricError> {
    if !predicted.is_finite() {
        return Err(MetricError::InvalidPrediction(predicted));
    }

    let returns = percent_log_returns(prices)?;
    if returns.is_empty() {
        return Err(MetricError::EmptyReturns {
            observations: prices.len(),
        });
    }

    let realized_volatility = realized_volatility(&returns);
    Ok(Score {
        realized_volatility,
        metrics: ErrorMetrics::compute(predicted, realized_volatility, policy),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-12
    }

    #[test]
    fn error_metrics_for_under_prediction() {
        let metrics = ErrorMetrics::compute(2.0, 2.5, ZeroVolatilityPolicy::Zero);

        assert!(close(metrics.error_raw, 0.5));
        assert!(close(metrics.error_abs, 0.5));
        assert!(close(metrics.error_rel.expect("defined"), 0.2));
        assert!(close(metrics.error_sq, 0.25));
    }

    #[test]
    fn zero_realized_volatility_follows_policy() {
        let zero = ErrorMetrics::compute(1.3, 0.0, ZeroVolatilityPolicy::Zero);
        let undefined = ErrorMetrics::compute(1.3, 0.0, ZeroVolatilityPolicy::Undefined);

        assert_eq!(zero.error_rel, Some(0.0));
        assert_eq!(undefined.error_rel, None);
        assert!(close(undefined.error_abs, 1.3));
    }

    #[test]
    fn realized_volatility_of_flat_prices_is_zero() {
        let scored = score(&[10.0, 10.0, 10.0], 1.0, ZeroVolatilityPolicy::Zero).expect("score");
        assert_eq!(scored.realized_volatility, 0.0);
    }

    #[test]
    fn realized_volatility_sums_squared_percent_returns() {
        let prices = [100.0, 101.0, 100.0];
        let scored = score(&prices, 1.0, ZeroVolatilityPolicy::Zero).expect("score");

        let up = 100.0 * (101.0_f64 / 100.0).ln();
        let down = 100.0 * (100.0_f64 / 101.0).ln();
        assert!(close(scored.realized_volatility, (up * up + down * down).sqrt()));
    }

    #[test]
    fn single_price_has_no_returns() {
        let err = score(&[10.0], 1.0, ZeroVolatilityPolicy::Zero).expect_err("must fail");
        assert_eq!(err, MetricError::EmptyReturns { observations: 1 });
    }

    #[test]
    fn non_positive_price_is_rejected() {
        let err = percent_log_returns(&[10.0, 0.0, 11.0]).expect_err("must fail");
        assert!(matches!(err, MetricError::InvalidPrice { index: 1, .. }));
    }
}
