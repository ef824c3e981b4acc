use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Symbol, ValidationError};

/// Store-assigned forecast identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForecastId(pub i64);

impl Display for ForecastId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Innovation distribution family of the volatility model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    Normal,
    #[serde(rename = "t")]
    StudentT,
    SkewT,
    Ged,
}

impl Distribution {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::StudentT => "t",
            Self::SkewT => "skewt",
            Self::Ged => "ged",
        }
    }
}

impl Display for Distribution {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Distribution {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "t" | "studentst" => Ok(Self::StudentT),
            "skewt" | "skewstudent" => Ok(Self::SkewT),
            "ged" => Ok(Self::Ged),
            _ => Err(ValidationError::InvalidDistribution {
                value: value.to_string(),
            }),
        }
    }
}

/// Order and distribution of the model that produced a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelConfig {
    pub p: u32,
    pub q: u32,
    pub distribution: Distribution,
}

impl ModelConfig {
    pub fn new(p: u32, q: u32, distribution: Distribution) -> Result<Self, ValidationError> {
        if p < 1 {
            return Err(ValidationError::InvalidModelOrder {
                field: "p",
                min: 1,
                value: p,
            });
        }
        Ok(Self { p, q, distribution })
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            p: 1,
            q: 1,
            distribution: Distribution::SkewT,
        }
    }
}

impl Display for ModelConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})-{}", self.p, self.q, self.distribution)
    }
}

/// An issued one-step-ahead forecast. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub id: ForecastId,
    pub symbol: Symbol,
    pub issued_at: DateTime<Utc>,
    pub target_date: NaiveDate,
    pub model: ModelConfig,
    /// Predicted daily volatility in percent.
    pub predicted_volatility: f64,
}

/// A forecast before the store assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewForecast {
    pub symbol: Symbol,
    pub issued_at: DateTime<Utc>,
    pub target_date: NaiveDate,
    pub model: ModelConfig,
    pub predicted_volatility: f64,
}

impl NewForecast {
    pub fn into_forecast(self, id: ForecastId) -> Forecast {
        Forecast {
            id,
            symbol: self.symbol,
            issued_at: self.issued_at,
            target_date: self.target_date,
            model: self.model,
            predicted_volatility: self.predicted_volatility,
        }
    }
}

/// Outcome recorded exactly once per forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub forecast_id: ForecastId,
    pub evaluation_run_date: NaiveDate,
    pub realized_volatility: f64,
    pub error_raw: f64,
    pub error_abs: f64,
    /// `None` when the relative error is undefined for a zero-volatility day.
    pub error_rel: Option<f64>,
    pub error_sq: f64,
}

/// A forecast paired with its evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluatedForecast {
    pub forecast: Forecast,
    pub evaluation: EvaluationRecord,
}
