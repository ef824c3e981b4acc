//! Market data provider contract.
//!
//! | Operation | Response | Used by |
//! |-----------|----------|---------|
//! | [`MarketDataProvider::daily_history`] | [`DailyHistory`] | forecast issuance, `horizon` |
//! | [`MarketDataProvider::intraday`] | [`IntradayBatch`] | realized-outcome fetcher |

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{AssetClassification, BarSeries, IntradaySeries, Symbol, ValidationError};

/// Bar interval for intraday requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum IntradayInterval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "2m")]
    TwoMinutes,
    #[default]
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "60m")]
    SixtyMinutes,
}

impl IntradayInterval {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::TwoMinutes => "2m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::SixtyMinutes => "60m",
        }
    }
}

impl Display for IntradayInterval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntradayInterval {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1m" => Ok(Self::OneMinute),
            "2m" => Ok(Self::TwoMinutes),
            "5m" => Ok(Self::FiveMinutes),
            "15m" => Ok(Self::FifteenMinutes),
            "30m" => Ok(Self::ThirtyMinutes),
            "60m" | "1h" => Ok(Self::SixtyMinutes),
            _ => Err(ValidationError::InvalidInterval {
                value: value.to_string(),
            }),
        }
    }
}

/// Provider-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Unavailable,
    RateLimited,
    /// The request succeeded but carried no data at all.
    EmptyResult,
    InvalidRequest,
    Timeout,
    Internal,
}

/// Structured provider error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
    retryable: bool,
}

impl ProviderError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn empty_result(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::EmptyResult,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Timeout,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            ProviderErrorKind::Unavailable => "provider.unavailable",
            ProviderErrorKind::RateLimited => "provider.rate_limited",
            ProviderErrorKind::EmptyResult => "provider.empty_result",
            ProviderErrorKind::InvalidRequest => "provider.invalid_request",
            ProviderErrorKind::Timeout => "provider.timeout",
            ProviderErrorKind::Internal => "provider.internal",
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for ProviderError {}

/// What the provider reports about an instrument alongside its bars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstrumentProfile {
    pub classification: AssetClassification,
    /// IANA name of the listing exchange's timezone.
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyHistory {
    pub profile: InstrumentProfile,
    pub series: BarSeries,
}

/// Intraday series for the instruments of one request. Instruments the
/// provider had nothing for are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntradayBatch {
    series: BTreeMap<Symbol, IntradaySeries>,
}

impl IntradayBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a series; empty series are not recorded.
    pub fn insert(&mut self, series: IntradaySeries) {
        if !series.is_empty() {
            self.series.insert(series.symbol.clone(), series);
        }
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&IntradaySeries> {
        self.series.get(symbol)
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }
}

impl FromIterator<IntradaySeries> for IntradayBatch {
    fn from_iter<I: IntoIterator<Item = IntradaySeries>>(iter: I) -> Self {
        let mut batch = Self::new();
        for series in iter {
            batch.insert(series);
        }
        batch
    }
}

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Source of daily and intraday market data.
pub trait MarketDataProvider: Send + Sync {
    /// Daily closes covering roughly the last `lookback_days` calendar days,
    /// dated in the instrument's exchange timezone.
    fn daily_history<'a>(
        &'a self,
        symbol: &'a Symbol,
        lookback_days: u32,
    ) -> ProviderFuture<'a, DailyHistory>;

    /// Intraday bars for every symbol over `[start, end)` (UTC dates).
    ///
    /// Returns an [`ProviderErrorKind::EmptyResult`] error when no symbol had
    /// any data.
    fn intraday<'a>(
        &'a self,
        symbols: &'a [Symbol],
        start: NaiveDate,
        end: NaiveDate,
        interval: IntradayInterval,
    ) -> ProviderFuture<'a, IntradayBatch>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_parses_hour_alias() {
        assert_eq!("1h".parse::<IntradayInterval>(), Ok(IntradayInterval::SixtyMinutes));
        assert!("3m".parse::<IntradayInterval>().is_err());
    }

    #[test]
    fn batch_skips_empty_series() {
        let symbol = Symbol::parse("AAPL").expect("symbol");
        let batch: IntradayBatch = [IntradaySeries::new(symbol.clone(), Vec::new())]
            .into_iter()
            .collect();

        assert!(batch.is_empty());
        assert!(batch.get(&symbol).is_none());
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ProviderError::empty_result("x").code(), "provider.empty_result");
        assert!(ProviderError::timeout("x").retryable());
        assert!(!ProviderError::invalid_request("x").retryable());
    }
}
