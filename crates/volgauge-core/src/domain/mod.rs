//! # Domain Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated instrument ticker |
//! | [`AssetClassification`] | Asset tag that selects the market rule |
//! | [`BarSeries`] | Ascending daily closes for one instrument |
//! | [`IntradaySeries`] | Intraday closes used to measure realized volatility |
//! | [`Forecast`] | An issued forecast with its model configuration |
//! | [`EvaluationRecord`] | The single recorded outcome of a forecast |
//!
//! Constructors validate their invariants and return [`crate::ValidationError`].

mod bars;
mod classification;
mod forecast;
mod symbol;

pub use bars::{BarSeries, DailyBar, IntradayBar, IntradaySeries};
pub use classification::AssetClassification;
pub use forecast::{
    Distribution, EvaluatedForecast, EvaluationRecord, Forecast, ForecastId, ModelConfig,
    NewForecast,
};
pub use symbol::Symbol;
