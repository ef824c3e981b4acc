use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Symbol, ValidationError};

/// One daily observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub close: f64,
}

impl DailyBar {
    pub const fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Daily closes for one instrument, strictly ascending by date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    symbol: Symbol,
    bars: Vec<DailyBar>,
}

impl BarSeries {
    pub fn new(symbol: Symbol, bars: Vec<DailyBar>) -> Result<Self, ValidationError> {
        for bar in &bars {
            if !bar.close.is_finite() || bar.close <= 0.0 {
                return Err(ValidationError::InvalidClose { date: bar.date });
            }
        }

        if let Some(pair) = bars.windows(2).find(|pair| pair[1].date <= pair[0].date) {
            return Err(ValidationError::UnorderedBars {
                previous: pair[0].date,
                next: pair[1].date,
            });
        }

        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|bar| bar.date)
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|bar| bar.close)
    }
}

/// One intraday observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntradayBar {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

/// Intraday closes for one instrument over a date range, ordered by time.
///
/// Prices are not validated here; scoring reports bad values per instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntradaySeries {
    pub symbol: Symbol,
    pub bars: Vec<IntradayBar>,
}

impl IntradaySeries {
    pub fn new(symbol: Symbol, mut bars: Vec<IntradayBar>) -> Self {
        bars.sort_by_key(|bar| bar.timestamp);
        bars.dedup_by_key(|bar| bar.timestamp);
        Self { symbol, bars }
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Closes whose UTC date falls in `[start, end)`.
    pub fn closes_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<f64> {
        self.bars
            .iter()
            .filter(|bar| {
                let date = bar.timestamp.date_naive();
                date >= start && date < end
            })
            .map(|bar| bar.close)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).expect("valid date")
    }

    #[test]
    fn rejects_duplicate_dates() {
        let symbol = Symbol::parse("AAPL").expect("symbol");
        let err = BarSeries::new(
            symbol,
            vec![DailyBar::new(date(15), 10.0), DailyBar::new(date(15), 11.0)],
        )
        .expect_err("must fail");

        assert!(matches!(err, ValidationError::UnorderedBars { .. }));
    }

    #[test]
    fn rejects_non_positive_close() {
        let symbol = Symbol::parse("AAPL").expect("symbol");
        let err = BarSeries::new(symbol, vec![DailyBar::new(date(15), 0.0)]).expect_err("must fail");

        assert_eq!(err, ValidationError::InvalidClose { date: date(15) });
    }

    #[test]
    fn intraday_window_uses_utc_dates() {
        let symbol = Symbol::parse("AAPL").expect("symbol");
        let at = |day, hour| {
            Utc.with_ymd_and_hms(2026, 10, day, hour, 0, 0)
                .single()
                .expect("valid timestamp")
        };
        let series = IntradaySeries::new(
            symbol,
            vec![
                IntradayBar { timestamp: at(16, 14), close: 2.0 },
                IntradayBar { timestamp: at(15, 23), close: 1.0 },
                IntradayBar { timestamp: at(17, 0), close: 3.0 },
            ],
        );

        assert_eq!(series.closes_between(date(16), date(17)), vec![2.0]);
        assert_eq!(series.bars[0].close, 1.0);
    }
}
