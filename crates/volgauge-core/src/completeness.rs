//! Decides whether the newest daily bar of a series is final.
//!
//! A provider queried during trading hours reports the last traded price as
//! today's close. Such a bar is provisional until the session closes in the
//! instrument's market timezone, and must not be fed to the model.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::clock::Clock;
use crate::market_rules::{session_policy, SessionClose};
use crate::{AssetClassification, BarSeries, DailyBar, Symbol};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("series for '{symbol}' has no bars")]
    EmptySeries { symbol: Symbol },
    #[error("series for '{symbol}' has no final bar (only bar {date} is provisional)")]
    NoFinalBars { symbol: Symbol, date: NaiveDate },
}

/// Completeness verdict for one series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletenessDecision {
    /// Whether the final portion ends on a final bar. Always true for a
    /// resolved decision; a provisional bar is dropped rather than kept.
    pub is_final: bool,
    /// Whether the supplied last bar was provisional and dropped.
    pub dropped_provisional: bool,
    /// Date of the last bar of the final portion.
    pub effective_last_date: NaiveDate,
    /// Number of leading bars that are final.
    pub final_len: usize,
    /// Timezone the cutoff was evaluated in.
    pub timezone: String,
    pub cutoff: SessionClose,
    pub used_fallback_rule: bool,
    pub used_fallback_timezone: bool,
}

impl CompletenessDecision {
    /// The final portion of the series this decision was made for.
    pub fn final_bars<'a>(&self, series: &'a BarSeries) -> &'a [DailyBar] {
        let bars = series.bars();
        &bars[..self.final_len.min(bars.len())]
    }
}

/// Resolve the final portion of `series` against the clock's current time.
pub fn resolve(
    series: &BarSeries,
    classification: &AssetClassification,
    instrument_timezone: &str,
    clock: &dyn Clock,
) -> Result<CompletenessDecision, ResolveError> {
    let Some(last_date) = series.last_date() else {
        return Err(ResolveError::EmptySeries {
            symbol: series.symbol().clone(),
        });
    };

    let policy = session_policy(classification, instrument_timezone);
    let now_local = clock.now().with_timezone(&policy.timezone);
    let provisional =
        last_date == now_local.date_naive() && now_local.time() < policy.close.as_time();

    let final_len = if provisional {
        debug!(
            symbol = %series.symbol(),
            date = %last_date,
            classification = %classification,
            timezone = policy.timezone.name(),
            local_time = %now_local.format("%H:%M"),
            cutoff = %policy.close.as_time().format("%H:%M"),
            "dropping unfinished session bar"
        );
        series.len() - 1
    } else {
        series.len()
    };

    let effective_last_date = match final_len.checked_sub(1) {
        Some(index) => series.bars()[index].date,
        None => {
            return Err(ResolveError::NoFinalBars {
                symbol: series.symbol().clone(),
                date: last_date,
            })
        }
    };

    Ok(CompletenessDecision {
        is_final: true,
        dropped_provisional: provisional,
        effective_last_date,
        final_len,
        timezone: policy.timezone.name().to_string(),
        cutoff: policy.close,
        used_fallback_rule: policy.used_fallback_rule,
        used_fallback_timezone: policy.used_fallback_timezone,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::clock::FixedClock;

    fn series(dates: &[u32]) -> BarSeries {
        let bars = dates
            .iter()
            .map(|day| {
                DailyBar::new(
                    NaiveDate::from_ymd_opt(2026, 10, *day).expect("valid date"),
                    100.0 + f64::from(*day),
                )
            })
            .collect();
        BarSeries::new(Symbol::parse("AAPL").expect("symbol"), bars).expect("series")
    }

    fn clock_at_utc(day: u32, hour: u32, minute: u32) -> FixedClock {
        FixedClock::new(
            Utc.with_ymd_and_hms(2026, 10, day, hour, minute, 0)
                .single()
                .expect("valid timestamp"),
        )
    }

    #[test]
    fn keeps_yesterdays_bar_during_session() {
        // 14:00 New York (EDT, UTC-4)
        let clock = clock_at_utc(16, 18, 0);
        let decision = resolve(&series(&[14, 15]), &AssetClassification::Equity, "America/New_York", &clock)
            .expect("decision");

        assert!(decision.is_final);
        assert!(!decision.dropped_provisional);
        assert_eq!(decision.final_len, 2);
    }

    #[test]
    fn tokyo_close_uses_local_date() {
        // 05:00 UTC on the 16th is 14:00 in Tokyo, before the 15:30 close.
        let clock = clock_at_utc(16, 5, 0);
        let decision = resolve(&series(&[15, 16]), &AssetClassification::Equity, "Asia/Tokyo", &clock)
            .expect("decision");

        assert!(decision.is_final);
        assert!(decision.dropped_provisional);
        assert_eq!(decision.effective_last_date, NaiveDate::from_ymd_opt(2026, 10, 15).expect("date"));
        assert_eq!(decision.timezone, "Asia/Tokyo");
    }

    #[test]
    fn single_provisional_bar_has_no_final_portion() {
        let clock = clock_at_utc(16, 15, 0);
        let err = resolve(&series(&[16]), &AssetClassification::Equity, "America/New_York", &clock)
            .expect_err("must fail");

        assert!(matches!(err, ResolveError::NoFinalBars { .. }));
    }

    #[test]
    fn final_bars_slices_the_series() {
        let clock = clock_at_utc(16, 15, 0);
        let input = series(&[14, 15, 16]);
        let decision = resolve(&input, &AssetClassification::Etf, "America/New_York", &clock)
            .expect("decision");

        assert_eq!(decision.final_bars(&input).len(), 2);
    }
}
