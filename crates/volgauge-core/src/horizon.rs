use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::AssetClassification;

/// Target date of a one-step-ahead forecast made from `last_final_date`.
///
/// Continuously traded assets step one calendar day. Everything else steps
/// to the next Monday-to-Friday date; exchange holidays are not modelled.
pub fn next_target_date(last_final_date: NaiveDate, classification: &AssetClassification) -> NaiveDate {
    if classification.trades_continuously() {
        return step(last_final_date, 1);
    }

    let skip = match last_final_date.weekday() {
        Weekday::Fri => 3,
        Weekday::Sat => 2,
        _ => 1,
    };
    step(last_final_date, skip)
}

fn step(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, month, day).expect("valid date")
    }

    #[test]
    fn weekdays_step_one_day() {
        // 2026-10-14 is a Wednesday
        assert_eq!(next_target_date(date(10, 14), &AssetClassification::Equity), date(10, 15));
    }

    #[test]
    fn weekend_dates_roll_to_monday() {
        assert_eq!(next_target_date(date(10, 17), &AssetClassification::Index), date(10, 19));
        assert_eq!(next_target_date(date(10, 18), &AssetClassification::Future), date(10, 19));
    }

    #[test]
    fn continuous_crosses_month_end() {
        assert_eq!(
            next_target_date(date(10, 31), &AssetClassification::Continuous),
            date(11, 1)
        );
    }

    #[test]
    fn unknown_classification_uses_business_days() {
        assert_eq!(
            next_target_date(date(10, 16), &AssetClassification::parse("WARRANT")),
            date(10, 19)
        );
    }
}
