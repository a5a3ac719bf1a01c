//! Calendar helpers for observational and forecast datasets.

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Sampling frequency of a dataset's date axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    /// One slice per day.
    #[serde(rename = "D")]
    Daily,
    /// One slice per month, dated on the first of the month.
    #[serde(rename = "M")]
    Monthly,
}

/// Shift `date` by a signed number of calendar months.
///
/// The day is clamped to the end of the target month, so
/// `2024-03-31 - 1 month` is `2024-02-29`.
pub fn add_months(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    }
}

/// Whole calendar months from `earlier` to `later`.
///
/// A trailing partial month does not count. Negative when `later`
/// precedes `earlier`.
pub fn whole_months_between(later: NaiveDate, earlier: NaiveDate) -> i32 {
    let mut months = (later.year() - earlier.year()) * 12 + later.month() as i32
        - earlier.month() as i32;

    if months > 0 && later.day() < earlier.day() {
        months -= 1;
    } else if months < 0 && later.day() > earlier.day() {
        months += 1;
    }
    months
}

/// Inclusive series of dates between `start` and `end`.
///
/// Monthly series start at the first month start on or after `start`.
/// Without an `end` the series is just `start`.
pub fn date_series(start: NaiveDate, end: Option<NaiveDate>, frequency: Frequency) -> Vec<NaiveDate> {
    let Some(end) = end else {
        return vec![start];
    };

    let mut dates = Vec::new();
    match frequency {
        Frequency::Daily => {
            let mut current = start;
            while current <= end {
                dates.push(current);
                current += Duration::days(1);
            }
        }
        Frequency::Monthly => {
            let first_of_month = start.with_day(1).unwrap_or(start);
            let mut current = if first_of_month < start {
                add_months(first_of_month, 1)
            } else {
                Some(first_of_month)
            };
            while let Some(date) = current.filter(|d| *d <= end) {
                dates.push(date);
                current = add_months(date, 1);
            }
        }
    }
    dates
}
