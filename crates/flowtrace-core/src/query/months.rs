//! Calendar-month buckets for date-range searches.

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

/// One month bucket and the part of the search window that falls inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthWindow {
    /// `YYYYMM`
    pub key: String,
    /// Inclusive start, epoch seconds
    pub start_epoch: i64,
    /// Exclusive end, epoch seconds
    pub end_epoch: i64,
}

/// `YYYYMM` key of the month containing `date`
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}{:02}", date.year(), date.month())
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn epoch(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc().timestamp())
        .unwrap_or_default()
}

/// First day of every month touching `[start, end]`, in order
fn month_starts(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }

    let mut months = Vec::new();
    let mut cursor = first_of_month(start);
    while cursor <= end {
        months.push(cursor);
        match cursor.checked_add_months(Months::new(1)) {
            Some(next) => cursor = next,
            None => break,
        }
    }

    let last = first_of_month(end);
    if months.last() != Some(&last) {
        months.push(last);
    }
    months
}

/// Month keys spanning `[start, end]`, inclusive of both end months.
///
/// Steps one month at a time from the first day of `start`'s month. The
/// end month is appended if the stepping did not reach it. `start > end`
/// yields no buckets.
pub fn month_buckets(start: NaiveDate, end: NaiveDate) -> Vec<String> {
    month_starts(start, end).into_iter().map(month_key).collect()
}

/// Month buckets with the epoch window each one covers.
///
/// Each window is `[max(month start, start), min(next month start, end + 1 day))`.
pub fn month_windows(start: NaiveDate, end: NaiveDate) -> Vec<MonthWindow> {
    let range_end = end.succ_opt().unwrap_or(end);

    month_starts(start, end)
        .into_iter()
        .map(|month_start| {
            let next_month = month_start
                .checked_add_months(Months::new(1))
                .unwrap_or(range_end);

            MonthWindow {
                key: month_key(month_start),
                start_epoch: epoch(month_start.max(start)),
                end_epoch: epoch(next_month.min(range_end)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_buckets_inclusive_of_both_ends() {
        assert_eq!(
            month_buckets(date(2024, 1, 15), date(2024, 3, 10)),
            vec!["202401", "202402", "202403"]
        );
    }

    #[test]
    fn test_buckets_end_on_first_day() {
        assert_eq!(
            month_buckets(date(2024, 1, 31), date(2024, 2, 1)),
            vec!["202401", "202402"]
        );
    }

    #[test]
    fn test_buckets_same_month() {
        assert_eq!(month_buckets(date(2024, 5, 2), date(2024, 5, 30)), vec!["202405"]);
    }

    #[test]
    fn test_buckets_cross_year() {
        assert_eq!(
            month_buckets(date(2023, 11, 30), date(2024, 1, 1)),
            vec!["202311", "202312", "202401"]
        );
    }

    #[test]
    fn test_buckets_reversed_range() {
        assert!(month_buckets(date(2024, 3, 1), date(2024, 1, 1)).is_empty());
    }

    #[test]
    fn test_windows_clip_to_range() {
        let windows = month_windows(date(2024, 1, 15), date(2024, 2, 10));
        assert_eq!(windows.len(), 2);

        assert_eq!(windows[0].key, "202401");
        assert_eq!(windows[0].start_epoch, epoch(date(2024, 1, 15)));
        assert_eq!(windows[0].end_epoch, epoch(date(2024, 2, 1)));

        assert_eq!(windows[1].key, "202402");
        assert_eq!(windows[1].start_epoch, epoch(date(2024, 2, 1)));
        assert_eq!(windows[1].end_epoch, epoch(date(2024, 2, 11)));
    }

    #[test]
    fn test_windows_five_digit_year() {
        let windows = month_windows(date(10000, 1, 15), date(10000, 2, 3));
        let keys: Vec<_> = windows.iter().map(|w| w.key.as_str()).collect();
        assert_eq!(keys, vec!["1000001", "1000002"]);

        assert_eq!(windows[0].start_epoch, epoch(date(10000, 1, 15)));
        assert_eq!(windows[0].end_epoch, epoch(date(10000, 2, 1)));
        assert_eq!(windows[1].end_epoch, epoch(date(10000, 2, 4)));
    }
}
