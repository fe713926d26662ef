//! Budget-period granularities and window computation.
//!
//! A period window is the half-open interval `[start, next_start)` bounding
//! one budget-policy cycle. Windows are aligned on calendar boundaries in
//! the time zone carried by the instant, and daily/weekly/monthly arithmetic
//! is calendar arithmetic rather than fixed durations, so a window that
//! spans a DST transition still ends at the right local midnight.

use chrono::{
    DateTime, Datelike, Days, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, TimeZone,
    Timelike,
};
use serde::{Deserialize, Serialize};

/// Granularity of a withdraw-policy budget period.
///
/// `Minute` exists for accelerated testing and demos; real budgets use the
/// calendar granularities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Floor to the minute; the window is one minute long.
    Minute,
    /// Day starts at local midnight.
    Daily,
    /// Week starts on Monday at local midnight.
    Weekly,
    /// Month starts on the 1st at local midnight.
    Monthly,
}

/// Compute the period window containing `instant`.
///
/// Returns `(start, next_start)` such that `start <= instant < next_start`.
/// Pure and deterministic: the same instant and period always produce the
/// same window, computed in the zone carried by `instant`.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use ledgerfold::{period_window, Period};
///
/// let instant = Utc.with_ymd_and_hms(2019, 5, 3, 12, 20, 30).unwrap();
/// let (start, next) = period_window(&instant, Period::Minute);
/// assert_eq!(start, Utc.with_ymd_and_hms(2019, 5, 3, 12, 20, 0).unwrap());
/// assert_eq!(next, Utc.with_ymd_and_hms(2019, 5, 3, 12, 21, 0).unwrap());
/// ```
pub fn period_window<Tz: TimeZone>(
    instant: &DateTime<Tz>,
    period: Period,
) -> (DateTime<Tz>, DateTime<Tz>) {
    let tz = instant.timezone();
    let local = instant.naive_local();

    match period {
        Period::Minute => {
            let floored = local
                - Duration::seconds(i64::from(local.second()))
                - Duration::nanoseconds(i64::from(local.nanosecond()));
            let start = resolve_local(&tz, floored);
            let next = start.clone() + Duration::minutes(1);
            (start, next)
        }

        Period::Daily => {
            let date = local.date();
            (
                local_midnight(&tz, date),
                local_midnight(&tz, date + Days::new(1)),
            )
        }

        Period::Weekly => {
            // Most recent Monday; an instant on a Monday floors to that day.
            let date = local.date();
            let monday = date - Days::new(u64::from(date.weekday().num_days_from_monday()));
            (
                local_midnight(&tz, monday),
                local_midnight(&tz, monday + Days::new(7)),
            )
        }

        Period::Monthly => {
            let date = local.date();
            let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
                .expect("the 1st of a month is always a valid date");
            (
                local_midnight(&tz, first),
                local_midnight(&tz, first + Months::new(1)),
            )
        }
    }
}

/// Midnight of `date` in `tz`.
fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    resolve_local(tz, date.and_hms_opt(0, 0, 0).expect("midnight is a valid time"))
}

/// Map a naive local datetime onto `tz`.
///
/// A local time skipped by a DST spring-forward transition does not exist;
/// probe forward in one-hour steps until one does. An ambiguous local time
/// (fall-back transition) takes the earlier instant.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    let mut candidate = naive;
    for _ in 0..4 {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(instant) => return instant,
            LocalResult::Ambiguous(earlier, _) => return earlier,
            LocalResult::None => candidate += Duration::hours(1),
        }
    }
    // No real zone skips more than a few hours around a calendar boundary.
    tz.from_utc_datetime(&candidate)
}
