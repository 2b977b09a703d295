//! Next-trigger calculation.
//!
//! Pure functions over a wall-clock instant: no I/O, no hidden clock. The
//! time zone of the `now` argument decides which calendar the nominal
//! `hour:minute` is interpreted in.
//!
//! ## Rules
//!
//! - One-shot (`days` empty): today's `hour:minute`, returned as is even when
//!   it already passed. Rolling a stale one-shot forward is the edit flow's
//!   job, see [`initial_trigger`].
//! - Recurring: the first day from today (inclusive) whose bit is set, where
//!   today only counts if `hour:minute` is still strictly ahead of `now`.

use chrono::{DateTime, Datelike, Days, LocalResult, NaiveDate, TimeZone};

use super::model::Weekdays;

/// Furthest day offset examined for a recurring alarm.
///
/// Offset 7 is today's weekday again, which is where a single-day alarm
/// whose time already passed today lands.
const SCAN_DAYS: u64 = 7;

/// Compute the next firing instant for `hour:minute` under `days`.
pub fn compute_next_trigger<Tz: TimeZone>(
    hour: u32,
    minute: u32,
    days: Weekdays,
    now: &DateTime<Tz>,
) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    let nominal = at_time_of_day(&tz, today, hour, minute);
    if days.is_empty() {
        return nominal;
    }

    for offset in 0..=SCAN_DAYS {
        let Some(date) = today.checked_add_days(Days::new(offset)) else {
            break;
        };
        if !days.contains(date.weekday()) {
            continue;
        }
        let candidate = at_time_of_day(&tz, date, hour, minute);
        if offset > 0 || candidate > *now {
            return candidate;
        }
    }

    // Only reachable with a mask that has no weekday bits.
    nominal
}

/// Trigger used when the user creates or re-arms an alarm.
///
/// Same as [`compute_next_trigger`] except that a one-shot whose time is not
/// in the future is moved to the same time tomorrow.
pub fn initial_trigger<Tz: TimeZone>(
    hour: u32,
    minute: u32,
    days: Weekdays,
    now: &DateTime<Tz>,
) -> DateTime<Tz> {
    let next = compute_next_trigger(hour, minute, days, now);
    if !days.is_empty() || next > *now {
        return next;
    }
    match now.date_naive().succ_opt() {
        Some(tomorrow) => at_time_of_day(&now.timezone(), tomorrow, hour, minute),
        None => next,
    }
}

/// Map a calendar date and time of day to an instant in `tz`.
///
/// Times skipped by a DST jump resolve an hour later; repeated times resolve
/// to their first occurrence.
fn at_time_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate, hour: u32, minute: u32) -> DateTime<Tz> {
    let naive = date
        .and_hms_opt(hour.min(23), minute.min(59), 0)
        .unwrap_or_default();
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let shifted = naive + chrono::Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .unwrap_or_else(|| tz.from_utc_datetime(&naive))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc, Weekday};
    use proptest::prelude::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    // 2024-01-01 is a Monday.

    #[test]
    fn one_shot_in_future_is_today() {
        let now = utc(2024, 1, 1, 6, 0);
        assert_eq!(
            compute_next_trigger(7, 0, Weekdays::NONE, &now),
            utc(2024, 1, 1, 7, 0)
        );
    }

    #[test]
    fn one_shot_in_past_is_returned_unmodified() {
        let now = utc(2024, 1, 1, 8, 0);
        assert_eq!(
            compute_next_trigger(7, 0, Weekdays::NONE, &now),
            utc(2024, 1, 1, 7, 0)
        );
    }

    #[test]
    fn one_shot_exactly_now_is_not_future() {
        let now = utc(2024, 1, 1, 7, 0);
        assert_eq!(compute_next_trigger(7, 0, Weekdays::NONE, &now), now);
        assert_eq!(
            initial_trigger(7, 0, Weekdays::NONE, &now),
            utc(2024, 1, 2, 7, 0)
        );
    }

    #[test]
    fn recurring_skips_to_next_set_day() {
        let days: Weekdays = [Weekday::Mon, Weekday::Wed].into_iter().collect();
        let tuesday_morning = utc(2024, 1, 2, 9, 0);
        assert_eq!(
            compute_next_trigger(7, 0, days, &tuesday_morning),
            utc(2024, 1, 3, 7, 0)
        );
    }

    #[test]
    fn recurring_fires_today_when_still_ahead() {
        let days: Weekdays = [Weekday::Mon].into_iter().collect();
        let monday_early = utc(2024, 1, 1, 6, 59);
        assert_eq!(
            compute_next_trigger(7, 0, days, &monday_early),
            utc(2024, 1, 1, 7, 0)
        );
    }

    #[test]
    fn single_day_past_today_wraps_a_full_week() {
        let days: Weekdays = [Weekday::Mon].into_iter().collect();
        let monday_late = utc(2024, 1, 1, 7, 0);
        assert_eq!(
            compute_next_trigger(7, 0, days, &monday_late),
            utc(2024, 1, 8, 7, 0)
        );
    }

    #[test]
    fn mask_without_weekday_bits_falls_back_to_nominal() {
        let now = utc(2024, 1, 1, 9, 0);
        assert_eq!(
            compute_next_trigger(7, 0, Weekdays::from_bits(0b1000_0000), &now),
            utc(2024, 1, 1, 7, 0)
        );
    }

    #[test]
    fn initial_trigger_keeps_future_one_shot() {
        let now = utc(2024, 1, 1, 6, 0);
        assert_eq!(
            initial_trigger(7, 0, Weekdays::NONE, &now),
            utc(2024, 1, 1, 7, 0)
        );
    }

    #[test]
    fn initial_trigger_rolls_stale_one_shot_once() {
        let now = utc(2024, 1, 31, 23, 30);
        assert_eq!(
            initial_trigger(7, 0, Weekdays::NONE, &now),
            utc(2024, 2, 1, 7, 0)
        );
    }

    #[test]
    fn uses_the_calendar_of_now() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        // 2024-01-01 22:00 UTC is Tuesday 07:00 in Tokyo.
        let now = utc(2024, 1, 1, 22, 0).with_timezone(&tokyo);
        let days: Weekdays = [Weekday::Tue].into_iter().collect();
        let next = compute_next_trigger(8, 0, days, &now);
        assert_eq!(next.with_timezone(&Utc), utc(2024, 1, 1, 23, 0));
    }

    proptest! {
        #[test]
        fn one_shot_future_is_unmodified(
            start in 0i64..4_000_000_000,
            hour in 0u32..24,
            minute in 0u32..60,
        ) {
            let now = DateTime::from_timestamp(start, 0).unwrap();
            let nominal = now
                .date_naive()
                .and_hms_opt(hour, minute, 0)
                .unwrap()
                .and_utc();
            let next = compute_next_trigger(hour, minute, Weekdays::NONE, &now);
            prop_assert_eq!(next, nominal);
        }

        #[test]
        fn recurring_lands_on_earliest_set_day(
            start in 0i64..4_000_000_000,
            hour in 0u32..24,
            minute in 0u32..60,
            bits in 1u8..128,
        ) {
            let days = Weekdays::from_bits(bits);
            let now = DateTime::from_timestamp(start, 0).unwrap();
            let next = compute_next_trigger(hour, minute, days, &now);

            prop_assert!(days.contains(next.weekday()));
            prop_assert!(next > now);
            prop_assert!(next - now <= chrono::Duration::days(7));

            let mut date = now.date_naive();
            while date < next.date_naive() {
                let candidate = date.and_hms_opt(hour, minute, 0).unwrap().and_utc();
                prop_assert!(!(days.contains(date.weekday()) && candidate > now));
                date = date.succ_opt().unwrap();
            }
        }
    }
}
