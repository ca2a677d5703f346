//! Trigger planning: turning an alarm definition into concrete trigger
//! specifications for the host scheduler.
//!
//! Everything here is a pure function of `(alarm, now, timezone)`; the
//! timezone is carried by the `now` argument. No side effects, no ambient
//! clock reads.

use crate::alarm::{AlarmDefinition, ClockTime, registration_id};
use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDateTime, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// One firing instruction submitted to the host scheduler.
///
/// Recurring alarms produce one spec per active weekday; `fire_at` is the
/// estimated next occurrence kept for bookkeeping, while the host fires on
/// the `(hour, minute, weekday)` pattern itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSpec {
    /// Deterministic registration identifier.
    pub identifier: String,
    /// Owning alarm id.
    pub alarm_id: String,
    /// Hour of day (0-23).
    pub hour: u8,
    /// Minute of hour (0-59).
    pub minute: u8,
    /// Weekday for recurring specs; `None` for one-shots.
    pub weekday: Option<Weekday>,
    /// Whether the host should re-arm the trigger weekly.
    pub repeats: bool,
    /// Estimated next firing instant.
    pub fire_at: DateTime<Utc>,
}

/// Resolve a naive local datetime in `tz`, handling DST edges.
///
/// An ambiguous time (clocks rolled back) resolves to the earlier instant;
/// a nonexistent time (clocks sprang forward) shifts one hour later.
pub(crate) fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let shifted = naive + Duration::hours(1);
            match tz.from_local_datetime(&shifted) {
                LocalResult::Single(dt) => dt,
                LocalResult::Ambiguous(earliest, _) => earliest,
                LocalResult::None => tz.from_utc_datetime(&shifted),
            }
        }
    }
}

/// Today's date at the alarm's clock time, without rolling forward.
///
/// May be in the past; the validator uses this to reject one-time alarms
/// whose stated time has already gone by.
pub fn today_instant<Tz: TimeZone>(time: ClockTime, now: &DateTime<Tz>) -> DateTime<Tz> {
    resolve_local(&now.timezone(), now.date_naive().and_time(time.naive()))
}

/// Next occurrence of a one-time alarm: today at the clock time if still
/// ahead, otherwise tomorrow.
pub fn one_time_instant<Tz: TimeZone>(time: ClockTime, now: &DateTime<Tz>) -> DateTime<Tz> {
    let today = today_instant(time, now);
    if today > *now {
        today
    } else {
        let tomorrow = now.date_naive() + Duration::days(1);
        resolve_local(&now.timezone(), tomorrow.and_time(time.naive()))
    }
}

/// Estimated next occurrence of a weekly recurring trigger on `day`.
///
/// Searches day offsets 0..=7 for the first date falling on `day`. When
/// the match is today but the clock time has already passed, the search
/// lands on next week's date instead, so a freshly created alarm never
/// fires in the instant it was created.
pub fn next_weekday_instant<Tz: TimeZone>(
    time: ClockTime,
    day: Weekday,
    now: &DateTime<Tz>,
) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();
    let passed_today = today_instant(time, now) <= *now;

    for offset in 0..=7i64 {
        if offset == 0 && passed_today {
            continue;
        }
        let date = today + Duration::days(offset);
        if date.weekday() == day {
            return resolve_local(&tz, date.and_time(time.naive()));
        }
    }

    // The loop always matches within a week; offset 7 is the fallback.
    resolve_local(&tz, (today + Duration::days(7)).and_time(time.naive()))
}

/// Compute the trigger specifications for an alarm.
///
/// One spec for a one-time alarm, one per weekday for a recurring one.
pub fn plan<Tz: TimeZone>(alarm: &AlarmDefinition, now: &DateTime<Tz>) -> Vec<TriggerSpec> {
    if alarm.repeat_days.is_empty() {
        let fire_at = one_time_instant(alarm.time, now);
        return vec![TriggerSpec {
            identifier: registration_id(&alarm.id, None),
            alarm_id: alarm.id.clone(),
            hour: alarm.time.hour(),
            minute: alarm.time.minute(),
            weekday: None,
            repeats: false,
            fire_at: fire_at.with_timezone(&Utc),
        }];
    }

    alarm
        .repeat_days
        .iter()
        .map(|&day| TriggerSpec {
            identifier: registration_id(&alarm.id, Some(day)),
            alarm_id: alarm.id.clone(),
            hour: alarm.time.hour(),
            minute: alarm.time.minute(),
            weekday: Some(day),
            repeats: true,
            fire_at: next_weekday_instant(alarm.time, day, now).with_timezone(&Utc),
        })
        .collect()
}

/// Earliest planned firing instant for an alarm, in the caller's timezone.
pub fn next_trigger_instant<Tz: TimeZone>(
    alarm: &AlarmDefinition,
    now: &DateTime<Tz>,
) -> DateTime<Tz> {
    if alarm.repeat_days.is_empty() {
        return one_time_instant(alarm.time, now);
    }
    let mut earliest: Option<DateTime<Tz>> = None;
    for &day in &alarm.repeat_days {
        let instant = next_weekday_instant(alarm.time, day, now);
        let replace = match &earliest {
            Some(current) => instant < *current,
            None => true,
        };
        if replace {
            earliest = Some(instant);
        }
    }
    // repeat_days is non-empty here.
    earliest.unwrap_or_else(|| one_time_instant(alarm.time, now))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::alarm::AlarmDefinition;
    use chrono::Utc;
    use chrono_tz::America::New_York;

    fn clock(hour: i64, minute: i64) -> ClockTime {
        ClockTime::new(hour, minute).unwrap()
    }

    // 2025-03-03 is a Monday.
    fn monday_six_utc() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 6, 0, 0).unwrap()
    }

    #[test]
    fn one_time_later_today_plans_today() {
        let now = monday_six_utc();
        let instant = one_time_instant(clock(7, 0), &now);
        assert_eq!(instant, Utc.with_ymd_and_hms(2025, 3, 3, 7, 0, 0).unwrap());
    }

    #[test]
    fn one_time_already_passed_plans_tomorrow() {
        let now = monday_six_utc();
        let instant = one_time_instant(clock(5, 30), &now);
        assert_eq!(instant, Utc.with_ymd_and_hms(2025, 3, 4, 5, 30, 0).unwrap());
    }

    #[test]
    fn today_instant_does_not_roll_forward() {
        let now = monday_six_utc();
        let instant = today_instant(clock(5, 30), &now);
        assert!(instant < now);
    }

    #[test]
    fn same_weekday_future_time_plans_today() {
        let now = monday_six_utc();
        let instant = next_weekday_instant(clock(7, 0), Weekday::Mon, &now);
        assert_eq!(instant, Utc.with_ymd_and_hms(2025, 3, 3, 7, 0, 0).unwrap());
    }

    #[test]
    fn same_weekday_passed_time_plans_next_week() {
        let now = monday_six_utc();
        let instant = next_weekday_instant(clock(5, 0), Weekday::Mon, &now);
        assert_eq!(instant, Utc.with_ymd_and_hms(2025, 3, 10, 5, 0, 0).unwrap());
    }

    #[test]
    fn other_weekday_plans_first_match() {
        let now = monday_six_utc();
        let instant = next_weekday_instant(clock(7, 0), Weekday::Fri, &now);
        assert_eq!(instant, Utc.with_ymd_and_hms(2025, 3, 7, 7, 0, 0).unwrap());
    }

    #[test]
    fn recurring_alarm_plans_one_spec_per_weekday() {
        let now = monday_six_utc();
        let alarm = AlarmDefinition::new("a1", clock(7, 0), "Wake up")
            .with_repeat_days([Weekday::Mon, Weekday::Wed, Weekday::Fri]);
        let specs = plan(&alarm, &now);
        assert_eq!(specs.len(), 3);
        let ids: Vec<&str> = specs.iter().map(|s| s.identifier.as_str()).collect();
        assert_eq!(ids, vec!["a1-mon", "a1-wed", "a1-fri"]);
        for spec in &specs {
            assert!(spec.repeats);
            assert_eq!(spec.hour, 7);
            assert_eq!(spec.minute, 0);
        }
    }

    #[test]
    fn one_time_alarm_plans_single_bare_id_spec() {
        let now = monday_six_utc();
        let alarm = AlarmDefinition::new("a1", clock(7, 0), "Wake up");
        let specs = plan(&alarm, &now);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].identifier, "a1");
        assert!(!specs[0].repeats);
        assert_eq!(specs[0].weekday, None);
    }

    #[test]
    fn next_trigger_instant_picks_earliest_weekday() {
        let now = monday_six_utc();
        let alarm = AlarmDefinition::new("a1", clock(7, 0), "Wake up")
            .with_repeat_days([Weekday::Fri, Weekday::Mon]);
        let instant = next_trigger_instant(&alarm, &now);
        assert_eq!(instant, Utc.with_ymd_and_hms(2025, 3, 3, 7, 0, 0).unwrap());
    }

    #[test]
    fn spring_forward_gap_shifts_one_hour_later() {
        // US DST starts 2025-03-09 02:00; 02:30 does not exist that day.
        let now = New_York.with_ymd_and_hms(2025, 3, 9, 0, 0, 0).unwrap();
        let instant = one_time_instant(clock(2, 30), &now);
        assert_eq!(
            instant,
            New_York.with_ymd_and_hms(2025, 3, 9, 3, 30, 0).unwrap()
        );
    }

    #[test]
    fn fall_back_ambiguity_resolves_to_earlier_instant() {
        // US DST ends 2025-11-02 02:00; 01:30 occurs twice that day.
        let now = New_York.with_ymd_and_hms(2025, 11, 2, 0, 0, 0).unwrap();
        let instant = one_time_instant(clock(1, 30), &now);
        // The earlier 01:30 is still on EDT (UTC-4), i.e. 05:30 UTC.
        assert_eq!(
            instant.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2025, 11, 2, 5, 30, 0).unwrap()
        );
    }
}
