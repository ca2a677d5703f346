//! Near-duplicate detection between alarm definitions.

use crate::alarm::AlarmDefinition;
use crate::planner::one_time_instant;
use chrono::{DateTime, TimeZone};

/// Clock-time distance (minutes) within which two alarms are considered
/// near-duplicates.
const CONFLICT_WINDOW_MINUTES: i64 = 1;

/// Returns `true` if two enabled alarms would fire within a minute of each
/// other on an overlapping schedule.
///
/// Two repeating alarms conflict when their weekday sets intersect; two
/// one-time alarms when they land on the same calendar day. A repeating
/// and a one-time alarm never conflict under this rule, even at the same
/// clock time, a known limitation of the comparison, kept as is.
pub fn conflicts<Tz: TimeZone>(
    a: &AlarmDefinition,
    b: &AlarmDefinition,
    now: &DateTime<Tz>,
) -> bool {
    if a.id == b.id {
        return false;
    }

    let delta = (a.time.minutes_from_midnight() - b.time.minutes_from_midnight()).abs();
    if delta > CONFLICT_WINDOW_MINUTES {
        return false;
    }

    match (a.is_repeating(), b.is_repeating()) {
        (true, true) => a.repeat_days.iter().any(|day| b.repeat_days.contains(day)),
        (false, false) => {
            one_time_instant(a.time, now).date_naive()
                == one_time_instant(b.time, now).date_naive()
        }
        _ => false,
    }
}
