//! Alarm definitions and the validated clock-time value type.
//!
//! Defines [`AlarmDefinition`] as read from the external alarm store,
//! [`ClockTime`] (the one place raw hour/minute values are checked), and
//! the per-alarm [`AlarmState`] lifecycle.

use crate::error::{Result, SchedulingError};
use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// A validated wall-clock time of day.
///
/// Constructed once at the alarm-creation boundary; scheduling code
/// downstream never re-checks components or handles extraction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    /// Normalize raw hour/minute components.
    ///
    /// Fails with [`SchedulingError::InvalidTimeConfiguration`] when either
    /// component is out of range.
    pub fn new(hour: i64, minute: i64) -> Result<Self> {
        if !(0..24).contains(&hour) || !(0..60).contains(&minute) {
            return Err(SchedulingError::InvalidTimeConfiguration { hour, minute });
        }
        Ok(Self {
            hour: hour as u8,
            minute: minute as u8,
        })
    }

    /// Hour of day (0-23).
    pub fn hour(&self) -> u8 {
        self.hour
    }

    /// Minute of hour (0-59).
    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Minutes since midnight, for near-duplicate comparison.
    pub fn minutes_from_midnight(&self) -> i64 {
        i64::from(self.hour) * 60 + i64::from(self.minute)
    }

    /// The equivalent naive time-of-day.
    pub fn naive(&self) -> NaiveTime {
        // Components are range-checked in `new`.
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for ClockTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Snooze behavior attached to an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnoozePolicy {
    /// Whether snoozing is allowed at all.
    pub enabled: bool,
    /// Snooze duration in seconds.
    pub duration_secs: u64,
    /// Maximum snoozes per trigger cycle.
    pub max_count: u8,
}

impl Default for SnoozePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_secs: 540,
            max_count: 3,
        }
    }
}

/// One user-editable alarm, owned by the external alarm store.
///
/// The engine reads these and occasionally writes one back (disabling a
/// consumed one-time alarm); it never persists them itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmDefinition {
    /// Stable alarm identifier.
    pub id: String,
    /// Wall-clock fire time.
    pub time: ClockTime,
    /// Whether the alarm should have live registrations.
    pub enabled: bool,
    /// Human-readable label.
    pub label: String,
    /// Weekdays the alarm repeats on; empty means one-time.
    pub repeat_days: Vec<Weekday>,
    /// Snooze behavior.
    pub snooze: SnoozePolicy,
    /// Tone or generated-content reference, opaque to the engine.
    pub tone: Option<String>,
}

impl AlarmDefinition {
    /// Create an enabled one-time alarm.
    pub fn new(id: impl Into<String>, time: ClockTime, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            time,
            enabled: true,
            label: label.into(),
            repeat_days: Vec::new(),
            snooze: SnoozePolicy::default(),
            tone: None,
        }
    }

    /// Set the repeat weekdays, deduplicating while preserving order.
    pub fn with_repeat_days(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.repeat_days.clear();
        for day in days {
            if !self.repeat_days.contains(&day) {
                self.repeat_days.push(day);
            }
        }
        self
    }

    /// Set the snooze policy.
    pub fn with_snooze(mut self, snooze: SnoozePolicy) -> Self {
        self.snooze = snooze;
        self
    }

    /// Returns `true` if the alarm repeats on at least one weekday.
    pub fn is_repeating(&self) -> bool {
        !self.repeat_days.is_empty()
    }

    /// Number of registrations this alarm occupies in the host scheduler.
    pub fn estimated_registrations(&self) -> usize {
        if self.repeat_days.is_empty() {
            1
        } else {
            self.repeat_days.len()
        }
    }
}

/// Lifecycle state of an alarm as tracked by the engine.
///
/// Transitions: `Unscheduled → Scheduled` once registrations exist,
/// `Scheduled → Triggered` when reconciliation infers a firing, then back
/// to `Scheduled` for repeating alarms (the next weekday entry already
/// exists) or to `Unscheduled` for one-time alarms. `Scheduled →
/// Cancelled` on explicit removal, `Scheduled → Failed` on a registration
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmState {
    /// No live registrations exist.
    Unscheduled,
    /// Registrations are live in the host scheduler.
    Scheduled,
    /// Reconciliation inferred a firing in the current cycle.
    Triggered,
    /// A registration call failed; not retried automatically.
    Failed,
    /// Registrations were explicitly removed.
    Cancelled,
}

/// Lowercase three-letter suffix used in recurring registration ids.
pub fn weekday_suffix(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

/// Deterministic registration identifier for an alarm.
///
/// One-time alarms use the bare alarm id; recurring alarms append a
/// per-weekday suffix so each weekday entry can be removed precisely.
pub fn registration_id(alarm_id: &str, weekday: Option<Weekday>) -> String {
    match weekday {
        Some(day) => format!("{alarm_id}-{}", weekday_suffix(day)),
        None => alarm_id.to_owned(),
    }
}

/// Registration identifier for a snooze one-shot.
pub fn snooze_registration_id(alarm_id: &str, epoch_millis: i64) -> String {
    format!("{alarm_id}-snooze-{epoch_millis}")
}

/// Returns `true` if `identifier` was derived from `alarm_id`.
///
/// Matches the bare id, weekday-suffixed ids, and snooze ids, without
/// matching other alarms whose ids share a prefix.
pub fn identifier_belongs_to(identifier: &str, alarm_id: &str) -> bool {
    identifier == alarm_id
        || identifier
            .strip_prefix(alarm_id)
            .is_some_and(|rest| rest.starts_with('-'))
}
