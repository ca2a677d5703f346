//! Snooze and dismiss handling.
//!
//! Snoozing adds exactly one one-shot registration and leaves recurring
//! registrations alone; tomorrow's occurrence of a repeating alarm stays
//! armed. The coordinator also enforces the alarm's snooze policy and
//! tracks per-cycle snooze counts.

use crate::alarm::{AlarmDefinition, snooze_registration_id};
use crate::error::{Result, SchedulingError};
use crate::planner::TriggerSpec;
use chrono::{DateTime, TimeZone, Timelike, Utc};
use std::collections::HashMap;
use std::time::Duration;

/// Tracks snooze usage per trigger cycle and plans snooze one-shots.
#[derive(Debug, Default)]
pub struct SnoozeCoordinator {
    counts: HashMap<String, u8>,
}

impl SnoozeCoordinator {
    /// Create a coordinator with no recorded snoozes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snoozes used by `alarm_id` in the current cycle.
    pub fn count(&self, alarm_id: &str) -> u8 {
        self.counts.get(alarm_id).copied().unwrap_or(0)
    }

    /// Plan a snooze one-shot at `now + duration`.
    ///
    /// Fails when the alarm's policy disables snoozing or the per-cycle
    /// allowance is used up. On success the per-cycle count is consumed;
    /// the caller still has to register the spec with the gateway.
    pub fn plan_snooze<Tz: TimeZone>(
        &mut self,
        alarm: &AlarmDefinition,
        duration: Duration,
        now: &DateTime<Tz>,
    ) -> Result<TriggerSpec> {
        if !alarm.snooze.enabled {
            return Err(SchedulingError::SnoozeDisabled(alarm.id.clone()));
        }
        let used = self.count(&alarm.id);
        if used >= alarm.snooze.max_count {
            return Err(SchedulingError::SnoozeLimitReached(alarm.id.clone()));
        }

        let fire_at = now.clone() + chrono::Duration::seconds(duration.as_secs() as i64);
        let spec = TriggerSpec {
            identifier: snooze_registration_id(&alarm.id, now.timestamp_millis()),
            alarm_id: alarm.id.clone(),
            hour: fire_at.hour() as u8,
            minute: fire_at.minute() as u8,
            weekday: None,
            repeats: false,
            fire_at: fire_at.with_timezone(&Utc),
        };

        self.counts.insert(alarm.id.clone(), used + 1);
        Ok(spec)
    }

    /// Reset the per-cycle count, on a new trigger cycle or a dismissal.
    pub fn reset(&mut self, alarm_id: &str) {
        self.counts.remove(alarm_id);
    }
}
