//! Scheduling validation: permission, past-time, capacity, conflict,
//! far-future, and DST-ambiguity checks composed into a single verdict.

use crate::alarm::AlarmDefinition;
use crate::config::EngineConfig;
use crate::conflict::conflicts;
use crate::gateway::PermissionStatus;
use crate::planner::{next_trigger_instant, resolve_local, today_instant};
use chrono::{DateTime, Duration, Offset, TimeZone};
use serde::{Deserialize, Serialize};

/// A blocking validation failure. Any issue aborts the operation before a
/// gateway call is made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// Notification permission is not granted.
    NotificationPermissionDenied,
    /// A one-time alarm's stated time has already passed today.
    TimeInPast,
    /// The operation would exceed the host scheduler's capacity ceiling.
    SystemLimitExceeded {
        /// Registrations currently pending in the host scheduler.
        pending: usize,
        /// New registrations the operation would add.
        requested: usize,
        /// The host's hard ceiling.
        limit: usize,
    },
    /// The definition is structurally unusable despite a valid clock time.
    InvalidConfiguration(String),
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotificationPermissionDenied => write!(f, "notification permission denied"),
            Self::TimeInPast => write!(f, "time is in the past"),
            Self::SystemLimitExceeded {
                pending,
                requested,
                limit,
            } => write!(
                f,
                "system limit exceeded ({pending} pending + {requested} requested > {limit})"
            ),
            Self::InvalidConfiguration(reason) => write!(f, "invalid configuration: {reason}"),
        }
    }
}

/// An advisory validation finding. Warnings never block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    /// Another enabled alarm fires within a minute on an overlapping schedule.
    DuplicateTime {
        /// The conflicting alarm's id.
        other_id: String,
    },
    /// The next trigger is more than the configured horizon away.
    ScheduledFarInFuture,
    /// The trigger day's UTC offset differs from the following day's;
    /// the firing may land an hour off around a DST transition.
    TimezoneAmbiguity,
    /// The operation pushes the live registration count close to the ceiling.
    PerformanceImpact,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateTime { other_id } => {
                write!(f, "duplicate time with alarm {other_id}")
            }
            Self::ScheduledFarInFuture => write!(f, "scheduled far in the future"),
            Self::TimezoneAmbiguity => write!(f, "timezone offset changes around the trigger day"),
            Self::PerformanceImpact => write!(f, "approaching host scheduler capacity"),
        }
    }
}

/// Outcome of validating a scheduling request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    /// Blocking issues; empty means the operation may proceed.
    pub issues: Vec<ValidationIssue>,
    /// Advisory warnings; never block.
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationVerdict {
    /// `true` iff no blocking issue was found.
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

impl std::fmt::Display for ValidationVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "valid")?;
        } else {
            let issues: Vec<String> = self.issues.iter().map(ToString::to_string).collect();
            write!(f, "{}", issues.join("; "))?;
        }
        if !self.warnings.is_empty() {
            let warnings: Vec<String> = self.warnings.iter().map(ToString::to_string).collect();
            write!(f, " (warnings: {})", warnings.join("; "))?;
        }
        Ok(())
    }
}

/// Validate a scheduling request against the current environment.
///
/// `peers` are the other currently enabled alarms; `pending_count` is the
/// host scheduler's total pending registrations, including entries owned
/// by other subsystems sharing it. Pure in `now`; no ambient clock read.
pub fn validate<Tz: TimeZone>(
    alarm: &AlarmDefinition,
    peers: &[AlarmDefinition],
    pending_count: usize,
    permission: PermissionStatus,
    config: &EngineConfig,
    now: &DateTime<Tz>,
) -> ValidationVerdict {
    let mut verdict = ValidationVerdict::default();

    if permission != PermissionStatus::Authorized {
        verdict.issues.push(ValidationIssue::NotificationPermissionDenied);
    }

    if !alarm.is_repeating() && today_instant(alarm.time, now) <= *now {
        verdict.issues.push(ValidationIssue::TimeInPast);
    }

    let requested = alarm.estimated_registrations();
    if pending_count + requested > config.registration_limit {
        verdict.issues.push(ValidationIssue::SystemLimitExceeded {
            pending: pending_count,
            requested,
            limit: config.registration_limit,
        });
    }

    if alarm.snooze.enabled && (alarm.snooze.duration_secs == 0 || alarm.snooze.max_count == 0) {
        verdict.issues.push(ValidationIssue::InvalidConfiguration(
            "snooze enabled with zero duration or zero max count".to_owned(),
        ));
    }

    for other in peers {
        if other.enabled && conflicts(alarm, other, now) {
            verdict.warnings.push(ValidationWarning::DuplicateTime {
                other_id: other.id.clone(),
            });
        }
    }

    // Planning never looks more than a week ahead, so this warning only
    // fires under a horizon tightened below the 365-day default.
    let next = next_trigger_instant(alarm, now);
    if next.clone() - now.clone() > Duration::days(config.far_future_days) {
        verdict.warnings.push(ValidationWarning::ScheduledFarInFuture);
    }

    // Coarse DST probe: compare the trigger day's offset with the same
    // clock time one day later. Flags any alarm on a transition day, even
    // when its time is nowhere near the changeover.
    let tz = now.timezone();
    let day_after = resolve_local(
        &tz,
        (next.date_naive() + Duration::days(1)).and_time(alarm.time.naive()),
    );
    if next.offset().fix() != day_after.offset().fix() {
        verdict.warnings.push(ValidationWarning::TimezoneAmbiguity);
    }

    if pending_count + requested > config.headroom_warning_threshold()
        && pending_count + requested <= config.registration_limit
    {
        verdict.warnings.push(ValidationWarning::PerformanceImpact);
    }

    verdict
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::alarm::{ClockTime, SnoozePolicy};
    use chrono::{TimeZone, Utc, Weekday};
    use chrono_tz::America::New_York;

    fn alarm(id: &str, hour: i64, minute: i64, days: &[Weekday]) -> AlarmDefinition {
        AlarmDefinition::new(id, ClockTime::new(hour, minute).unwrap(), id)
            .with_repeat_days(days.iter().copied())
    }

    // 2025-03-03 is a Monday.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 6, 0, 0).unwrap()
    }

    fn check(
        a: &AlarmDefinition,
        peers: &[AlarmDefinition],
        pending: usize,
        permission: PermissionStatus,
    ) -> ValidationVerdict {
        validate(a, peers, pending, permission, &EngineConfig::default(), &now())
    }

    #[test]
    fn future_one_time_alarm_is_valid() {
        let a = alarm("a1", 7, 0, &[]);
        let verdict = check(&a, &[], 0, PermissionStatus::Authorized);
        assert!(verdict.is_valid());
        assert!(verdict.warnings.is_empty());
    }

    #[test]
    fn denied_permission_blocks() {
        let a = alarm("a1", 7, 0, &[]);
        let verdict = check(&a, &[], 0, PermissionStatus::Denied);
        assert!(!verdict.is_valid());
        assert!(
            verdict
                .issues
                .contains(&ValidationIssue::NotificationPermissionDenied)
        );
    }

    #[test]
    fn past_time_blocks_one_time_alarms() {
        // Now is 06:00; 05:30 already went by today.
        let a = alarm("a1", 5, 30, &[]);
        let verdict = check(&a, &[], 0, PermissionStatus::Authorized);
        assert!(!verdict.is_valid());
        assert!(verdict.issues.contains(&ValidationIssue::TimeInPast));
    }

    #[test]
    fn past_time_does_not_block_repeating_alarms() {
        let a = alarm("a1", 5, 30, &[Weekday::Mon]);
        let verdict = check(&a, &[], 0, PermissionStatus::Authorized);
        assert!(verdict.is_valid());
    }

    #[test]
    fn capacity_check_uses_pending_plus_requested() {
        let a = alarm("a1", 7, 0, &[Weekday::Mon, Weekday::Wed, Weekday::Fri]);
        // 61 + 3 = 64 is exactly at the ceiling: allowed.
        let verdict = check(&a, &[], 61, PermissionStatus::Authorized);
        assert!(verdict.is_valid());
        // 62 + 3 = 65 exceeds it.
        let verdict = check(&a, &[], 62, PermissionStatus::Authorized);
        assert!(!verdict.is_valid());
        assert!(verdict.issues.iter().any(|issue| matches!(
            issue,
            ValidationIssue::SystemLimitExceeded {
                pending: 62,
                requested: 3,
                limit: 64,
            }
        )));
    }

    #[test]
    fn conflicting_peer_warns_without_blocking() {
        let a = alarm("a1", 7, 0, &[Weekday::Mon]);
        let b = alarm("a2", 7, 1, &[Weekday::Mon]);
        let verdict = check(&a, std::slice::from_ref(&b), 0, PermissionStatus::Authorized);
        assert!(verdict.is_valid());
        assert_eq!(
            verdict.warnings,
            vec![ValidationWarning::DuplicateTime {
                other_id: "a2".to_owned()
            }]
        );

        // Symmetric from the other alarm's point of view.
        let verdict = check(&b, std::slice::from_ref(&a), 0, PermissionStatus::Authorized);
        assert!(verdict.warnings.iter().any(|w| matches!(
            w,
            ValidationWarning::DuplicateTime { other_id } if other_id == "a1"
        )));
    }

    #[test]
    fn mixed_kind_peer_at_same_time_does_not_warn() {
        let a = alarm("a1", 7, 0, &[Weekday::Mon]);
        let b = alarm("a2", 7, 0, &[]);
        let verdict = check(&a, std::slice::from_ref(&b), 0, PermissionStatus::Authorized);
        assert!(verdict.warnings.is_empty());
    }

    #[test]
    fn disabled_peer_is_ignored() {
        let a = alarm("a1", 7, 0, &[Weekday::Mon]);
        let mut b = alarm("a2", 7, 0, &[Weekday::Mon]);
        b.enabled = false;
        let verdict = check(&a, std::slice::from_ref(&b), 0, PermissionStatus::Authorized);
        assert!(verdict.warnings.is_empty());
    }

    #[test]
    fn broken_snooze_policy_blocks() {
        let mut a = alarm("a1", 7, 0, &[]);
        a.snooze = SnoozePolicy {
            enabled: true,
            duration_secs: 0,
            max_count: 3,
        };
        let verdict = check(&a, &[], 0, PermissionStatus::Authorized);
        assert!(!verdict.is_valid());
        assert!(verdict.issues.iter().any(|issue| matches!(
            issue,
            ValidationIssue::InvalidConfiguration(_)
        )));
    }

    #[test]
    fn tightened_horizon_drives_the_far_future_warning() {
        // Next trigger is 07:00 today, an hour past a zero-day horizon.
        let a = alarm("a1", 7, 0, &[]);
        let config = EngineConfig {
            far_future_days: 0,
            ..EngineConfig::default()
        };
        let verdict = validate(&a, &[], 0, PermissionStatus::Authorized, &config, &now());
        assert!(verdict.is_valid());
        assert!(
            verdict
                .warnings
                .contains(&ValidationWarning::ScheduledFarInFuture)
        );
    }

    #[test]
    fn headroom_pressure_warns_without_blocking() {
        let a = alarm("a1", 7, 0, &[Weekday::Mon]);
        // 48 + 1 = 49 > 48 threshold, still under the 64 ceiling.
        let verdict = check(&a, &[], 48, PermissionStatus::Authorized);
        assert!(verdict.is_valid());
        assert!(verdict.warnings.contains(&ValidationWarning::PerformanceImpact));
    }

    #[test]
    fn dst_transition_day_warns() {
        // US DST starts Sunday 2025-03-09; an alarm whose next trigger is
        // Saturday 2025-03-08 sits on a day whose offset differs from the
        // following day's.
        let now = New_York.with_ymd_and_hms(2025, 3, 8, 6, 0, 0).unwrap();
        let a = alarm("a1", 7, 0, &[]);
        let verdict = validate(
            &a,
            &[],
            0,
            PermissionStatus::Authorized,
            &EngineConfig::default(),
            &now,
        );
        assert!(verdict.is_valid());
        assert!(verdict.warnings.contains(&ValidationWarning::TimezoneAmbiguity));
    }

    #[test]
    fn ordinary_day_has_no_dst_warning() {
        let now = New_York.with_ymd_and_hms(2025, 6, 10, 6, 0, 0).unwrap();
        let a = alarm("a1", 7, 0, &[]);
        let verdict = validate(
            &a,
            &[],
            0,
            PermissionStatus::Authorized,
            &EngineConfig::default(),
            &now,
        );
        assert!(verdict.warnings.is_empty());
    }
}

