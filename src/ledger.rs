//! In-memory registration ledger and pull-based reconciliation.
//!
//! The store tracks every registration the engine has made against the
//! host scheduler and infers status changes by comparing its entries to
//! the host's currently pending identifier set. Status is never pushed;
//! a firing is inferred from absence.

use crate::alarm::identifier_belongs_to;
use crate::planner::TriggerSpec;
use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Lifecycle status of a single registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    /// Registered with the host, not yet seen in a pending listing.
    Scheduled,
    /// Confirmed present in the host's pending set.
    Pending,
    /// Inferred fired: the host no longer lists the identifier.
    Triggered,
    /// The registration call failed.
    Failed,
    /// Explicitly removed.
    Cancelled,
}

/// One tracked registration in the host scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRegistration {
    /// Deterministic identifier, derived from the alarm id.
    pub identifier: String,
    /// Owning alarm id.
    pub alarm_id: String,
    /// Estimated firing instant.
    pub fire_at: DateTime<Utc>,
    /// Whether the host re-arms this trigger weekly.
    pub repeating: bool,
    /// Weekday for recurring entries.
    pub weekday: Option<Weekday>,
    /// Current lifecycle status; advanced only by reconciliation.
    pub status: RegistrationStatus,
}

impl TriggerRegistration {
    /// Build a freshly scheduled entry from a planned spec.
    pub fn from_spec(spec: &TriggerSpec) -> Self {
        Self {
            identifier: spec.identifier.clone(),
            alarm_id: spec.alarm_id.clone(),
            fire_at: spec.fire_at,
            repeating: spec.repeats,
            weekday: spec.weekday,
            status: RegistrationStatus::Scheduled,
        }
    }

    /// Whether the entry still occupies a host scheduler slot.
    pub fn is_live(&self) -> bool {
        matches!(
            self.status,
            RegistrationStatus::Scheduled | RegistrationStatus::Pending
        )
    }

    /// Whether the entry is a snooze one-shot rather than a base
    /// occurrence of the alarm.
    pub fn is_snooze(&self) -> bool {
        self.identifier
            .strip_prefix(self.alarm_id.as_str())
            .is_some_and(|rest| rest.starts_with("-snooze-"))
    }
}

/// Ledger of registrations, reconciled against the host's pending set.
#[derive(Debug, Default)]
pub struct ReconciliationStore {
    entries: Vec<TriggerRegistration>,
}

impl ReconciliationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a registration, replacing any existing entry with the same
    /// identifier. Replacement keeps a retried add idempotent.
    pub fn add(&mut self, entry: TriggerRegistration) {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.identifier == entry.identifier)
        {
            *existing = entry;
        } else {
            self.entries.push(entry);
        }
    }

    /// Remove every entry derived from `alarm_id`, across weekday and
    /// snooze suffixes, returning the removed identifiers.
    pub fn remove_alarm(&mut self, alarm_id: &str) -> Vec<String> {
        let mut removed = Vec::new();
        self.entries.retain(|entry| {
            if identifier_belongs_to(&entry.identifier, alarm_id) {
                removed.push(entry.identifier.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Drop every tracked entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// All tracked entries.
    pub fn entries(&self) -> &[TriggerRegistration] {
        &self.entries
    }

    /// Entries derived from `alarm_id`.
    pub fn entries_for(&self, alarm_id: &str) -> Vec<&TriggerRegistration> {
        self.entries
            .iter()
            .filter(|e| identifier_belongs_to(&e.identifier, alarm_id))
            .collect()
    }

    /// Identifiers of live entries derived from `alarm_id`.
    pub fn live_identifiers_for(&self, alarm_id: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.is_live() && identifier_belongs_to(&e.identifier, alarm_id))
            .map(|e| e.identifier.clone())
            .collect()
    }

    /// Count of entries currently occupying host scheduler slots.
    pub fn live_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_live()).count()
    }

    /// Reconcile tracked entries against the host's pending set.
    ///
    /// Live entries absent from `pending` transition to `Triggered`;
    /// entries confirmed present advance `Scheduled → Pending`. Repeated
    /// calls with an unchanged set make no further transitions. Absence
    /// cannot distinguish a firing from an external cancellation; both
    /// read as `Triggered` here.
    pub fn refresh(&mut self, pending: &HashSet<String>) -> Vec<TriggerRegistration> {
        let mut triggered = Vec::new();
        for entry in &mut self.entries {
            if !entry.is_live() {
                continue;
            }
            if pending.contains(&entry.identifier) {
                entry.status = RegistrationStatus::Pending;
            } else {
                debug!(identifier = %entry.identifier, "registration absent from pending set, inferring fired");
                entry.status = RegistrationStatus::Triggered;
                triggered.push(entry.clone());
            }
        }
        triggered
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::TimeZone;

    fn entry(identifier: &str, alarm_id: &str, repeating: bool) -> TriggerRegistration {
        TriggerRegistration {
            identifier: identifier.to_owned(),
            alarm_id: alarm_id.to_owned(),
            fire_at: Utc.with_ymd_and_hms(2025, 3, 3, 7, 0, 0).unwrap(),
            repeating,
            weekday: None,
            status: RegistrationStatus::Scheduled,
        }
    }

    fn pending(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn add_replaces_same_identifier() {
        let mut store = ReconciliationStore::new();
        store.add(entry("a1-mon", "a1", true));
        store.add(entry("a1-mon", "a1", true));
        assert_eq!(store.entries().len(), 1);
    }

    #[test]
    fn remove_alarm_takes_all_suffixes_and_spares_prefix_neighbors() {
        let mut store = ReconciliationStore::new();
        store.add(entry("a1-mon", "a1", true));
        store.add(entry("a1-wed", "a1", true));
        store.add(entry("a1-snooze-123", "a1", false));
        store.add(entry("a10", "a10", false));

        let removed = store.remove_alarm("a1");
        assert_eq!(removed.len(), 3);
        assert!(store.entries_for("a1").is_empty());
        assert_eq!(store.entries().len(), 1);
        assert_eq!(store.entries()[0].identifier, "a10");
    }

    #[test]
    fn snooze_entries_are_recognized_by_identifier() {
        assert!(entry("a1-snooze-1741000000000", "a1", false).is_snooze());
        assert!(!entry("a1-mon", "a1", true).is_snooze());
        assert!(!entry("a1", "a1", false).is_snooze());
    }

    #[test]
    fn refresh_infers_triggered_from_absence() {
        let mut store = ReconciliationStore::new();
        store.add(entry("a1-mon", "a1", true));
        store.add(entry("a2", "a2", false));

        let triggered = store.refresh(&pending(&["a1-mon"]));
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].identifier, "a2");
        assert_eq!(store.entries_for("a1")[0].status, RegistrationStatus::Pending);
        assert_eq!(
            store.entries_for("a2")[0].status,
            RegistrationStatus::Triggered
        );
    }

    #[test]
    fn refresh_is_idempotent_for_unchanged_pending_set() {
        let mut store = ReconciliationStore::new();
        store.add(entry("a1-mon", "a1", true));
        store.add(entry("a2", "a2", false));

        let set = pending(&["a1-mon"]);
        let first = store.refresh(&set);
        assert_eq!(first.len(), 1);
        let second = store.refresh(&set);
        assert!(second.is_empty());
    }

    #[test]
    fn live_count_excludes_triggered_entries() {
        let mut store = ReconciliationStore::new();
        store.add(entry("a1-mon", "a1", true));
        store.add(entry("a2", "a2", false));
        assert_eq!(store.live_count(), 2);

        store.refresh(&pending(&["a1-mon"]));
        assert_eq!(store.live_count(), 1);
    }
}
