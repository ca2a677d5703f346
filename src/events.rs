//! Typed event channel between the engine and the embedding application.
//!
//! The engine writes discrete events to an unbounded mpsc sender; the
//! presentation layer owns the receiver. Delivery order equals emission
//! order, and a closed receiver is tolerated (events are then dropped).

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Status change published by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Registrations for an alarm were created.
    Scheduled {
        /// Owning alarm id.
        alarm_id: String,
        /// Number of registrations created.
        registrations: usize,
    },
    /// Reconciliation inferred that an alarm fired.
    Triggered {
        /// Owning alarm id.
        alarm_id: String,
    },
    /// A snooze one-shot was registered.
    Snoozed {
        /// Owning alarm id.
        alarm_id: String,
        /// When the snooze fires.
        until: DateTime<Utc>,
    },
    /// The user dismissed a firing alarm.
    Dismissed {
        /// Owning alarm id.
        alarm_id: String,
    },
    /// An alarm's registrations were explicitly removed.
    Cancelled {
        /// Owning alarm id.
        alarm_id: String,
    },
    /// A registration call failed; the alarm is marked failed, not retried.
    RegistrationFailed {
        /// Owning alarm id.
        alarm_id: String,
        /// Gateway error description.
        reason: String,
    },
    /// A timezone-change rebuild finished.
    RebuildCompleted {
        /// Alarms successfully rescheduled.
        rescheduled: usize,
        /// Alarms skipped after a registration failure.
        failed: usize,
    },
}

/// Sending half of the engine's event channel.
pub type EventSender = mpsc::UnboundedSender<EngineEvent>;

/// Receiving half, owned by the presentation layer.
pub type EventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Create the engine event channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
