//! Error types for the alarm scheduling engine.

use crate::validate::ValidationVerdict;

/// Top-level error type for scheduling and reconciliation operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    /// A raw time value could not be normalized into a valid hour/minute pair.
    #[error("invalid time configuration: hour {hour}, minute {minute}")]
    InvalidTimeConfiguration {
        /// Raw hour component as received.
        hour: i64,
        /// Raw minute component as received.
        minute: i64,
    },

    /// The host scheduler gateway could not be reached.
    #[error("scheduler gateway unavailable")]
    GatewayUnavailable,

    /// The host scheduler rejected a registration call.
    #[error("registration failed: {0}")]
    RegistrationFailed(String),

    /// The host scheduler's registration capacity is exhausted.
    #[error("host scheduler registration limit exceeded")]
    LimitExceeded,

    /// The local time could not be resolved consistently across a zone change.
    #[error("timezone conflict while resolving local time")]
    TimezoneConflict,

    /// Notification permission is not granted.
    #[error("notification permission denied")]
    PermissionDenied,

    /// Validation found blocking issues; no gateway call was made.
    #[error("validation rejected: {0}")]
    Rejected(ValidationVerdict),

    /// The alarm's snooze policy does not allow snoozing.
    #[error("snooze disabled for alarm {0}")]
    SnoozeDisabled(String),

    /// The alarm has used up its snooze allowance for this cycle.
    #[error("snooze limit reached for alarm {0}")]
    SnoozeLimitReached(String),

    /// The external alarm store failed a read or update.
    #[error("alarm store error: {0}")]
    Store(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, SchedulingError>;
