//! Collaborator contracts. The engine consumes these and never
//! implements them; the embedding application supplies adapters for its
//! platform's notification scheduler and alarm catalog.

use crate::alarm::AlarmDefinition;
use crate::error::Result;
use crate::planner::TriggerSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Notification-permission state reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    /// Permission granted; registrations will be delivered.
    Authorized,
    /// Permission refused.
    Denied,
    /// The user has not been asked yet.
    NotDetermined,
}

/// The host's capacity-limited trigger scheduler.
///
/// Registration capacity is a shared, global resource; `list_pending`
/// reports every pending identifier, including ones owned by other
/// subsystems sharing the scheduler.
#[async_trait]
pub trait SchedulerGateway: Send + Sync {
    /// Current notification-permission state.
    async fn permission_status(&self) -> PermissionStatus;

    /// Submit one trigger registration. The gateway owns its own timeout;
    /// the engine never retries a failed call.
    async fn register(&self, spec: &TriggerSpec) -> Result<()>;

    /// Remove one registration by identifier. Unknown identifiers are a
    /// no-op, which keeps removal idempotent.
    async fn unregister(&self, identifier: &str);

    /// Remove every registration.
    async fn unregister_all(&self);

    /// Identifiers of all currently pending registrations.
    async fn list_pending(&self) -> Result<HashSet<String>>;
}

/// The external alarm catalog.
#[async_trait]
pub trait AlarmStore: Send + Sync {
    /// All currently enabled alarms.
    async fn enabled_alarms(&self) -> Result<Vec<AlarmDefinition>>;

    /// Persist a changed alarm (e.g. a consumed one-time alarm written
    /// back as disabled).
    async fn update(&self, alarm: &AlarmDefinition) -> Result<()>;
}

/// Optional content-generation collaborator.
///
/// Failure here never aborts scheduling; the engine logs it and proceeds
/// with the alarm as-is.
#[async_trait]
pub trait AudioReadinessProvider: Send + Sync {
    /// Ensure the alarm's tone/content is generated, returning the
    /// (possibly updated) definition.
    async fn ensure_content(&self, alarm: &AlarmDefinition) -> Result<AlarmDefinition>;
}
