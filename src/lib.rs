//! Reveille: alarm scheduling and reconciliation engine.
//!
//! Turns user-editable alarm definitions into concrete, conflict-free
//! trigger registrations in a capacity-limited host scheduler, and keeps
//! its view of "what will fire" synchronized with what that scheduler
//! actually reports.
//!
//! # Architecture
//!
//! The engine is a pure in-process orchestration layer built from small
//! components:
//! - **Planner**: computes one-time and per-weekday trigger specs
//! - **Validator**: permission, past-time, capacity, conflict, and DST
//!   checks composed into a verdict
//! - **Ledger**: tracks registrations and infers firings from the host's
//!   pending set (pull-based reconciliation)
//! - **Engine**: serialized command loop driving the external gateway
//!
//! The host scheduler, alarm catalog, and content generation are external
//! collaborators injected via the traits in [`gateway`]; status changes
//! flow back to the embedding application as [`events::EngineEvent`]s.

pub mod alarm;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod events;
pub mod gateway;
pub mod ledger;
pub mod planner;
pub mod snooze;
pub mod timezone;
pub mod validate;

pub use alarm::{AlarmDefinition, AlarmState, ClockTime, SnoozePolicy};
pub use config::EngineConfig;
pub use engine::{AlarmEngine, EngineCommand, EngineHandle};
pub use error::{Result, SchedulingError};
pub use events::{EngineEvent, EventReceiver, EventSender, event_channel};
pub use gateway::{AlarmStore, AudioReadinessProvider, PermissionStatus, SchedulerGateway};
pub use ledger::{ReconciliationStore, RegistrationStatus, TriggerRegistration};
pub use planner::TriggerSpec;
pub use validate::{ValidationIssue, ValidationVerdict, ValidationWarning};
