//! Engine orchestration and the serialized command loop.
//!
//! [`AlarmEngine`] owns the registration ledger, per-alarm lifecycle
//! states, and the snooze/timezone coordinators, and drives the external
//! gateway. [`AlarmEngine::spawn`] moves the engine into a tokio task
//! that drains commands in arrival order, so no two mutations of the
//! shared scheduling state ever interleave.

use crate::alarm::{AlarmDefinition, AlarmState};
use crate::config::EngineConfig;
use crate::error::{Result, SchedulingError};
use crate::events::{EngineEvent, EventSender};
use crate::gateway::{AlarmStore, AudioReadinessProvider, SchedulerGateway};
use crate::ledger::{ReconciliationStore, TriggerRegistration};
use crate::planner::plan;
use crate::snooze::SnoozeCoordinator;
use crate::timezone::TimezoneMonitor;
use crate::validate::{ValidationVerdict, validate};
use chrono::{DateTime, Local, TimeZone};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A mutation request processed by the serialized command loop.
#[derive(Debug)]
pub enum EngineCommand {
    /// Create or reschedule registrations for an alarm.
    Schedule(AlarmDefinition),
    /// Remove an alarm's registrations.
    Cancel(String),
    /// Reconcile the ledger against the host's pending set.
    Refresh,
    /// Snooze a firing alarm.
    Snooze {
        /// Owning alarm id.
        alarm_id: String,
        /// Snooze duration; `None` uses the alarm's policy duration,
        /// falling back to the configured default.
        duration: Option<Duration>,
    },
    /// Dismiss a firing alarm.
    Dismiss(String),
    /// React to a reported timezone identifier.
    TimezoneChanged(String),
}

/// Cloneable handle for submitting commands to a spawned engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    /// Submit a command. Returns `false` when the engine has stopped.
    pub fn send(&self, command: EngineCommand) -> bool {
        self.tx.send(command).is_ok()
    }
}

/// The scheduling and reconciliation engine.
///
/// All collaborators are injected; the engine holds no process-wide
/// globals and reads no ambient clock outside the `Local::now()` entry
/// wrappers.
pub struct AlarmEngine {
    config: EngineConfig,
    store: Arc<dyn AlarmStore>,
    gateway: Arc<dyn SchedulerGateway>,
    audio: Option<Arc<dyn AudioReadinessProvider>>,
    events: EventSender,
    ledger: ReconciliationStore,
    snooze: SnoozeCoordinator,
    timezone: TimezoneMonitor,
    states: HashMap<String, AlarmState>,
}

impl AlarmEngine {
    /// Create an engine anchored at the given timezone identifier.
    pub fn new(
        store: Arc<dyn AlarmStore>,
        gateway: Arc<dyn SchedulerGateway>,
        events: EventSender,
        zone_id: impl Into<String>,
    ) -> Self {
        Self {
            config: EngineConfig::default(),
            store,
            gateway,
            audio: None,
            events,
            ledger: ReconciliationStore::new(),
            snooze: SnoozeCoordinator::new(),
            timezone: TimezoneMonitor::new(zone_id),
            states: HashMap::new(),
        }
    }

    /// Override the default configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach an optional content-generation collaborator.
    pub fn with_audio_provider(mut self, provider: Arc<dyn AudioReadinessProvider>) -> Self {
        self.audio = Some(provider);
        self
    }

    /// Lifecycle state of an alarm as last tracked by the engine.
    pub fn alarm_state(&self, alarm_id: &str) -> AlarmState {
        self.states
            .get(alarm_id)
            .copied()
            .unwrap_or(AlarmState::Unscheduled)
    }

    /// Read access to the registration ledger.
    pub fn ledger(&self) -> &ReconciliationStore {
        &self.ledger
    }

    /// Schedule an alarm using the current local clock.
    pub async fn schedule(&mut self, alarm: &AlarmDefinition) -> Result<ValidationVerdict> {
        self.schedule_at(alarm, &Local::now()).await
    }

    /// Schedule (or reschedule) an alarm at an explicit `now`.
    ///
    /// Validates first and aborts with [`SchedulingError::Rejected`]
    /// before any gateway call when blocking issues exist. On success the
    /// alarm's previous registrations are removed and the freshly planned
    /// set is registered; the returned verdict may carry warnings.
    pub async fn schedule_at<Tz: TimeZone>(
        &mut self,
        alarm: &AlarmDefinition,
        now: &DateTime<Tz>,
    ) -> Result<ValidationVerdict> {
        let op_id = Uuid::new_v4();
        info!(op_id = %op_id, alarm = %alarm.id, "scheduling alarm");

        let alarm = self.ensure_content(alarm).await;

        if !alarm.enabled {
            debug!(alarm = %alarm.id, "alarm disabled, removing registrations");
            self.cancel(&alarm.id).await;
            return Ok(ValidationVerdict::default());
        }

        let pending = self.gateway.list_pending().await?;
        // The alarm's own live entries are removed before new ones are
        // added, so they must not count against capacity.
        let own_pending = pending
            .iter()
            .filter(|id| crate::alarm::identifier_belongs_to(id, &alarm.id))
            .count();
        let pending_count = pending.len() - own_pending;

        let peers: Vec<AlarmDefinition> = self
            .store
            .enabled_alarms()
            .await?
            .into_iter()
            .filter(|other| other.id != alarm.id)
            .collect();
        let permission = self.gateway.permission_status().await;

        let verdict = validate(&alarm, &peers, pending_count, permission, &self.config, now);
        if !verdict.is_valid() {
            info!(op_id = %op_id, alarm = %alarm.id, verdict = %verdict, "validation rejected");
            return Err(SchedulingError::Rejected(verdict));
        }

        // Remove-then-add: old entries go first so a retried reschedule
        // can never leave duplicates. Host-side entries the ledger does
        // not know (e.g. from a previous process) are removed as well.
        self.remove_registrations(&alarm.id).await;
        for identifier in &pending {
            if crate::alarm::identifier_belongs_to(identifier, &alarm.id) {
                self.gateway.unregister(identifier).await;
            }
        }

        let specs = plan(&alarm, now);
        for spec in &specs {
            if let Err(e) = self.gateway.register(spec).await {
                warn!(op_id = %op_id, alarm = %alarm.id, identifier = %spec.identifier, error = %e, "registration call failed");
                self.states.insert(alarm.id.clone(), AlarmState::Failed);
                self.emit(EngineEvent::RegistrationFailed {
                    alarm_id: alarm.id.clone(),
                    reason: e.to_string(),
                });
                return Err(e);
            }
            self.ledger.add(TriggerRegistration::from_spec(spec));
        }

        self.states.insert(alarm.id.clone(), AlarmState::Scheduled);
        self.emit(EngineEvent::Scheduled {
            alarm_id: alarm.id.clone(),
            registrations: specs.len(),
        });
        debug!(op_id = %op_id, alarm = %alarm.id, registrations = specs.len(), "alarm scheduled");
        Ok(verdict)
    }

    /// Remove every registration for an alarm.
    pub async fn cancel(&mut self, alarm_id: &str) {
        self.remove_registrations(alarm_id).await;
        self.snooze.reset(alarm_id);
        self.states.insert(alarm_id.to_owned(), AlarmState::Cancelled);
        self.emit(EngineEvent::Cancelled {
            alarm_id: alarm_id.to_owned(),
        });
    }

    /// Reconcile the ledger against the host's pending set.
    ///
    /// Tracked entries absent from the pending listing are inferred as
    /// fired. Repeating alarms stay scheduled (their other weekday
    /// entries are untouched); a consumed one-time alarm returns to
    /// unscheduled. Returns the ids of alarms inferred as triggered.
    pub async fn refresh(&mut self) -> Result<Vec<String>> {
        let pending = self.gateway.list_pending().await?;
        let triggered = self.ledger.refresh(&pending);

        let mut alarm_ids: Vec<String> = Vec::new();
        for entry in &triggered {
            if !alarm_ids.contains(&entry.alarm_id) {
                alarm_ids.push(entry.alarm_id.clone());
            }
        }

        for alarm_id in &alarm_ids {
            // A base occurrence firing starts a new trigger cycle and
            // restores the snooze allowance. A snooze one-shot firing
            // continues the current cycle, so the per-cycle count keeps
            // binding.
            let new_cycle = triggered
                .iter()
                .any(|entry| entry.alarm_id == *alarm_id && !entry.is_snooze());
            if new_cycle {
                self.snooze.reset(alarm_id);
            }
            self.emit(EngineEvent::Triggered {
                alarm_id: alarm_id.clone(),
            });

            let still_live = !self.ledger.live_identifiers_for(alarm_id).is_empty();
            let next = if still_live {
                AlarmState::Scheduled
            } else {
                AlarmState::Unscheduled
            };
            self.states.insert(alarm_id.clone(), next);
            info!(alarm = %alarm_id, state = ?next, "alarm trigger inferred");
        }

        Ok(alarm_ids)
    }

    /// Snooze a firing alarm using the current local clock.
    pub async fn snooze(&mut self, alarm_id: &str, duration: Option<Duration>) -> Result<()> {
        self.snooze_at(alarm_id, duration, &Local::now()).await
    }

    /// Snooze a firing alarm: one new one-shot at `now + duration`.
    ///
    /// Without an explicit `duration` the alarm's policy duration is
    /// used, or the configured default when the policy carries none.
    /// Recurring registrations are left untouched, so the next weekday
    /// occurrence stays armed.
    pub async fn snooze_at<Tz: TimeZone>(
        &mut self,
        alarm_id: &str,
        duration: Option<Duration>,
        now: &DateTime<Tz>,
    ) -> Result<()> {
        let alarm = self.lookup_alarm(alarm_id).await?;
        let duration = duration.unwrap_or_else(|| self.snooze_duration_for(&alarm));
        let spec = self.snooze.plan_snooze(&alarm, duration, now)?;
        self.gateway.register(&spec).await?;
        self.ledger.add(TriggerRegistration::from_spec(&spec));
        self.states.insert(alarm.id.clone(), AlarmState::Scheduled);
        self.emit(EngineEvent::Snoozed {
            alarm_id: alarm.id.clone(),
            until: spec.fire_at,
        });
        info!(alarm = %alarm_id, until = %spec.fire_at, "alarm snoozed");
        Ok(())
    }

    /// Dismiss a firing alarm.
    ///
    /// A repeating alarm keeps all its registrations; tomorrow still
    /// fires. A consumed one-time alarm is written back to the store as
    /// disabled and its registrations are removed.
    pub async fn dismiss(&mut self, alarm_id: &str) -> Result<()> {
        let mut alarm = self.lookup_alarm(alarm_id).await?;
        self.snooze.reset(alarm_id);

        if alarm.is_repeating() {
            self.emit(EngineEvent::Dismissed {
                alarm_id: alarm_id.to_owned(),
            });
            return Ok(());
        }

        alarm.enabled = false;
        self.store.update(&alarm).await?;
        self.remove_registrations(alarm_id).await;
        self.states
            .insert(alarm_id.to_owned(), AlarmState::Unscheduled);
        self.emit(EngineEvent::Dismissed {
            alarm_id: alarm_id.to_owned(),
        });
        Ok(())
    }

    /// React to a reported timezone identifier.
    ///
    /// An unchanged zone is a no-op with zero gateway calls; a changed
    /// zone triggers exactly one full rebuild pass.
    pub async fn handle_timezone_change(&mut self, zone_id: &str) -> Result<()> {
        if !self.timezone.observe(zone_id) {
            return Ok(());
        }
        self.rebuild_all().await
    }

    /// Rebuild every registration using the current local clock.
    pub async fn rebuild_all(&mut self) -> Result<()> {
        self.rebuild_all_at(&Local::now()).await
    }

    /// Drop all registrations and reschedule every enabled alarm.
    ///
    /// Best-effort: a single alarm's registration failure is logged and
    /// skipped, and the rebuild continues with the rest.
    pub async fn rebuild_all_at<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Result<()> {
        info!("rebuilding all registrations");
        self.gateway.unregister_all().await;
        self.ledger.clear();

        let alarms = self.store.enabled_alarms().await?;
        let mut rescheduled = 0usize;
        let mut failed = 0usize;

        'alarms: for alarm in &alarms {
            let specs = plan(alarm, now);
            for spec in &specs {
                if let Err(e) = self.gateway.register(spec).await {
                    warn!(alarm = %alarm.id, identifier = %spec.identifier, error = %e, "rebuild registration failed, skipping alarm");
                    self.states.insert(alarm.id.clone(), AlarmState::Failed);
                    self.emit(EngineEvent::RegistrationFailed {
                        alarm_id: alarm.id.clone(),
                        reason: e.to_string(),
                    });
                    failed += 1;
                    continue 'alarms;
                }
                self.ledger.add(TriggerRegistration::from_spec(spec));
            }
            self.states.insert(alarm.id.clone(), AlarmState::Scheduled);
            rescheduled += 1;
        }

        info!(rescheduled, failed, "rebuild finished");
        self.emit(EngineEvent::RebuildCompleted {
            rescheduled,
            failed,
        });
        Ok(())
    }

    /// Move the engine into a tokio task that processes commands in
    /// arrival order. Errors inside the loop are logged and surfaced as
    /// events; they never stop the loop.
    pub fn spawn(mut self) -> (EngineHandle, tokio::task::JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let join = tokio::spawn(async move {
            info!("alarm engine started");
            while let Some(command) = rx.recv().await {
                self.handle_command(command).await;
            }
            debug!("engine command channel closed, stopping");
        });
        (EngineHandle { tx }, join)
    }

    async fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Schedule(alarm) => {
                if let Err(e) = self.schedule(&alarm).await {
                    warn!(alarm = %alarm.id, error = %e, "schedule command failed");
                }
            }
            EngineCommand::Cancel(alarm_id) => self.cancel(&alarm_id).await,
            EngineCommand::Refresh => {
                if let Err(e) = self.refresh().await {
                    warn!(error = %e, "refresh command failed");
                }
            }
            EngineCommand::Snooze { alarm_id, duration } => {
                if let Err(e) = self.snooze(&alarm_id, duration).await {
                    warn!(alarm = %alarm_id, error = %e, "snooze command failed");
                }
            }
            EngineCommand::Dismiss(alarm_id) => {
                if let Err(e) = self.dismiss(&alarm_id).await {
                    warn!(alarm = %alarm_id, error = %e, "dismiss command failed");
                }
            }
            EngineCommand::TimezoneChanged(zone_id) => {
                if let Err(e) = self.handle_timezone_change(&zone_id).await {
                    warn!(zone = %zone_id, error = %e, "timezone rebuild failed");
                }
            }
        }
    }

    /// Run the optional content-generation step; failure is logged and
    /// scheduling proceeds with the original definition.
    async fn ensure_content(&self, alarm: &AlarmDefinition) -> AlarmDefinition {
        let Some(provider) = &self.audio else {
            return alarm.clone();
        };
        match provider.ensure_content(alarm).await {
            Ok(updated) => updated,
            Err(e) => {
                warn!(alarm = %alarm.id, error = %e, "content generation failed, scheduling with fallback");
                alarm.clone()
            }
        }
    }

    /// Unregister and forget every entry derived from `alarm_id`.
    async fn remove_registrations(&mut self, alarm_id: &str) {
        let identifiers = self.ledger.remove_alarm(alarm_id);
        for identifier in &identifiers {
            self.gateway.unregister(identifier).await;
        }
        if !identifiers.is_empty() {
            debug!(alarm = %alarm_id, removed = identifiers.len(), "registrations removed");
        }
    }

    /// Snooze duration fallback chain: the alarm's policy duration, then
    /// the configured default when the policy carries none.
    fn snooze_duration_for(&self, alarm: &AlarmDefinition) -> Duration {
        if alarm.snooze.duration_secs > 0 {
            Duration::from_secs(alarm.snooze.duration_secs)
        } else {
            Duration::from_secs(self.config.default_snooze_secs)
        }
    }

    async fn lookup_alarm(&self, alarm_id: &str) -> Result<AlarmDefinition> {
        self.store
            .enabled_alarms()
            .await?
            .into_iter()
            .find(|alarm| alarm.id == alarm_id)
            .ok_or_else(|| SchedulingError::Store(format!("unknown alarm {alarm_id}")))
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            debug!("event receiver dropped, discarding event");
        }
    }
}
