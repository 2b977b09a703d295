//! Alarm engine facade.
//!
//! Wires the store, gateway, sessions and coordinator together and exposes
//! the edit flow, the fired-job dispatch and boot recovery.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::alarm::{compute_next_trigger, initial_trigger, Alarm, AlarmDraft};
use crate::clock::Clock;
use crate::coordinator::{TriggerCoordinator, TriggerOutcome};
use crate::error::{CoreError, Result};
use crate::scheduling::{DeferredExecutor, JobPayload, ScheduleOutcome, SchedulingGateway};
use crate::session::{Platform, SessionManager};
use crate::storage::{AlarmStore, EngineSettings};
use crate::util::lock;

/// Everything the engine needs from its host.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn AlarmStore>,
    pub executor: Arc<dyn DeferredExecutor>,
    pub clock: Arc<dyn Clock>,
    pub platform: Platform,
}

/// Summary of a re-arm sweep over the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// Alarms with a live job afterwards.
    pub scheduled: Vec<i64>,
    /// Enabled alarms whose firing already passed.
    pub stale: Vec<i64>,
    /// Alarms whose jobs were dropped because they are disabled or deleted.
    pub cancelled: Vec<i64>,
    /// `(alarm_id, error)` for alarms the executor refused.
    pub failed: Vec<(i64, String)>,
}

impl RecoveryReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct AlarmEngine {
    store: Arc<dyn AlarmStore>,
    clock: Arc<dyn Clock>,
    gateway: Arc<SchedulingGateway>,
    sessions: Arc<SessionManager>,
    coordinator: TriggerCoordinator,
    synced: Mutex<HashSet<i64>>,
}

impl AlarmEngine {
    pub fn new(collaborators: Collaborators, settings: &EngineSettings) -> Self {
        let Collaborators {
            store,
            executor,
            clock,
            platform,
        } = collaborators;

        let gateway = Arc::new(SchedulingGateway::new(executor, clock.clone(), settings));
        let presenter = platform.presenter.clone();
        let sessions = SessionManager::new(
            store.clone(),
            gateway.clone(),
            clock.clone(),
            platform,
            settings.auto_snooze_window,
        );
        let coordinator = TriggerCoordinator::new(
            store.clone(),
            gateway.clone(),
            sessions.clone(),
            presenter,
            clock.clone(),
        );

        Self {
            store,
            clock,
            gateway,
            sessions,
            coordinator,
            synced: Mutex::new(HashSet::new()),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn gateway(&self) -> &Arc<SchedulingGateway> {
        &self.gateway
    }

    pub fn store(&self) -> &Arc<dyn AlarmStore> {
        &self.store
    }

    // === Edit flow ===

    /// Persist a new alarm and arm it.
    ///
    /// On `PermissionDenied` the alarm is already saved; call
    /// [`reschedule`](Self::reschedule) once the user grants consent.
    pub async fn create_alarm(&self, draft: &AlarmDraft) -> Result<Alarm> {
        draft.validate()?;
        let mut alarm = draft.to_alarm();
        self.arm(&mut alarm);
        alarm.id = self.store.insert(&alarm).await?;
        info!(alarm_id = alarm.id, time = %alarm.time_label(), days = %alarm.days, "alarm created");
        self.apply_schedule(&alarm).await?;
        Ok(alarm)
    }

    /// Replace the user-editable fields of alarm `id` and re-arm it.
    pub async fn update_alarm(&self, id: i64, draft: &AlarmDraft) -> Result<Alarm> {
        draft.validate()?;
        let mut alarm = self.require(id).await?;
        let before = (alarm.hour, alarm.minute, alarm.days);
        draft.apply_to(&mut alarm);
        if !alarm.enabled || before != (alarm.hour, alarm.minute, alarm.days) {
            self.silence(id).await;
        }
        self.arm(&mut alarm);
        self.store.update(&alarm).await?;
        info!(alarm_id = id, time = %alarm.time_label(), days = %alarm.days, "alarm updated");
        self.apply_schedule(&alarm).await?;
        Ok(alarm)
    }

    pub async fn set_enabled(&self, id: i64, enabled: bool) -> Result<Alarm> {
        let mut alarm = self.require(id).await?;
        alarm.enabled = enabled;
        if enabled {
            self.arm(&mut alarm);
        } else {
            self.silence(id).await;
        }
        self.store.update(&alarm).await?;
        info!(alarm_id = id, enabled, "alarm toggled");
        self.apply_schedule(&alarm).await?;
        Ok(alarm)
    }

    /// Delete alarm `id`, silencing it if it is ringing. Unknown ids are a
    /// no-op.
    pub async fn delete_alarm(&self, id: i64) -> Result<()> {
        self.gateway.cancel_alarm(id).await?;
        self.sessions.dismiss(id).await;
        self.store.delete(id).await?;
        info!(alarm_id = id, "alarm deleted");
        Ok(())
    }

    /// Re-run scheduling for alarm `id` as stored.
    pub async fn reschedule(&self, id: i64) -> Result<ScheduleOutcome> {
        let alarm = self.require(id).await?;
        self.gateway.schedule_alarm(&alarm).await
    }

    pub async fn alarm(&self, id: i64) -> Result<Option<Alarm>> {
        self.store.get_by_id(id).await
    }

    pub async fn alarms(&self) -> Result<Vec<Alarm>> {
        self.store.list_all().await
    }

    async fn require(&self, id: i64) -> Result<Alarm> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or(CoreError::NotFound(id))
    }

    /// Fresh arming from the edit flow: next firing from now with stale
    /// one-shots rolled forward, counters cleared.
    fn arm(&self, alarm: &mut Alarm) {
        let now = self.clock.now();
        alarm.next_fire_at =
            initial_trigger(alarm.hour, alarm.minute, alarm.days, &now).timestamp_millis();
        alarm.auto_snooze_count = 0;
        alarm.upcoming_shown = false;
    }

    /// End a ringing session before an edit its watcher would otherwise
    /// overwrite.
    async fn silence(&self, id: i64) {
        if self.sessions.dismiss(id).await {
            info!(alarm_id = id, "ringing session dismissed by edit");
        }
    }

    async fn apply_schedule(&self, alarm: &Alarm) -> Result<()> {
        if alarm.enabled {
            self.gateway.schedule_alarm(alarm).await?;
        } else {
            self.gateway.cancel_alarm(alarm.id).await?;
        }
        Ok(())
    }

    // === Triggers and user actions ===

    pub async fn dispatch(&self, payload: JobPayload) -> Result<TriggerOutcome> {
        self.coordinator.handle(payload).await
    }

    pub async fn stop(&self, alarm_id: i64) -> Result<bool> {
        self.sessions.stop(alarm_id).await
    }

    pub async fn snooze(&self, alarm_id: i64) -> Result<bool> {
        self.sessions.snooze(alarm_id).await
    }

    /// Drain fired jobs, handling each on its own task until the channel
    /// closes. A failing job is logged and never affects the others.
    pub async fn run(self: Arc<Self>, mut fired: mpsc::UnboundedReceiver<JobPayload>) {
        while let Some(payload) = fired.recv().await {
            let engine = Arc::clone(&self);
            tokio::spawn(async move {
                match engine.dispatch(payload).await {
                    Ok(outcome) => debug!(alarm_id = payload.alarm_id, ?outcome, "job handled"),
                    Err(e) if e.is_not_found() => {
                        debug!(alarm_id = payload.alarm_id, "alarm vanished mid-trigger")
                    }
                    Err(e) => warn!(
                        alarm_id = payload.alarm_id,
                        kind = %payload.kind,
                        error = %e,
                        "job failed"
                    ),
                }
            });
        }
        debug!("fired-job channel closed");
    }

    // === Recovery ===

    /// Re-arm every enabled alarm as stored, without recomputing firings.
    /// Stale alarms are reported and left for the next natural trigger.
    pub async fn recover_on_boot(&self) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();
        for alarm in self.store.list_enabled().await? {
            self.record(&mut report, &alarm).await;
        }
        info!(
            scheduled = report.scheduled.len(),
            stale = report.stale.len(),
            failed = report.failed.len(),
            "boot recovery finished"
        );
        Ok(report)
    }

    /// Bring the executor in line with the store: arm enabled alarms, drop
    /// jobs of alarms that were disabled or deleted since the last sweep.
    pub async fn resync(&self) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();
        let all = self.store.list_all().await?;
        let mut present = HashSet::with_capacity(all.len());

        let now_ms = self.clock.now_ms();
        for alarm in &all {
            present.insert(alarm.id);
            if alarm.enabled && alarm.is_recurring() && alarm.next_fire_at < now_ms {
                let caught_up = self.catch_up(alarm.clone()).await?;
                self.record(&mut report, &caught_up).await;
            } else if alarm.enabled {
                self.record(&mut report, alarm).await;
            } else {
                self.gateway.cancel_alarm(alarm.id).await?;
                report.cancelled.push(alarm.id);
            }
        }

        let vanished: Vec<i64> = lock(&self.synced).difference(&present).copied().collect();
        for id in vanished {
            self.gateway.cancel_alarm(id).await?;
            self.sessions.dismiss(id).await;
            report.cancelled.push(id);
        }
        *lock(&self.synced) = present;

        debug!(
            scheduled = report.scheduled.len(),
            cancelled = report.cancelled.len(),
            "store resync finished"
        );
        Ok(report)
    }

    /// Move a recurring alarm that missed its firing to its next occurrence.
    async fn catch_up(&self, mut alarm: Alarm) -> Result<Alarm> {
        let missed = alarm.next_fire_at;
        let now = self.clock.now();
        alarm.next_fire_at =
            compute_next_trigger(alarm.hour, alarm.minute, alarm.days, &now).timestamp_millis();
        alarm.upcoming_shown = false;
        self.store.update(&alarm).await?;
        info!(
            alarm_id = alarm.id,
            missed,
            next_fire_at = alarm.next_fire_at,
            "missed recurring alarm rolled forward"
        );
        Ok(alarm)
    }

    async fn record(&self, report: &mut RecoveryReport, alarm: &Alarm) {
        match self.gateway.schedule_alarm(alarm).await {
            Ok(ScheduleOutcome::Scheduled { .. }) => report.scheduled.push(alarm.id),
            Ok(ScheduleOutcome::Stale) => report.stale.push(alarm.id),
            Ok(ScheduleOutcome::Disabled) => {}
            Err(e) => {
                warn!(alarm_id = alarm.id, error = %e, "could not re-arm alarm");
                report.failed.push((alarm.id, e.to_string()));
            }
        }
    }
}
