//! Trigger coordinator: the single entry point for fired jobs.

use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{debug, info};

use crate::alarm::{compute_next_trigger, Alarm};
use crate::clock::Clock;
use crate::error::Result;
use crate::scheduling::{JobPayload, SchedulingGateway, TriggerKind};
use crate::session::{NotificationPresenter, SessionManager};
use crate::storage::AlarmStore;

/// How far ahead of its firing, in milliseconds, a MAIN job may be
/// delivered and still count as that firing.
const EARLY_DELIVERY_TOLERANCE_MS: i64 = 60_000;

/// What handling one fired job did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The alarm is gone or disabled.
    Skipped,
    UpcomingShown,
    /// The reminder was already shown for this firing.
    UpcomingDuplicate,
    /// The alarm rang. Recurring alarms carry their re-armed firing.
    Rang { next_fire_at: Option<i64> },
}

pub struct TriggerCoordinator {
    store: Arc<dyn AlarmStore>,
    gateway: Arc<SchedulingGateway>,
    sessions: Arc<SessionManager>,
    presenter: Arc<dyn NotificationPresenter>,
    clock: Arc<dyn Clock>,
}

impl TriggerCoordinator {
    pub fn new(
        store: Arc<dyn AlarmStore>,
        gateway: Arc<SchedulingGateway>,
        sessions: Arc<SessionManager>,
        presenter: Arc<dyn NotificationPresenter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            gateway,
            sessions,
            presenter,
            clock,
        }
    }

    pub async fn handle(&self, payload: JobPayload) -> Result<TriggerOutcome> {
        debug!(alarm_id = payload.alarm_id, kind = %payload.kind, "job fired");
        match payload.kind {
            TriggerKind::Main => self.on_main(payload.alarm_id).await,
            TriggerKind::Upcoming => self.on_upcoming(payload.alarm_id).await,
        }
    }

    /// Load an alarm that is still allowed to fire.
    async fn load_enabled(&self, alarm_id: i64) -> Result<Option<Alarm>> {
        match self.store.get_by_id(alarm_id).await? {
            Some(alarm) if alarm.enabled => Ok(Some(alarm)),
            Some(_) => {
                debug!(alarm_id, "alarm disabled, job ignored");
                Ok(None)
            }
            None => {
                debug!(alarm_id, "alarm gone, job ignored");
                Ok(None)
            }
        }
    }

    async fn on_upcoming(&self, alarm_id: i64) -> Result<TriggerOutcome> {
        let Some(mut alarm) = self.load_enabled(alarm_id).await? else {
            return Ok(TriggerOutcome::Skipped);
        };
        if alarm.upcoming_shown {
            return Ok(TriggerOutcome::UpcomingDuplicate);
        }
        self.presenter.show_upcoming(&alarm).await;
        alarm.upcoming_shown = true;
        self.store.update(&alarm).await?;
        info!(alarm_id, "upcoming alarm notice shown");
        Ok(TriggerOutcome::UpcomingShown)
    }

    async fn on_main(&self, alarm_id: i64) -> Result<TriggerOutcome> {
        let Some(mut alarm) = self.load_enabled(alarm_id).await? else {
            return Ok(TriggerOutcome::Skipped);
        };

        self.presenter.cancel(alarm_id).await;
        self.sessions.start(alarm.clone()).await;

        if !alarm.is_recurring() {
            alarm.enabled = false;
            self.store.update(&alarm).await?;
            info!(alarm_id, "one-shot alarm fired and disabled");
            return Ok(TriggerOutcome::Rang { next_fire_at: None });
        }

        let reference = self.reference_instant(&alarm);
        alarm.next_fire_at =
            compute_next_trigger(alarm.hour, alarm.minute, alarm.days, &reference)
                .timestamp_millis();
        alarm.upcoming_shown = false;
        self.store.update(&alarm).await?;
        self.gateway.schedule_alarm(&alarm).await?;
        info!(alarm_id, next_fire_at = alarm.next_fire_at, "recurring alarm re-armed");
        Ok(TriggerOutcome::Rang {
            next_fire_at: Some(alarm.next_fire_at),
        })
    }

    /// Now, or the scheduled firing when the job arrived at most
    /// [`EARLY_DELIVERY_TOLERANCE_MS`] ahead of it. A firing further out was
    /// already moved past this occurrence by a rescan or an edit.
    fn reference_instant(&self, alarm: &Alarm) -> DateTime<Local> {
        let now = self.clock.now();
        let ahead = alarm.next_fire_at - now.timestamp_millis();
        match alarm.next_fire_at_utc() {
            Some(scheduled) if ahead > 0 && ahead <= EARLY_DELIVERY_TOLERANCE_MS => {
                scheduled.with_timezone(&Local)
            }
            _ => now,
        }
    }
}
