//! Scheduling gateway.
//!
//! The only component that talks to the deferred executor. Every arm is
//! cancel-then-enqueue under the alarm's tag, so at most one MAIN job is
//! live per alarm id no matter how often an alarm is (re)scheduled.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::executor::{job_tag, DeferredExecutor, JobPayload, TriggerKind};
use crate::alarm::Alarm;
use crate::clock::Clock;
use crate::error::Result;
use crate::storage::EngineSettings;

/// What [`SchedulingGateway::schedule_alarm`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A MAIN job is live, firing after `delay`.
    Scheduled { delay: Duration },
    /// The alarm is disabled; nothing was touched.
    Disabled,
    /// `next_fire_at` is in the past; nothing was touched.
    Stale,
}

pub struct SchedulingGateway {
    executor: Arc<dyn DeferredExecutor>,
    clock: Arc<dyn Clock>,
    tag_prefix: String,
    upcoming_lead: Option<Duration>,
}

impl SchedulingGateway {
    pub fn new(
        executor: Arc<dyn DeferredExecutor>,
        clock: Arc<dyn Clock>,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            executor,
            clock,
            tag_prefix: settings.job_tag_prefix.clone(),
            upcoming_lead: settings.upcoming_lead,
        }
    }

    pub fn tag(&self, kind: TriggerKind, alarm_id: i64) -> String {
        job_tag(&self.tag_prefix, kind, alarm_id)
    }

    /// Arm the alarm's next firing at `alarm.next_fire_at`.
    ///
    /// Disabled and stale alarms are left alone: resolving staleness is the
    /// caller's responsibility. Errors from the executor, notably
    /// `PermissionDenied`, are returned untouched.
    pub async fn schedule_alarm(&self, alarm: &Alarm) -> Result<ScheduleOutcome> {
        if !alarm.enabled {
            debug!(alarm_id = alarm.id, "not scheduling disabled alarm");
            return Ok(ScheduleOutcome::Disabled);
        }
        let delay_ms = alarm.next_fire_at - self.clock.now_ms();
        if delay_ms < 0 {
            debug!(alarm_id = alarm.id, delay_ms, "not scheduling stale alarm");
            return Ok(ScheduleOutcome::Stale);
        }
        let delay = Duration::from_millis(delay_ms as u64);

        let main_tag = self.tag(TriggerKind::Main, alarm.id);
        self.executor.cancel_all_by_tag(&main_tag).await?;
        self.executor
            .enqueue(&main_tag, JobPayload::main(alarm.id), delay)
            .await?;

        let upcoming_tag = self.tag(TriggerKind::Upcoming, alarm.id);
        self.executor.cancel_all_by_tag(&upcoming_tag).await?;
        if let Some(lead) = self.upcoming_lead.filter(|lead| delay > *lead) {
            self.executor
                .enqueue(&upcoming_tag, JobPayload::upcoming(alarm.id), delay - lead)
                .await?;
        }

        info!(
            alarm_id = alarm.id,
            delay_ms,
            next_fire_at = alarm.next_fire_at,
            "alarm scheduled"
        );
        Ok(ScheduleOutcome::Scheduled { delay })
    }

    /// Drop any pending job for `alarm_id`. Safe when none exists.
    pub async fn cancel_alarm(&self, alarm_id: i64) -> Result<()> {
        self.executor
            .cancel_all_by_tag(&self.tag(TriggerKind::Main, alarm_id))
            .await?;
        self.executor
            .cancel_all_by_tag(&self.tag(TriggerKind::Upcoming, alarm_id))
            .await?;
        debug!(alarm_id, "alarm jobs cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::AlarmDraft;
    use crate::clock::ManualClock;
    use crate::error::CoreError;
    use crate::scheduling::TimerQueue;
    use chrono::{TimeZone, Utc};

    fn setup(lead: Option<Duration>) -> (SchedulingGateway, Arc<TimerQueue>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap(),
        ));
        let (queue, _rx) = TimerQueue::new();
        let settings = EngineSettings {
            upcoming_lead: lead,
            ..EngineSettings::default()
        };
        let gateway = SchedulingGateway::new(queue.clone(), clock.clone(), &settings);
        (gateway, queue, clock)
    }

    fn alarm_in(clock: &ManualClock, id: i64, minutes: i64) -> Alarm {
        let mut alarm = AlarmDraft::new(7, 0).to_alarm();
        alarm.id = id;
        alarm.next_fire_at = clock.now_ms() + minutes * 60_000;
        alarm
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_twice_leaves_one_job() {
        let (gateway, queue, clock) = setup(None);
        let alarm = alarm_in(&clock, 1, 60);

        gateway.schedule_alarm(&alarm).await.unwrap();
        gateway.schedule_alarm(&alarm).await.unwrap();

        assert_eq!(queue.pending("alarm-1"), vec![JobPayload::main(1)]);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_and_stale_are_noops() {
        let (gateway, queue, clock) = setup(None);

        let mut disabled = alarm_in(&clock, 1, 60);
        disabled.enabled = false;
        assert_eq!(
            gateway.schedule_alarm(&disabled).await.unwrap(),
            ScheduleOutcome::Disabled
        );

        let stale = alarm_in(&clock, 2, -1);
        assert_eq!(
            gateway.schedule_alarm(&stale).await.unwrap(),
            ScheduleOutcome::Stale
        );
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn due_now_is_scheduled_with_zero_delay() {
        let (gateway, _queue, clock) = setup(None);
        let alarm = alarm_in(&clock, 1, 0);
        assert_eq!(
            gateway.schedule_alarm(&alarm).await.unwrap(),
            ScheduleOutcome::Scheduled {
                delay: Duration::ZERO
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_without_job_is_noop() {
        let (gateway, queue, _clock) = setup(None);
        gateway.cancel_alarm(9).await.unwrap();
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn upcoming_job_only_when_lead_fits() {
        let (gateway, queue, clock) = setup(Some(Duration::from_secs(30 * 60)));

        gateway.schedule_alarm(&alarm_in(&clock, 1, 60)).await.unwrap();
        assert_eq!(
            queue.pending_tags(),
            vec!["alarm-1".to_string(), "alarm-upcoming-1".to_string()]
        );

        // Rescheduled inside the lead window: the old reminder goes away.
        gateway.schedule_alarm(&alarm_in(&clock, 1, 10)).await.unwrap();
        assert_eq!(queue.pending_tags(), vec!["alarm-1".to_string()]);

        gateway.cancel_alarm(1).await.unwrap();
        assert!(queue.is_empty());
    }

    struct DenyingExecutor;

    #[async_trait::async_trait]
    impl DeferredExecutor for DenyingExecutor {
        async fn enqueue(&self, _tag: &str, _payload: JobPayload, _delay: Duration) -> Result<()> {
            Err(CoreError::PermissionDenied("exact alarms not allowed".into()))
        }

        async fn cancel_all_by_tag(&self, _tag: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn permission_denied_propagates() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap(),
        ));
        let gateway =
            SchedulingGateway::new(Arc::new(DenyingExecutor), clock.clone(), &EngineSettings::default());
        let err = gateway
            .schedule_alarm(&alarm_in(&clock, 1, 60))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::PermissionDenied(_)));
    }
}
