//! Auto-snooze watcher.
//!
//! A single-shot timer per ringing session. When the user has not acted
//! within the window, the alarm is re-armed `snooze_minutes` later, or
//! disabled once its automatic snoozes are used up.

use std::sync::atomic::Ordering;

use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::manager::{Resolution, SessionManager};
use crate::alarm::Alarm;
use crate::error::Result;

/// What the watcher did when its window elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSnoozeOutcome {
    /// The session was already resolved or replaced.
    NotLive,
    /// Left ringing: playback is not active or auto-snooze is off.
    KeepRinging,
    Snoozed { count: u32 },
    /// The alarm was disabled and the session ended.
    Missed,
}

impl SessionManager {
    pub(super) fn arm_watcher(&self, alarm_id: i64, generation: u64) -> AbortHandle {
        let manager = self.me.clone();
        let window = self.auto_snooze_window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let Some(manager) = manager.upgrade() else {
                return;
            };
            match manager.on_watcher_elapsed(alarm_id, generation).await {
                Ok(outcome) => debug!(alarm_id, ?outcome, "auto-snooze window elapsed"),
                Err(e) => warn!(alarm_id, error = %e, "auto-snooze failed, alarm keeps ringing"),
            }
        })
        .abort_handle()
    }

    /// Run the auto-snooze decision for session `generation` of `alarm_id`.
    ///
    /// A failed reload leaves the session ringing and returns the error.
    pub(crate) async fn on_watcher_elapsed(
        &self,
        alarm_id: i64,
        generation: u64,
    ) -> Result<AutoSnoozeOutcome> {
        let Some(session) = self.peek(alarm_id, generation) else {
            return Ok(AutoSnoozeOutcome::NotLive);
        };
        if !session.playback_active.load(Ordering::SeqCst) || !session.alarm.auto_snooze_enabled {
            return Ok(AutoSnoozeOutcome::KeepRinging);
        }
        drop(session);

        let current = self.store.get_by_id(alarm_id).await?;

        let Some(session) = self.take(alarm_id, Some(generation)) else {
            return Ok(AutoSnoozeOutcome::NotLive);
        };
        // This task is the watcher; it must not abort itself mid-teardown.
        session.disarm_watcher(false);

        let result = self.apply_auto_snooze(current).await;
        let resolution = match &result {
            Ok(AutoSnoozeOutcome::Snoozed { .. }) => Resolution::AutoSnoozed,
            _ => Resolution::Missed,
        };
        self.teardown(&session, resolution).await;
        result
    }

    async fn apply_auto_snooze(&self, current: Option<Alarm>) -> Result<AutoSnoozeOutcome> {
        let Some(mut alarm) = current else {
            return Ok(AutoSnoozeOutcome::Missed);
        };

        if alarm.auto_snooze_exhausted() {
            alarm.enabled = false;
            self.gateway.cancel_alarm(alarm.id).await?;
            self.store.update(&alarm).await?;
            info!(
                alarm_id = alarm.id,
                cycles = alarm.auto_snooze_count,
                "auto-snooze exhausted, alarm disabled"
            );
            return Ok(AutoSnoozeOutcome::Missed);
        }

        alarm.auto_snooze_count += 1;
        alarm.next_fire_at = self.clock.now_ms() + alarm.snooze_ms();
        alarm.enabled = true;
        alarm.upcoming_shown = false;
        self.store.update(&alarm).await?;
        self.gateway.schedule_alarm(&alarm).await?;
        info!(
            alarm_id = alarm.id,
            count = alarm.auto_snooze_count,
            next_fire_at = alarm.next_fire_at,
            "alarm auto-snoozed"
        );
        Ok(AutoSnoozeOutcome::Snoozed {
            count: alarm.auto_snooze_count,
        })
    }
}
