//! Terminal implementations of the engine's platform collaborators.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use alarmclock_core::{
    Alarm, CoreError, DeferredExecutor, JobPayload, NotificationPresenter, Platform, Ringer,
    SessionHost,
};
use async_trait::async_trait;
use chrono::Local;
use tokio::task::AbortHandle;

const BELL_INTERVAL: Duration = Duration::from_secs(2);

/// Rings with the terminal bell and prints notices to stdout.
#[derive(Default)]
pub struct Terminal {
    bells: Mutex<HashMap<i64, AbortHandle>>,
}

impl Terminal {
    pub fn platform() -> Platform {
        let terminal = Arc::new(Terminal::default());
        Platform {
            ringer: terminal.clone(),
            presenter: terminal.clone(),
            host: terminal,
        }
    }

    fn bells(&self) -> std::sync::MutexGuard<'_, HashMap<i64, AbortHandle>> {
        self.bells.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Ringer for Terminal {
    async fn acquire_wake_lock(&self, alarm_id: i64) -> alarmclock_core::error::Result<()> {
        tracing::debug!(alarm_id, "terminal keeps the process awake");
        Ok(())
    }

    async fn release_wake_lock(&self, alarm_id: i64) {
        tracing::debug!(alarm_id, "wake lock released");
    }

    async fn start_playback(&self, alarm: &Alarm) -> alarmclock_core::error::Result<()> {
        let mut out = std::io::stdout();
        out.write_all(b"\x07")
            .and_then(|()| out.flush())
            .map_err(|e| CoreError::Playback {
                alarm_id: alarm.id,
                message: e.to_string(),
            })?;

        let bell = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(BELL_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let mut out = std::io::stdout();
                if out.write_all(b"\x07").and_then(|()| out.flush()).is_err() {
                    break;
                }
            }
        });
        if let Some(previous) = self.bells().insert(alarm.id, bell.abort_handle()) {
            previous.abort();
        }
        Ok(())
    }

    async fn stop_playback(&self, alarm_id: i64) {
        if let Some(bell) = self.bells().remove(&alarm_id) {
            bell.abort();
        }
    }
}

#[async_trait]
impl NotificationPresenter for Terminal {
    async fn show_upcoming(&self, alarm: &Alarm) {
        println!("upcoming: alarm {} at {} {}", alarm.id, alarm.time_label(), alarm.label);
    }

    async fn show_ringing(&self, alarm: &Alarm) {
        println!(
            "RINGING: alarm {} ({}) {}  [stop {} | snooze {}]",
            alarm.id,
            alarm.time_label(),
            alarm.label,
            alarm.id,
            alarm.id
        );
    }

    async fn cancel(&self, alarm_id: i64) {
        tracing::debug!(alarm_id, "notification cleared");
    }
}

#[async_trait]
impl SessionHost for Terminal {
    async fn start_session(&self, alarm_id: i64) {
        tracing::debug!(alarm_id, at = %Local::now().format("%H:%M:%S"), "session started");
    }

    async fn end_session(&self, alarm_id: i64) {
        tracing::debug!(alarm_id, "session ended");
    }
}

/// Executor for one-off CLI invocations.
///
/// The edit commands only persist `next_fire_at`; a running daemon picks the
/// change up on its next store rescan and arms the real timer.
pub struct DaemonHandoff;

#[async_trait]
impl DeferredExecutor for DaemonHandoff {
    async fn enqueue(
        &self,
        tag: &str,
        payload: JobPayload,
        delay: Duration,
    ) -> alarmclock_core::error::Result<()> {
        tracing::debug!(
            tag,
            alarm_id = payload.alarm_id,
            delay_ms = delay.as_millis() as u64,
            "left for the daemon to arm"
        );
        Ok(())
    }

    async fn cancel_all_by_tag(&self, tag: &str) -> alarmclock_core::error::Result<()> {
        tracing::debug!(tag, "left for the daemon to cancel");
        Ok(())
    }
}
