//! Platform collaborators a ringing alarm needs.
//!
//! None of these report back into the engine except [`Ringer::start_playback`]
//! and [`Ringer::acquire_wake_lock`], whose failures are logged and otherwise
//! ignored.

use std::sync::Arc;

use async_trait::async_trait;

use crate::alarm::Alarm;
use crate::error::Result;

/// Sound, vibration and the wake-preventing resource.
#[async_trait]
pub trait Ringer: Send + Sync {
    async fn acquire_wake_lock(&self, alarm_id: i64) -> Result<()>;

    async fn release_wake_lock(&self, alarm_id: i64);

    /// Begin sound/vibration. Fails with `CoreError::Playback`.
    async fn start_playback(&self, alarm: &Alarm) -> Result<()>;

    async fn stop_playback(&self, alarm_id: i64);
}

/// Fire-and-forget user notifications.
#[async_trait]
pub trait NotificationPresenter: Send + Sync {
    /// Pre-alarm reminder.
    async fn show_upcoming(&self, alarm: &Alarm);

    /// The ringing screen with stop and snooze actions.
    async fn show_ringing(&self, alarm: &Alarm);

    /// Remove whatever is shown for `alarm_id`.
    async fn cancel(&self, alarm_id: i64);
}

/// Execution context that keeps a ringing session alive while the host
/// application is in the background.
#[async_trait]
pub trait SessionHost: Send + Sync {
    async fn start_session(&self, alarm_id: i64);

    async fn end_session(&self, alarm_id: i64);
}

/// The platform side of the engine, bundled for wiring.
#[derive(Clone)]
pub struct Platform {
    pub ringer: Arc<dyn Ringer>,
    pub presenter: Arc<dyn NotificationPresenter>,
    pub host: Arc<dyn SessionHost>,
}
