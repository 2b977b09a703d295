//! Shared fixtures for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;

use crate::alarm::{Alarm, AlarmDraft};
use crate::clock::{Clock, ManualClock};
use crate::engine::{AlarmEngine, Collaborators};
use crate::error::{CoreError, Result};
use crate::scheduling::{JobPayload, TimerQueue};
use crate::session::{NotificationPresenter, Platform, Ringer, SessionHost, SessionManager};
use crate::storage::{AlarmStore, EngineSettings, InMemoryAlarmStore};
use crate::util::lock;

/// Records every platform call as `"<call>:<alarm_id>"`.
#[derive(Default)]
pub(crate) struct RecordingPlatform {
    events: Mutex<Vec<String>>,
    fail_playback: AtomicBool,
}

impl RecordingPlatform {
    pub(crate) fn events(&self) -> Vec<String> {
        lock(&self.events).clone()
    }

    pub(crate) fn count(&self, event: &str) -> usize {
        lock(&self.events).iter().filter(|e| *e == event).count()
    }

    pub(crate) fn fail_playback(&self, fail: bool) {
        self.fail_playback.store(fail, Ordering::SeqCst);
    }

    fn push(&self, call: &str, alarm_id: i64) {
        lock(&self.events).push(format!("{call}:{alarm_id}"));
    }

    pub(crate) fn platform(self: &Arc<Self>) -> Platform {
        Platform {
            ringer: self.clone(),
            presenter: self.clone(),
            host: self.clone(),
        }
    }
}

#[async_trait]
impl Ringer for RecordingPlatform {
    async fn acquire_wake_lock(&self, alarm_id: i64) -> Result<()> {
        self.push("wake_lock", alarm_id);
        Ok(())
    }

    async fn release_wake_lock(&self, alarm_id: i64) {
        self.push("release_wake_lock", alarm_id);
    }

    async fn start_playback(&self, alarm: &Alarm) -> Result<()> {
        if self.fail_playback.load(Ordering::SeqCst) {
            return Err(CoreError::Playback {
                alarm_id: alarm.id,
                message: "no audio device".into(),
            });
        }
        self.push("play", alarm.id);
        Ok(())
    }

    async fn stop_playback(&self, alarm_id: i64) {
        self.push("stop_play", alarm_id);
    }
}

#[async_trait]
impl NotificationPresenter for RecordingPlatform {
    async fn show_upcoming(&self, alarm: &Alarm) {
        self.push("upcoming", alarm.id);
    }

    async fn show_ringing(&self, alarm: &Alarm) {
        self.push("ringing", alarm.id);
    }

    async fn cancel(&self, alarm_id: i64) {
        self.push("cancel", alarm_id);
    }
}

#[async_trait]
impl SessionHost for RecordingPlatform {
    async fn start_session(&self, alarm_id: i64) {
        self.push("host_start", alarm_id);
    }

    async fn end_session(&self, alarm_id: i64) {
        self.push("host_end", alarm_id);
    }
}

/// An engine over in-memory collaborators, frozen at Monday 2024-01-01
/// 06:00 UTC, with the pre-alarm reminder off.
pub(crate) struct Harness {
    pub store: Arc<InMemoryAlarmStore>,
    pub queue: Arc<TimerQueue>,
    pub fired: mpsc::UnboundedReceiver<JobPayload>,
    pub clock: Arc<ManualClock>,
    pub platform: Arc<RecordingPlatform>,
    pub engine: Arc<AlarmEngine>,
    pub sessions: Arc<SessionManager>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_settings(EngineSettings {
            upcoming_lead: None,
            ..EngineSettings::default()
        })
    }

    pub(crate) fn with_settings(settings: EngineSettings) -> Self {
        let store = Arc::new(InMemoryAlarmStore::new());
        let (queue, fired) = TimerQueue::new();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap(),
        ));
        let platform = Arc::new(RecordingPlatform::default());

        let engine = Arc::new(AlarmEngine::new(
            Collaborators {
                store: store.clone(),
                executor: queue.clone(),
                clock: clock.clone(),
                platform: platform.platform(),
            },
            &settings,
        ));
        let sessions = engine.sessions().clone();

        Self {
            store,
            queue,
            fired,
            clock,
            platform,
            engine,
            sessions,
        }
    }

    /// Insert `draft` due `minutes` from now, without scheduling it.
    pub(crate) async fn add(&self, draft: AlarmDraft, minutes: i64) -> Alarm {
        let mut alarm = draft.to_alarm();
        alarm.next_fire_at = self.clock.now_ms() + minutes * 60_000;
        alarm.id = self.store.insert(&alarm).await.unwrap();
        alarm
    }
}
