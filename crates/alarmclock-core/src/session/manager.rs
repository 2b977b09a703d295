//! Ringing sessions, at most one per alarm id.
//!
//! A session moves `Starting -> Ringing -> Resolved`. Only ringing sessions
//! are filed in the live table; whoever removes a session from the table owns
//! its teardown, so resources are released exactly once whichever path
//! (stop, snooze, auto-snooze, supersede) wins.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::traits::Platform;
use crate::alarm::Alarm;
use crate::clock::Clock;
use crate::error::Result;
use crate::scheduling::SchedulingGateway;
use crate::storage::AlarmStore;
use crate::util::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Starting,
    Ringing,
    Resolved,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Stopped,
    Snoozed,
    AutoSnoozed,
    /// The watcher gave up after the last automatic snooze.
    Missed,
    /// A newer session for the same alarm took over.
    Superseded,
    /// Torn down without touching the record, e.g. the alarm was deleted.
    Dismissed,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Resolution::Stopped => "stopped",
            Resolution::Snoozed => "snoozed",
            Resolution::AutoSnoozed => "auto_snoozed",
            Resolution::Missed => "missed",
            Resolution::Superseded => "superseded",
            Resolution::Dismissed => "dismissed",
        };
        f.write_str(s)
    }
}

pub(super) struct LiveSession {
    pub(super) generation: u64,
    pub(super) alarm: Alarm,
    state: Mutex<SessionState>,
    wake_lock_held: AtomicBool,
    pub(super) playback_active: AtomicBool,
    watcher: Mutex<Option<AbortHandle>>,
}

impl LiveSession {
    fn new(generation: u64, alarm: Alarm) -> Self {
        Self {
            generation,
            alarm,
            state: Mutex::new(SessionState::Starting),
            wake_lock_held: AtomicBool::new(false),
            playback_active: AtomicBool::new(false),
            watcher: Mutex::new(None),
        }
    }

    /// Forget the watcher task, aborting it unless the caller is that task.
    pub(super) fn disarm_watcher(&self, abort: bool) {
        if let Some(handle) = lock(&self.watcher).take() {
            if abort {
                handle.abort();
            }
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.disarm_watcher(true);
    }
}

pub struct SessionManager {
    pub(super) me: Weak<SessionManager>,
    pub(super) store: Arc<dyn AlarmStore>,
    pub(super) gateway: Arc<SchedulingGateway>,
    pub(super) clock: Arc<dyn Clock>,
    platform: Platform,
    pub(super) auto_snooze_window: Duration,
    live: Mutex<HashMap<i64, Arc<LiveSession>>>,
    generation: AtomicU64,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn AlarmStore>,
        gateway: Arc<SchedulingGateway>,
        clock: Arc<dyn Clock>,
        platform: Platform,
        auto_snooze_window: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            store,
            gateway,
            clock,
            platform,
            auto_snooze_window,
            live: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        })
    }

    /// Start ringing `alarm`, superseding any live session for its id.
    ///
    /// Never fails: a missing wake lock or failed playback is logged and the
    /// session rings regardless so the user can still stop or snooze.
    pub async fn start(&self, alarm: Alarm) {
        let alarm_id = alarm.id;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let previous = lock(&self.live).remove(&alarm_id);
        if let Some(old) = previous {
            self.teardown(&old, Resolution::Superseded).await;
        }

        let session = Arc::new(LiveSession::new(generation, alarm));
        self.platform.host.start_session(alarm_id).await;
        match self.platform.ringer.acquire_wake_lock(alarm_id).await {
            Ok(()) => session.wake_lock_held.store(true, Ordering::SeqCst),
            Err(e) => warn!(alarm_id, error = %e, "wake lock unavailable"),
        }
        match self.platform.ringer.start_playback(&session.alarm).await {
            Ok(()) => session.playback_active.store(true, Ordering::SeqCst),
            Err(e) => warn!(alarm_id, error = %e, "playback failed, ringing silently"),
        }
        self.platform.presenter.show_ringing(&session.alarm).await;

        *lock(&session.watcher) = Some(self.arm_watcher(alarm_id, generation));
        *lock(&session.state) = SessionState::Ringing;

        let displaced = lock(&self.live).insert(alarm_id, session);
        if let Some(old) = displaced {
            self.teardown(&old, Resolution::Superseded).await;
        }
        info!(alarm_id, generation, "alarm ringing");
    }

    /// User stop. Returns `Ok(false)` when nothing is ringing for the id.
    pub async fn stop(&self, alarm_id: i64) -> Result<bool> {
        let Some(session) = self.take(alarm_id, None) else {
            return Ok(false);
        };
        let result = self.persist_stop(alarm_id).await;
        self.teardown(&session, Resolution::Stopped).await;
        result.map(|()| true)
    }

    async fn persist_stop(&self, alarm_id: i64) -> Result<()> {
        self.gateway.cancel_alarm(alarm_id).await?;
        let Some(mut alarm) = self.store.get_by_id(alarm_id).await? else {
            return Ok(());
        };
        alarm.enabled = false;
        alarm.auto_snooze_count = 0;
        self.store.update(&alarm).await
    }

    /// User snooze. Returns `Ok(false)` when nothing is ringing for the id.
    pub async fn snooze(&self, alarm_id: i64) -> Result<bool> {
        let Some(session) = self.take(alarm_id, None) else {
            return Ok(false);
        };
        let result = self.persist_snooze(alarm_id).await;
        self.teardown(&session, Resolution::Snoozed).await;
        result.map(|()| true)
    }

    async fn persist_snooze(&self, alarm_id: i64) -> Result<()> {
        let Some(mut alarm) = self.store.get_by_id(alarm_id).await? else {
            return Ok(());
        };
        alarm.next_fire_at = self.clock.now_ms() + alarm.snooze_ms();
        alarm.auto_snooze_count = 0;
        alarm.upcoming_shown = false;
        alarm.enabled = true;
        self.store.update(&alarm).await?;
        self.gateway.schedule_alarm(&alarm).await?;
        info!(alarm_id, next_fire_at = alarm.next_fire_at, "alarm snoozed");
        Ok(())
    }

    /// Silence a ringing alarm without touching its record.
    pub async fn dismiss(&self, alarm_id: i64) -> bool {
        match self.take(alarm_id, None) {
            Some(session) => {
                self.teardown(&session, Resolution::Dismissed).await;
                true
            }
            None => false,
        }
    }

    pub fn state(&self, alarm_id: i64) -> Option<SessionState> {
        lock(&self.live)
            .get(&alarm_id)
            .map(|session| *lock(&session.state))
    }

    pub fn is_ringing(&self, alarm_id: i64) -> bool {
        self.state(alarm_id) == Some(SessionState::Ringing)
    }

    pub fn live_count(&self) -> usize {
        lock(&self.live).len()
    }

    /// Ids with a ringing session, ascending.
    pub fn ringing_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = lock(&self.live).keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// The live session for `alarm_id`, if it is still `generation`.
    pub(super) fn peek(&self, alarm_id: i64, generation: u64) -> Option<Arc<LiveSession>> {
        lock(&self.live)
            .get(&alarm_id)
            .filter(|session| session.generation == generation)
            .cloned()
    }

    /// Remove the live session for `alarm_id`, claiming its teardown.
    pub(super) fn take(&self, alarm_id: i64, generation: Option<u64>) -> Option<Arc<LiveSession>> {
        let mut live = lock(&self.live);
        let matches = live
            .get(&alarm_id)
            .is_some_and(|session| match generation {
                Some(g) => session.generation == g,
                None => true,
            });
        if matches {
            live.remove(&alarm_id)
        } else {
            None
        }
    }

    /// Release everything the session holds. Callers own `session` via
    /// [`take`](Self::take) or a table swap, so this runs once per session.
    pub(super) async fn teardown(&self, session: &LiveSession, resolution: Resolution) {
        let alarm_id = session.alarm.id;
        *lock(&session.state) = SessionState::Resolved;
        session.disarm_watcher(true);

        if session.playback_active.swap(false, Ordering::SeqCst) {
            self.platform.ringer.stop_playback(alarm_id).await;
        }
        if session.wake_lock_held.swap(false, Ordering::SeqCst) {
            self.platform.ringer.release_wake_lock(alarm_id).await;
        }
        self.platform.presenter.cancel(alarm_id).await;
        self.platform.host.end_session(alarm_id).await;
        debug!(alarm_id, generation = session.generation, %resolution, "session resolved");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::AlarmDraft;
    use crate::testing::Harness;

    #[tokio::test(start_paused = true)]
    async fn start_acquires_and_stop_releases() {
        let h = Harness::new();
        let alarm = h.add(AlarmDraft::new(7, 0), 0).await;

        h.sessions.start(alarm.clone()).await;
        assert!(h.sessions.is_ringing(alarm.id));
        assert_eq!(
            h.platform.events(),
            vec!["host_start:1", "wake_lock:1", "play:1", "ringing:1"]
        );

        assert!(h.sessions.stop(alarm.id).await.unwrap());
        assert_eq!(h.sessions.live_count(), 0);
        assert_eq!(
            h.platform.events()[4..],
            ["stop_play:1", "release_wake_lock:1", "cancel:1", "host_end:1"]
        );

        let stored = h.store.get_by_id(alarm.id).await.unwrap().unwrap();
        assert!(!stored.enabled);
        assert_eq!(stored.auto_snooze_count, 0);
        assert!(h.queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_and_snooze_without_session_touch_nothing() {
        let h = Harness::new();
        let alarm = h.add(AlarmDraft::new(7, 0), 30).await;
        let writes = h.store.write_count();

        assert!(!h.sessions.stop(alarm.id).await.unwrap());
        assert!(!h.sessions.snooze(alarm.id).await.unwrap());
        assert_eq!(h.store.write_count(), writes);
        assert!(h.platform.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_snooze_resets_count_and_schedules_one_job() {
        let h = Harness::new();
        let alarm = h.add(AlarmDraft::new(7, 0), 0).await;
        let mut ringing = alarm.clone();
        ringing.auto_snooze_count = 2;
        ringing.enabled = false;
        h.store.update(&ringing).await.unwrap();

        let snoozed_at = h.clock.now_ms();
        h.sessions.start(ringing).await;
        assert!(h.sessions.snooze(alarm.id).await.unwrap());

        let stored = h.store.get_by_id(alarm.id).await.unwrap().unwrap();
        assert_eq!(stored.next_fire_at, snoozed_at + 10 * 60_000);
        assert_eq!(stored.auto_snooze_count, 0);
        assert!(stored.enabled);
        assert_eq!(h.queue.len(), 1);
        assert!(!h.sessions.is_ringing(alarm.id));
    }

    #[tokio::test(start_paused = true)]
    async fn new_session_supersedes_old() {
        let h = Harness::new();
        let alarm = h.add(AlarmDraft::new(7, 0), 0).await;

        h.sessions.start(alarm.clone()).await;
        h.sessions.start(alarm.clone()).await;

        assert_eq!(h.sessions.live_count(), 1);
        assert_eq!(h.platform.count("play:1"), 2);
        assert_eq!(h.platform.count("stop_play:1"), 1);
        assert_eq!(h.platform.count("host_end:1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn playback_failure_still_rings() {
        let h = Harness::new();
        h.platform.fail_playback(true);
        let alarm = h.add(AlarmDraft::new(7, 0), 0).await;

        h.sessions.start(alarm.clone()).await;
        assert!(h.sessions.is_ringing(alarm.id));
        assert_eq!(h.platform.count("ringing:1"), 1);

        assert!(h.sessions.dismiss(alarm.id).await);
        assert_eq!(h.platform.count("stop_play:1"), 0);
        assert_eq!(h.platform.count("release_wake_lock:1"), 1);
    }
}
