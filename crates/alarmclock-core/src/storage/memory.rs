//! In-process alarm store.
//!
//! Same contract as the SQLite store, without durability. Counts writes and
//! can be switched offline, which makes it the store of choice for
//! exercising the engine.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;

use super::AlarmStore;
use crate::alarm::Alarm;
use crate::error::{CoreError, Result};
use crate::util::lock;

pub struct InMemoryAlarmStore {
    alarms: Mutex<Inner>,
    all: watch::Sender<Vec<Alarm>>,
    writes: AtomicUsize,
    offline: AtomicBool,
}

struct Inner {
    next_id: i64,
    rows: BTreeMap<i64, Alarm>,
}

impl InMemoryAlarmStore {
    pub fn new() -> Self {
        let (all, _) = watch::channel(Vec::new());
        Self {
            alarms: Mutex::new(Inner {
                next_id: 1,
                rows: BTreeMap::new(),
            }),
            all,
            writes: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
        }
    }

    /// Number of successful insert/update/delete calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail with `StoreUnavailable` until cleared.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CoreError::StoreUnavailable("in-memory store is offline".into()));
        }
        Ok(())
    }

    fn committed(&self, inner: &Inner) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.all.send_replace(inner.rows.values().cloned().collect());
    }
}

impl Default for InMemoryAlarmStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlarmStore for InMemoryAlarmStore {
    async fn insert(&self, alarm: &Alarm) -> Result<i64> {
        self.check_online()?;
        let mut inner = lock(&self.alarms);
        let id = inner.next_id;
        inner.next_id += 1;
        let mut row = alarm.clone();
        row.id = id;
        inner.rows.insert(id, row);
        self.committed(&inner);
        Ok(id)
    }

    async fn update(&self, alarm: &Alarm) -> Result<()> {
        self.check_online()?;
        let mut inner = lock(&self.alarms);
        match inner.rows.get_mut(&alarm.id) {
            Some(row) => *row = alarm.clone(),
            None => return Err(CoreError::NotFound(alarm.id)),
        }
        self.committed(&inner);
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.check_online()?;
        let mut inner = lock(&self.alarms);
        if inner.rows.remove(&id).is_some() {
            self.committed(&inner);
        }
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Alarm>> {
        self.check_online()?;
        Ok(lock(&self.alarms).rows.get(&id).cloned())
    }

    async fn list_enabled(&self) -> Result<Vec<Alarm>> {
        self.check_online()?;
        Ok(lock(&self.alarms)
            .rows
            .values()
            .filter(|a| a.enabled)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<Alarm>> {
        self.check_online()?;
        Ok(lock(&self.alarms).rows.values().cloned().collect())
    }

    fn observe_all(&self) -> watch::Receiver<Vec<Alarm>> {
        self.all.subscribe()
    }
}
