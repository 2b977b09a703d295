//! SQLite-backed alarm store.
//!
//! One connection behind a mutex. Statements are short single-row writes, so
//! they run inline on the calling task.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::watch;

use super::{data_dir, migrations, AlarmStore};
use crate::alarm::{Alarm, Weekdays};
use crate::error::{CoreError, DatabaseError, Result};
use crate::util::lock;

const ALARM_COLUMNS: &str = "id, hour, minute, next_fire_at, enabled, days, label, tone, vibrate,
     snooze_minutes, auto_snooze_enabled, auto_snooze_max_cycles, auto_snooze_count, upcoming_shown";

/// SQLite database holding the `alarms` table.
pub struct SqliteAlarmStore {
    conn: Mutex<Connection>,
    all: watch::Sender<Vec<Alarm>>,
}

impl SqliteAlarmStore {
    /// Open the database at `<data_dir>/alarmclock.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("alarmclock.db");
        Self::open_at(&path)
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        let initial = query_all(&conn, false)?;
        let (all, _) = watch::channel(initial);
        Ok(Self {
            conn: Mutex::new(conn),
            all,
        })
    }

    fn publish(&self, conn: &Connection) -> Result<()> {
        let alarms = query_all(conn, false)?;
        self.all.send_replace(alarms);
        Ok(())
    }
}

fn row_to_alarm(row: &Row<'_>) -> rusqlite::Result<Alarm> {
    Ok(Alarm {
        id: row.get(0)?,
        hour: row.get(1)?,
        minute: row.get(2)?,
        next_fire_at: row.get(3)?,
        enabled: row.get(4)?,
        days: Weekdays::from_bits(row.get(5)?),
        label: row.get(6)?,
        tone: row.get(7)?,
        vibrate: row.get(8)?,
        snooze_minutes: row.get(9)?,
        auto_snooze_enabled: row.get(10)?,
        auto_snooze_max_cycles: row.get(11)?,
        auto_snooze_count: row.get(12)?,
        upcoming_shown: row.get(13)?,
    })
}

fn query_all(conn: &Connection, enabled_only: bool) -> Result<Vec<Alarm>> {
    let sql = if enabled_only {
        format!("SELECT {ALARM_COLUMNS} FROM alarms WHERE enabled = 1 ORDER BY hour, minute, id")
    } else {
        format!("SELECT {ALARM_COLUMNS} FROM alarms ORDER BY hour, minute, id")
    };
    let mut stmt = conn.prepare(&sql)?;
    let alarms = stmt
        .query_map([], row_to_alarm)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(alarms)
}

#[async_trait]
impl AlarmStore for SqliteAlarmStore {
    async fn insert(&self, alarm: &Alarm) -> Result<i64> {
        let conn = lock(&self.conn);
        conn.execute(
            "INSERT INTO alarms (hour, minute, next_fire_at, enabled, days, label, tone, vibrate,
                snooze_minutes, auto_snooze_enabled, auto_snooze_max_cycles, auto_snooze_count,
                upcoming_shown)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                alarm.hour,
                alarm.minute,
                alarm.next_fire_at,
                alarm.enabled,
                alarm.days.bits(),
                alarm.label,
                alarm.tone,
                alarm.vibrate,
                alarm.snooze_minutes,
                alarm.auto_snooze_enabled,
                alarm.auto_snooze_max_cycles,
                alarm.auto_snooze_count,
                alarm.upcoming_shown,
            ],
        )?;
        let id = conn.last_insert_rowid();
        self.publish(&conn)?;
        Ok(id)
    }

    async fn update(&self, alarm: &Alarm) -> Result<()> {
        let conn = lock(&self.conn);
        let changed = conn.execute(
            "UPDATE alarms SET hour = ?2, minute = ?3, next_fire_at = ?4, enabled = ?5, days = ?6,
                label = ?7, tone = ?8, vibrate = ?9, snooze_minutes = ?10,
                auto_snooze_enabled = ?11, auto_snooze_max_cycles = ?12,
                auto_snooze_count = ?13, upcoming_shown = ?14
             WHERE id = ?1",
            params![
                alarm.id,
                alarm.hour,
                alarm.minute,
                alarm.next_fire_at,
                alarm.enabled,
                alarm.days.bits(),
                alarm.label,
                alarm.tone,
                alarm.vibrate,
                alarm.snooze_minutes,
                alarm.auto_snooze_enabled,
                alarm.auto_snooze_max_cycles,
                alarm.auto_snooze_count,
                alarm.upcoming_shown,
            ],
        )?;
        if changed == 0 {
            return Err(CoreError::NotFound(alarm.id));
        }
        self.publish(&conn)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let conn = lock(&self.conn);
        let changed = conn.execute("DELETE FROM alarms WHERE id = ?1", params![id])?;
        if changed > 0 {
            self.publish(&conn)?;
        }
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Alarm>> {
        let conn = lock(&self.conn);
        let alarm = conn
            .query_row(
                &format!("SELECT {ALARM_COLUMNS} FROM alarms WHERE id = ?1"),
                params![id],
                row_to_alarm,
            )
            .optional()?;
        Ok(alarm)
    }

    async fn list_enabled(&self) -> Result<Vec<Alarm>> {
        query_all(&lock(&self.conn), true)
    }

    async fn list_all(&self) -> Result<Vec<Alarm>> {
        query_all(&lock(&self.conn), false)
    }

    fn observe_all(&self) -> watch::Receiver<Vec<Alarm>> {
        self.all.subscribe()
    }
}
