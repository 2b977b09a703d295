mod config;
pub mod database;
pub mod memory;
pub mod migrations;

pub use config::{Config, DefaultsConfig, EngineSettings};
pub use database::SqliteAlarmStore;
pub use memory::InMemoryAlarmStore;

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::alarm::Alarm;
use crate::error::{ConfigError, Result};

/// Durable keyed storage for alarms.
///
/// Every component reads before deciding and writes after deciding; there is
/// no transaction layer, the last writer wins.
#[async_trait]
pub trait AlarmStore: Send + Sync {
    /// Persist a new alarm and return its assigned id. `alarm.id` is ignored.
    async fn insert(&self, alarm: &Alarm) -> Result<i64>;

    /// Overwrite an existing alarm. Fails with `NotFound` for unknown ids.
    async fn update(&self, alarm: &Alarm) -> Result<()>;

    /// Remove an alarm. Unknown ids are ignored.
    async fn delete(&self, id: i64) -> Result<()>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Alarm>>;

    async fn list_enabled(&self) -> Result<Vec<Alarm>>;

    async fn list_all(&self) -> Result<Vec<Alarm>>;

    /// Live view of every alarm, republished after each mutation.
    fn observe_all(&self) -> watch::Receiver<Vec<Alarm>>;
}

/// Returns `~/.config/alarmclock[-dev]/`.
///
/// `ALARMCLOCK_DATA_DIR` overrides the location outright; otherwise
/// `ALARMCLOCK_ENV=dev` selects the development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("ALARMCLOCK_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("ALARMCLOCK_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("alarmclock-dev")
            } else {
                base_dir.join("alarmclock")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
