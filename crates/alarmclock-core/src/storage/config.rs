//! TOML-based application configuration.
//!
//! Stores engine policy and the defaults applied to new alarms:
//! - Deferred job tagging
//! - Auto-snooze wait window
//! - Pre-alarm notification lead time
//! - Snooze/tone/vibration defaults for the edit flow
//!
//! Configuration is stored at `~/.config/alarmclock/config.toml`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::alarm::AlarmDraft;
use crate::error::{ConfigError, Result};

/// Deferred-job settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Prefix for substrate tags; the alarm id is appended.
    #[serde(default = "default_job_tag_prefix")]
    pub job_tag_prefix: String,
}

/// Ringing session policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long a session may ring unattended before auto-snooze acts.
    #[serde(default = "default_auto_snooze_window_secs")]
    pub auto_snooze_window_secs: u64,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Minutes before an alarm to show the pre-alarm notification. 0 disables it.
    #[serde(default = "default_upcoming_lead_minutes")]
    pub upcoming_lead_minutes: u32,
}

/// Values applied to alarms created without explicit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_snooze_minutes")]
    pub snooze_minutes: u32,
    #[serde(default = "default_true")]
    pub auto_snooze_enabled: bool,
    #[serde(default = "default_auto_snooze_max_cycles")]
    pub auto_snooze_max_cycles: u32,
    #[serde(default = "default_true")]
    pub vibrate: bool,
    #[serde(default = "default_tone")]
    pub tone: String,
}

/// Daemon behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Seconds between re-reads of the store while running. 0 disables rescans.
    #[serde(default = "default_rescan_interval_secs")]
    pub rescan_interval_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/alarmclock/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

// Default functions
fn default_job_tag_prefix() -> String {
    "alarm-".into()
}
fn default_auto_snooze_window_secs() -> u64 {
    60
}
fn default_upcoming_lead_minutes() -> u32 {
    30
}
fn default_snooze_minutes() -> u32 {
    10
}
fn default_auto_snooze_max_cycles() -> u32 {
    3
}
fn default_tone() -> String {
    "default".into()
}
fn default_true() -> bool {
    true
}
fn default_rescan_interval_secs() -> u64 {
    30
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            job_tag_prefix: default_job_tag_prefix(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_snooze_window_secs: default_auto_snooze_window_secs(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            upcoming_lead_minutes: default_upcoming_lead_minutes(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            snooze_minutes: default_snooze_minutes(),
            auto_snooze_enabled: true,
            auto_snooze_max_cycles: default_auto_snooze_max_cycles(),
            vibrate: true,
            tone: default_tone(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            rescan_interval_secs: default_rescan_interval_secs(),
        }
    }
}

/// The subset of configuration the engine consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub job_tag_prefix: String,
    pub auto_snooze_window: Duration,
    /// `None` when the pre-alarm notification is disabled.
    pub upcoming_lead: Option<Duration>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Config::default().engine_settings()
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                ),
                serde_json::Value::Number(_) => serde_json::Value::Number(
                    value
                        .parse::<u64>()
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                        .into(),
                ),
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    return Err(invalid("cannot set a whole section".into()));
                }
                _ => serde_json::Value::String(value.into()),
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        Self::load_from(&path)
    }

    /// Load from an explicit path, writing defaults there if it is missing.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
                .into()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        let lead = self.notifications.upcoming_lead_minutes;
        EngineSettings {
            job_tag_prefix: self.scheduling.job_tag_prefix.clone(),
            auto_snooze_window: Duration::from_secs(self.session.auto_snooze_window_secs.max(1)),
            upcoming_lead: (lead > 0).then(|| Duration::from_secs(u64::from(lead) * 60)),
        }
    }

    /// A new draft at `hour:minute` carrying the configured defaults.
    pub fn draft(&self, hour: u32, minute: u32) -> AlarmDraft {
        let mut draft = AlarmDraft::new(hour, minute);
        draft.snooze_minutes = self.defaults.snooze_minutes;
        draft.auto_snooze_enabled = self.defaults.auto_snooze_enabled;
        draft.auto_snooze_max_cycles = self.defaults.auto_snooze_max_cycles;
        draft.vibrate = self.defaults.vibrate;
        draft.tone = self.defaults.tone.clone();
        draft
    }
}
