//! # Alarm Clock Core Library
//!
//! Scheduling and triggering engine for an alarm clock. Hosts (the
//! `alarmclock` CLI daemon, a mobile shell, a desktop tray app) plug in their
//! platform pieces and the engine owns the alarm lifecycle.
//!
//! ## Architecture
//!
//! - **Calculator**: pure next-firing computation over weekday masks
//! - **Storage**: SQLite alarm store, an in-memory store, and TOML configuration
//! - **Scheduling**: the gateway onto a deferred executor, plus an in-process
//!   tokio timer queue implementing it
//! - **Coordinator**: the single entry point for fired jobs
//! - **Sessions**: one ringing episode per alarm, with the auto-snooze watcher
//!
//! ## Key Components
//!
//! - [`AlarmEngine`]: facade over the edit flow, dispatch and recovery
//! - [`AlarmStore`]: the alarm record store
//! - [`DeferredExecutor`]: anything that can run a tagged job later
//! - [`Config`]: application configuration management

pub mod alarm;
pub mod clock;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod scheduling;
pub mod session;
pub mod storage;

mod util;

#[cfg(test)]
mod testing;

pub use alarm::{compute_next_trigger, initial_trigger, Alarm, AlarmDraft, Weekdays};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{TriggerCoordinator, TriggerOutcome};
pub use engine::{AlarmEngine, Collaborators, RecoveryReport};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use scheduling::{
    DeferredExecutor, JobPayload, ScheduleOutcome, SchedulingGateway, TimerQueue, TriggerKind,
};
pub use session::{
    AutoSnoozeOutcome, NotificationPresenter, Platform, Resolution, Ringer, SessionHost,
    SessionManager, SessionState,
};
pub use storage::{
    data_dir, AlarmStore, Config, EngineSettings, InMemoryAlarmStore, SqliteAlarmStore,
};
