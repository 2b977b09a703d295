//! Alarm sessions: one ringing episode per alarm id, with its auto-snooze
//! watcher and the platform collaborators it drives.

mod manager;
mod traits;
mod watcher;

pub use manager::{Resolution, SessionManager, SessionState};
pub use traits::{NotificationPresenter, Platform, Ringer, SessionHost};
pub use watcher::AutoSnoozeOutcome;
