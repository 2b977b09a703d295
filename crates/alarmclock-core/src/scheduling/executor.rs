//! Deferred-execution capability.
//!
//! Any backend that can run a tagged one-shot job after a delay satisfies
//! [`DeferredExecutor`]: an OS job service, a message queue with delayed
//! delivery, or the in-process [`TimerQueue`](super::TimerQueue).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which handler a fired job is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// The alarm is due.
    Main,
    /// The pre-alarm reminder is due.
    Upcoming,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Main => f.write_str("main"),
            TriggerKind::Upcoming => f.write_str("upcoming"),
        }
    }
}

/// What a fired job carries back into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    pub alarm_id: i64,
    pub kind: TriggerKind,
}

impl JobPayload {
    pub fn main(alarm_id: i64) -> Self {
        Self {
            alarm_id,
            kind: TriggerKind::Main,
        }
    }

    pub fn upcoming(alarm_id: i64) -> Self {
        Self {
            alarm_id,
            kind: TriggerKind::Upcoming,
        }
    }
}

/// External substrate that runs jobs later, possibly in another process
/// lifetime.
///
/// `enqueue` never replaces jobs already filed under the same tag; callers
/// cancel by tag first. Delivery may be at-least-once.
#[async_trait]
pub trait DeferredExecutor: Send + Sync {
    /// Run `payload` once after `delay`, filed under `tag`.
    ///
    /// Returns `CoreError::PermissionDenied` when precise timing is refused.
    async fn enqueue(&self, tag: &str, payload: JobPayload, delay: Duration) -> Result<()>;

    /// Drop every pending job filed under `tag`. No-op when none exist.
    async fn cancel_all_by_tag(&self, tag: &str) -> Result<()>;
}

/// Tag for a job of `kind` belonging to `alarm_id`.
pub fn job_tag(prefix: &str, kind: TriggerKind, alarm_id: i64) -> String {
    match kind {
        TriggerKind::Main => format!("{prefix}{alarm_id}"),
        TriggerKind::Upcoming => format!("{prefix}upcoming-{alarm_id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_distinct_per_kind() {
        assert_eq!(job_tag("alarm-", TriggerKind::Main, 7), "alarm-7");
        assert_eq!(job_tag("alarm-", TriggerKind::Upcoming, 7), "alarm-upcoming-7");
    }

    #[test]
    fn payload_serializes_compactly() {
        let json = serde_json::to_string(&JobPayload::upcoming(3)).unwrap();
        assert_eq!(json, r#"{"alarm_id":3,"kind":"upcoming"}"#);
    }
}
