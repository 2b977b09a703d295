//! In-process deferred executor on tokio timers.
//!
//! Each enqueued job is a spawned task sleeping until its delay elapses,
//! then handing its payload to the receiver returned by [`TimerQueue::new`].
//! Jobs do not survive the process; hosts re-arm from the store on start.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use super::executor::{DeferredExecutor, JobPayload};
use crate::error::Result;
use crate::util::lock;

struct PendingJob {
    seq: u64,
    payload: JobPayload,
    handle: AbortHandle,
}

type JobTable = Arc<Mutex<HashMap<String, Vec<PendingJob>>>>;

pub struct TimerQueue {
    jobs: JobTable,
    fired: mpsc::UnboundedSender<JobPayload>,
    seq: AtomicU64,
}

impl TimerQueue {
    /// Create a queue and the channel its fired jobs are delivered on.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<JobPayload>) {
        let (fired, rx) = mpsc::unbounded_channel();
        let queue = Arc::new(Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            fired,
            seq: AtomicU64::new(0),
        });
        (queue, rx)
    }

    /// Tags with at least one pending job, sorted.
    pub fn pending_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = lock(&self.jobs)
            .iter()
            .filter(|(_, jobs)| !jobs.is_empty())
            .map(|(tag, _)| tag.clone())
            .collect();
        tags.sort();
        tags
    }

    /// Payloads pending under `tag`.
    pub fn pending(&self, tag: &str) -> Vec<JobPayload> {
        lock(&self.jobs)
            .get(tag)
            .map(|jobs| jobs.iter().map(|j| j.payload).collect())
            .unwrap_or_default()
    }

    /// Total number of pending jobs.
    pub fn len(&self) -> usize {
        lock(&self.jobs).values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DeferredExecutor for TimerQueue {
    async fn enqueue(&self, tag: &str, payload: JobPayload, delay: Duration) -> Result<()> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let jobs = Arc::clone(&self.jobs);
        let fired = self.fired.clone();
        let owned_tag = tag.to_string();

        // Held across the spawn so a zero-delay job cannot finish before it is filed.
        let mut table = lock(&self.jobs);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut table = lock(&jobs);
                if let Some(pending) = table.get_mut(&owned_tag) {
                    pending.retain(|j| j.seq != seq);
                    if pending.is_empty() {
                        table.remove(&owned_tag);
                    }
                }
            }
            if fired.send(payload).is_err() {
                tracing::warn!(tag = %owned_tag, "timer queue receiver dropped, job lost");
            }
        });

        table.entry(tag.to_string()).or_default().push(PendingJob {
            seq,
            payload,
            handle: task.abort_handle(),
        });
        drop(table);
        tracing::debug!(tag, delay_ms = delay.as_millis() as u64, "job enqueued");
        Ok(())
    }

    async fn cancel_all_by_tag(&self, tag: &str) -> Result<()> {
        let removed = lock(&self.jobs).remove(tag).unwrap_or_default();
        for job in &removed {
            job.handle.abort();
        }
        if !removed.is_empty() {
            tracing::debug!(tag, count = removed.len(), "jobs cancelled");
        }
        Ok(())
    }
}
