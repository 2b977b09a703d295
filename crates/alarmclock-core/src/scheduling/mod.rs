mod executor;
mod gateway;
mod timer_queue;

pub use executor::{job_tag, DeferredExecutor, JobPayload, TriggerKind};
pub use gateway::{ScheduleOutcome, SchedulingGateway};
pub use timer_queue::TimerQueue;
