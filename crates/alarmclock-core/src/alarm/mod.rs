mod model;
mod trigger;

pub use model::{Alarm, AlarmDraft, Weekdays};
pub use trigger::{compute_next_trigger, initial_trigger};
