//! Alarm entity, weekday mask and the user-editable draft.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Weekday recurrence mask.
///
/// Bit 0 is Monday, bit 6 is Sunday. An empty mask means the alarm is a
/// one-shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weekdays(u8);

impl Weekdays {
    pub const NONE: Weekdays = Weekdays(0);
    pub const WORKDAYS: Weekdays = Weekdays(0b001_1111);
    pub const WEEKEND: Weekdays = Weekdays(0b110_0000);
    pub const ALL: Weekdays = Weekdays(0b111_1111);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    #[must_use]
    pub fn with(self, day: Weekday) -> Self {
        Self(self.0 | (1 << day.num_days_from_monday()))
    }

    /// Days in the mask, Monday first.
    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        const WEEK: [Weekday; 7] = [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ];
        WEEK.into_iter().filter(move |day| self.contains(*day))
    }
}

impl FromIterator<Weekday> for Weekdays {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        iter.into_iter().fold(Weekdays::NONE, Weekdays::with)
    }
}

impl fmt::Display for Weekdays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Weekdays::NONE => f.write_str("once"),
            Weekdays::ALL => f.write_str("daily"),
            Weekdays::WORKDAYS => f.write_str("workdays"),
            Weekdays::WEEKEND => f.write_str("weekend"),
            days => {
                let names: Vec<String> = days
                    .iter()
                    .map(|d| d.to_string().to_lowercase())
                    .collect();
                f.write_str(&names.join(","))
            }
        }
    }
}

impl FromStr for Weekdays {
    type Err = ValidationError;

    /// Accepts `once`, `daily`, `workdays`, `weekend` or a comma-separated
    /// list of day names (`mon,wed`, `monday,friday`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "" | "once" => return Ok(Weekdays::NONE),
            "daily" => return Ok(Weekdays::ALL),
            "workdays" | "weekdays" => return Ok(Weekdays::WORKDAYS),
            "weekend" => return Ok(Weekdays::WEEKEND),
            _ => {}
        }
        s.split(',')
            .map(|part| {
                part.trim()
                    .parse::<Weekday>()
                    .map_err(|_| ValidationError::InvalidValue {
                        field: "days".into(),
                        message: format!("unknown weekday '{}'", part.trim()),
                    })
            })
            .collect()
    }
}

/// A persisted alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    /// Store-assigned id; 0 until inserted.
    pub id: i64,
    /// Nominal time of day, preserved across recurrences.
    pub hour: u32,
    pub minute: u32,
    /// Next scheduled firing, epoch milliseconds.
    pub next_fire_at: i64,
    pub enabled: bool,
    pub days: Weekdays,
    pub label: String,
    pub tone: String,
    pub vibrate: bool,
    pub snooze_minutes: u32,
    pub auto_snooze_enabled: bool,
    /// 0 means unlimited.
    pub auto_snooze_max_cycles: u32,
    pub auto_snooze_count: u32,
    /// Whether the pre-alarm notification was already shown for `next_fire_at`.
    pub upcoming_shown: bool,
}

impl Alarm {
    pub fn is_recurring(&self) -> bool {
        !self.days.is_empty()
    }

    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }

    pub fn next_fire_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.next_fire_at)
    }

    /// Snooze length in milliseconds.
    pub fn snooze_ms(&self) -> i64 {
        i64::from(self.snooze_minutes) * 60_000
    }

    /// Whether the watcher has used up every automatic snooze.
    pub fn auto_snooze_exhausted(&self) -> bool {
        self.auto_snooze_max_cycles > 0 && self.auto_snooze_count >= self.auto_snooze_max_cycles
    }

    pub fn time_label(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }
}

/// The user-editable part of an alarm, as produced by the edit flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmDraft {
    pub hour: u32,
    pub minute: u32,
    #[serde(default)]
    pub days: Weekdays,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default = "default_true")]
    pub vibrate: bool,
    #[serde(default = "default_snooze_minutes")]
    pub snooze_minutes: u32,
    #[serde(default = "default_true")]
    pub auto_snooze_enabled: bool,
    #[serde(default = "default_auto_snooze_max_cycles")]
    pub auto_snooze_max_cycles: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_tone() -> String {
    "default".into()
}
fn default_true() -> bool {
    true
}
fn default_snooze_minutes() -> u32 {
    10
}
fn default_auto_snooze_max_cycles() -> u32 {
    3
}

impl AlarmDraft {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self {
            hour,
            minute,
            days: Weekdays::NONE,
            label: String::new(),
            tone: default_tone(),
            vibrate: true,
            snooze_minutes: default_snooze_minutes(),
            auto_snooze_enabled: true,
            auto_snooze_max_cycles: default_auto_snooze_max_cycles(),
            enabled: true,
        }
    }

    /// Parse an `HH:MM` time of day.
    pub fn parse_time(s: &str) -> Result<(u32, u32), ValidationError> {
        use chrono::Timelike;
        let time = NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|e| {
            ValidationError::InvalidValue {
                field: "time".into(),
                message: format!("'{s}' is not HH:MM ({e})"),
            }
        })?;
        Ok((time.hour(), time.minute()))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.hour > 23 || self.minute > 59 {
            return Err(ValidationError::InvalidTime {
                hour: self.hour,
                minute: self.minute,
            });
        }
        if self.days.bits() > Weekdays::ALL.bits() {
            return Err(ValidationError::InvalidDays(self.days.bits()));
        }
        if self.snooze_minutes == 0 {
            return Err(ValidationError::InvalidValue {
                field: "snooze_minutes".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Copy the draft onto an existing record, leaving derived fields alone.
    pub fn apply_to(&self, alarm: &mut Alarm) {
        alarm.hour = self.hour;
        alarm.minute = self.minute;
        alarm.days = self.days;
        alarm.label = self.label.clone();
        alarm.tone = self.tone.clone();
        alarm.vibrate = self.vibrate;
        alarm.snooze_minutes = self.snooze_minutes;
        alarm.auto_snooze_enabled = self.auto_snooze_enabled;
        alarm.auto_snooze_max_cycles = self.auto_snooze_max_cycles;
        alarm.enabled = self.enabled;
    }

    /// An unpersisted alarm carrying this draft; `next_fire_at` is left at 0.
    pub fn to_alarm(&self) -> Alarm {
        let mut alarm = Alarm {
            id: 0,
            hour: 0,
            minute: 0,
            next_fire_at: 0,
            enabled: false,
            days: Weekdays::NONE,
            label: String::new(),
            tone: String::new(),
            vibrate: false,
            snooze_minutes: 0,
            auto_snooze_enabled: false,
            auto_snooze_max_cycles: 0,
            auto_snooze_count: 0,
            upcoming_shown: false,
        };
        self.apply_to(&mut alarm);
        alarm
    }
}

impl From<&Alarm> for AlarmDraft {
    fn from(alarm: &Alarm) -> Self {
        Self {
            hour: alarm.hour,
            minute: alarm.minute,
            days: alarm.days,
            label: alarm.label.clone(),
            tone: alarm.tone.clone(),
            vibrate: alarm.vibrate,
            snooze_minutes: alarm.snooze_minutes,
            auto_snooze_enabled: alarm.auto_snooze_enabled,
            auto_snooze_max_cycles: alarm.auto_snooze_max_cycles,
            enabled: alarm.enabled,
        }
    }
}
