use std::sync::Arc;

use alarmclock_core::{
    Alarm, AlarmDraft, AlarmEngine, Collaborators, Config, CoreError, SqliteAlarmStore,
    SystemClock, Weekdays,
};
use chrono::Local;
use clap::{Args, Subcommand};

use super::CliResult;
use crate::platform::{DaemonHandoff, Terminal};

#[derive(Subcommand)]
pub enum AlarmAction {
    /// Create an alarm
    Add {
        /// Time of day, HH:MM
        time: String,
        #[command(flatten)]
        opts: AlarmOpts,
        /// Save without arming
        #[arg(long)]
        disabled: bool,
    },
    /// List alarms
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print one alarm as JSON
    Show { id: i64 },
    /// Change an alarm; unspecified fields are kept
    Edit {
        id: i64,
        /// New time of day, HH:MM
        #[arg(long)]
        time: Option<String>,
        #[command(flatten)]
        opts: AlarmOpts,
    },
    /// Arm an alarm
    Enable { id: i64 },
    /// Disarm an alarm
    Disable { id: i64 },
    /// Delete an alarm
    Delete { id: i64 },
}

#[derive(Args)]
pub struct AlarmOpts {
    /// Repeat days: once, daily, workdays, weekend, or a list like mon,wed
    #[arg(long)]
    days: Option<Weekdays>,
    #[arg(long)]
    label: Option<String>,
    #[arg(long)]
    tone: Option<String>,
    /// Snooze length in minutes
    #[arg(long)]
    snooze: Option<u32>,
    #[arg(long)]
    vibrate: Option<bool>,
    /// Re-arm automatically when left ringing
    #[arg(long)]
    auto_snooze: Option<bool>,
    /// Automatic snoozes before giving up (0 = unlimited)
    #[arg(long)]
    max_cycles: Option<u32>,
}

impl AlarmOpts {
    fn apply(self, draft: &mut AlarmDraft) {
        if let Some(days) = self.days {
            draft.days = days;
        }
        if let Some(label) = self.label {
            draft.label = label;
        }
        if let Some(tone) = self.tone {
            draft.tone = tone;
        }
        if let Some(snooze) = self.snooze {
            draft.snooze_minutes = snooze;
        }
        if let Some(vibrate) = self.vibrate {
            draft.vibrate = vibrate;
        }
        if let Some(auto_snooze) = self.auto_snooze {
            draft.auto_snooze_enabled = auto_snooze;
        }
        if let Some(max_cycles) = self.max_cycles {
            draft.auto_snooze_max_cycles = max_cycles;
        }
    }
}

fn open_engine(config: &Config) -> Result<AlarmEngine, CoreError> {
    let store = Arc::new(SqliteAlarmStore::open()?);
    Ok(AlarmEngine::new(
        Collaborators {
            store,
            executor: Arc::new(DaemonHandoff),
            clock: Arc::new(SystemClock),
            platform: Terminal::platform(),
        },
        &config.engine_settings(),
    ))
}

fn next_fire_label(alarm: &Alarm) -> String {
    if !alarm.enabled {
        return "off".into();
    }
    alarm
        .next_fire_at_utc()
        .map(|at| at.with_timezone(&Local).format("%a %Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".into())
}

fn print_row(alarm: &Alarm) {
    println!(
        "{:>4}  {}  {:<14} {:<22} {}",
        alarm.id,
        alarm.time_label(),
        alarm.days.to_string(),
        next_fire_label(alarm),
        alarm.label
    );
}

pub async fn run(action: AlarmAction) -> CliResult {
    let config = Config::load()?;
    let engine = open_engine(&config)?;

    match action {
        AlarmAction::Add {
            time,
            opts,
            disabled,
        } => {
            let (hour, minute) = AlarmDraft::parse_time(&time)?;
            let mut draft = config.draft(hour, minute);
            opts.apply(&mut draft);
            draft.enabled = !disabled;
            let alarm = engine.create_alarm(&draft).await?;
            println!("Alarm created: {}", alarm.id);
            print_row(&alarm);
        }
        AlarmAction::List { json } => {
            let alarms = engine.alarms().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&alarms)?);
            } else if alarms.is_empty() {
                println!("No alarms.");
            } else {
                for alarm in &alarms {
                    print_row(alarm);
                }
            }
        }
        AlarmAction::Show { id } => {
            let alarm = engine.alarm(id).await?.ok_or(CoreError::NotFound(id))?;
            println!("{}", serde_json::to_string_pretty(&alarm)?);
        }
        AlarmAction::Edit { id, time, opts } => {
            let current = engine.alarm(id).await?.ok_or(CoreError::NotFound(id))?;
            let mut draft = AlarmDraft::from(&current);
            if let Some(time) = time {
                (draft.hour, draft.minute) = AlarmDraft::parse_time(&time)?;
            }
            opts.apply(&mut draft);
            let alarm = engine.update_alarm(id, &draft).await?;
            println!("Alarm updated: {}", alarm.id);
            print_row(&alarm);
        }
        AlarmAction::Enable { id } => {
            let alarm = engine.set_enabled(id, true).await?;
            print_row(&alarm);
        }
        AlarmAction::Disable { id } => {
            let alarm = engine.set_enabled(id, false).await?;
            print_row(&alarm);
        }
        AlarmAction::Delete { id } => {
            engine.delete_alarm(id).await?;
            println!("Alarm deleted: {id}");
        }
    }
    Ok(())
}
