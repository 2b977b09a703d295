use std::sync::Arc;
use std::time::Duration;

use alarmclock_core::{AlarmEngine, Collaborators, Config, SqliteAlarmStore, SystemClock, TimerQueue};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{info, warn};

use super::CliResult;
use crate::platform::Terminal;

#[derive(Args)]
pub struct RunArgs {
    /// Seconds between store rescans (overrides daemon.rescan_interval_secs, 0 disables)
    #[arg(long)]
    rescan_secs: Option<u64>,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Resolves on the next tick, or never when rescans are disabled.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn parse_id(arg: Option<&str>) -> Option<i64> {
    arg.and_then(|s| s.parse().ok())
}

async fn handle_line(engine: &AlarmEngine, line: &str) -> Flow {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let id = parse_id(words.next());

    match (command, id) {
        ("", _) => {}
        ("stop", Some(id)) => match engine.stop(id).await {
            Ok(true) => println!("stopped {id}"),
            Ok(false) => println!("alarm {id} is not ringing"),
            Err(e) => warn!(alarm_id = id, error = %e, "stop failed"),
        },
        ("snooze", Some(id)) => match engine.snooze(id).await {
            Ok(true) => println!("snoozed {id}"),
            Ok(false) => println!("alarm {id} is not ringing"),
            Err(e) => warn!(alarm_id = id, error = %e, "snooze failed"),
        },
        ("rescan", _) => match engine.resync().await {
            Ok(report) => println!(
                "armed {}, stale {}, cancelled {}",
                report.scheduled.len(),
                report.stale.len(),
                report.cancelled.len()
            ),
            Err(e) => warn!(error = %e, "rescan failed"),
        },
        ("ringing", _) => println!("{:?}", engine.sessions().ringing_ids()),
        ("quit" | "exit", _) => return Flow::Quit,
        _ => println!("commands: stop <id>, snooze <id>, rescan, ringing, quit"),
    }
    Flow::Continue
}

pub async fn run(args: RunArgs) -> CliResult {
    let config = Config::load()?;
    let store = Arc::new(SqliteAlarmStore::open()?);
    let (queue, fired) = TimerQueue::new();
    let engine = Arc::new(AlarmEngine::new(
        Collaborators {
            store,
            executor: queue,
            clock: Arc::new(SystemClock),
            platform: Terminal::platform(),
        },
        &config.engine_settings(),
    ));

    let report = engine.recover_on_boot().await?;
    for (alarm_id, error) in &report.failed {
        warn!(alarm_id, %error, "alarm could not be armed");
    }
    tokio::spawn(Arc::clone(&engine).run(fired));

    let rescan_secs = args
        .rescan_secs
        .unwrap_or(config.daemon.rescan_interval_secs);
    let mut ticker = (rescan_secs > 0).then(|| {
        let mut ticker = tokio::time::interval(Duration::from_secs(rescan_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(rescan_secs, "daemon running");
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = next_tick(&mut ticker) => {
                if let Err(e) = engine.resync().await {
                    warn!(error = %e, "store rescan failed");
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if handle_line(&engine, &line).await == Flow::Quit {
                        break;
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "stdin closed");
                    stdin_open = false;
                }
            },
        }
    }

    for alarm_id in engine.sessions().ringing_ids() {
        engine.sessions().dismiss(alarm_id).await;
    }
    info!("daemon stopped");
    Ok(())
}
