use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod platform;

#[derive(Parser)]
#[command(name = "alarmclock", version, about = "Alarm clock CLI and ringing daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Alarm management
    Alarm {
        #[command(subcommand)]
        action: commands::alarm::AlarmAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run the ringing daemon in the foreground
    Run(commands::run::RunArgs),
}

/// Log to stderr, filtered by `ALARMCLOCK_LOG` (e.g. `alarmclock_core=debug`).
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env("ALARMCLOCK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(match cli.command {
        Commands::Run(_) => "info",
        _ => "warn",
    });

    let result = match cli.command {
        Commands::Alarm { action } => commands::alarm::run(action).await,
        Commands::Config { action } => commands::config::run(action),
        Commands::Run(args) => commands::run::run(args).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
    // The daemon's stdin reader may still be parked in a blocking read.
    std::process::exit(0);
}
