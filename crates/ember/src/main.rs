//! Ember: rate-limited publish scheduler.
//!
//! Main binary with subcommands:
//! - `daemon`: Run the publish scheduler loop until interrupted
//! - `run-once`: Run a single publish cycle and exit

use clap::{Args, Parser, Subcommand};
use ember_scheduler::ScheduleConfig;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod daemon;

/// Parse boolean from environment variable, accepting common truthy values.
/// Accepts "1", "true", "yes", "on" (case-insensitive) as true.
/// Accepts "0", "false", "no", "off", "" (case-insensitive) as false.
fn parse_bool_env(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(format!(
            "invalid boolean value '{}', expected 1/true/yes/on or 0/false/no/off",
            s
        )),
    }
}

#[derive(Parser)]
#[command(name = "ember")]
#[command(about = "Rate-limited publish scheduler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Platform connection and schedule tuning, shared by all commands.
#[derive(Args)]
struct SchedulerArgs {
    /// Platform API base URL
    #[arg(long, env = "EMBER_API_URL")]
    api_url: String,

    /// Platform API bearer token
    #[arg(long, env = "EMBER_API_TOKEN")]
    api_token: String,

    /// Hours between publish cycles (0 = every check)
    #[arg(long, env = "EMBER_INTERVAL_HOURS", default_value = "24")]
    interval_hours: u64,

    /// Maximum tasks per cycle
    #[arg(long, default_value = "10")]
    batch_size: usize,

    /// Concurrent publish workers
    #[arg(long, default_value = "2")]
    max_workers: usize,

    /// Seconds between cadence checks
    #[arg(long, default_value = "60")]
    check_interval: u64,

    /// Minimum seconds between any two publish calls
    #[arg(long, default_value = "30")]
    min_publish_interval: u64,

    /// Rolling per-minute cap on outbound API calls
    #[arg(long, default_value = "15")]
    max_requests_per_minute: u32,

    /// Per-call deadline in seconds
    #[arg(long, default_value = "30")]
    api_timeout: u64,

    /// Retry rate-limited attempts instead of failing them
    #[arg(long, env = "EMBER_RETRY_ON_RATE_LIMIT", value_parser = parse_bool_env, default_value = "true")]
    retry_on_rate_limit: bool,

    /// Attempts before a task is marked failed
    #[arg(long, default_value = "5")]
    max_attempts: u32,

    /// Base retry backoff in seconds
    #[arg(long, default_value = "60")]
    retry_backoff_base: u64,

    /// Retry backoff cap in seconds
    #[arg(long, default_value = "3600")]
    retry_backoff_cap: u64,
}

impl SchedulerArgs {
    fn schedule_config(&self) -> ScheduleConfig {
        ScheduleConfig {
            interval_hours: self.interval_hours,
            batch_size: self.batch_size,
            max_workers: self.max_workers,
            check_interval_secs: self.check_interval,
            min_publish_interval_secs: self.min_publish_interval,
            max_requests_per_minute: self.max_requests_per_minute,
            api_timeout_secs: self.api_timeout,
            retry_on_rate_limit: self.retry_on_rate_limit,
            max_attempts: self.max_attempts,
            retry_backoff_base_secs: self.retry_backoff_base,
            retry_backoff_cap_secs: self.retry_backoff_cap,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the publish scheduler loop until interrupted
    Daemon {
        #[command(flatten)]
        args: SchedulerArgs,
    },

    /// Run a single publish cycle and exit
    RunOnce {
        #[command(flatten)]
        args: SchedulerArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "ember=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon { args } => daemon::run(&args).await,
        Commands::RunOnce { args } => daemon::run_once(&args).await,
    }
}
