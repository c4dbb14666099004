//! Main entry point for the event callbacks runner
//!
//! Loads configuration, sets up logging and replays the dispatch scenarios
//! against an in-process event bus.

mod cli;
mod config;
mod scenarios;

use anyhow::anyhow;
use cli::CliArgs;
use config::{AppConfig, LoggingSettings};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    let args = CliArgs::parse();

    match run(args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("❌ Failed to start: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Returns whether every scenario passed.
fn run(args: CliArgs) -> anyhow::Result<bool> {
    let mut config = AppConfig::load_from_file(&args.config_path)?;
    config.apply_cli_overrides(&args);
    config
        .validate()
        .map_err(|e| anyhow!("Configuration validation failed: {e}"))?;

    setup_logging(&config.logging)?;
    info!(
        "🚀 Event callbacks v{} ({:?}, default priority {})",
        env!("CARGO_PKG_VERSION"),
        config.callbacks.key_policy,
        config.callbacks.default_priority
    );

    let outcomes = scenarios::run_all(config.callbacks);
    let passed = outcomes.iter().filter(|outcome| outcome.passed()).count();
    let events_fired: u64 = outcomes.iter().map(|o| o.bus_stats.events_fired).sum();
    let executors_run: u64 = outcomes.iter().map(|o| o.bus_stats.executors_run).sum();
    let failures: u64 = outcomes.iter().map(|o| o.bus_stats.executor_failures).sum();

    info!("📊 Final Statistics:");
    info!("  - Scenarios passed: {}/{}", passed, outcomes.len());
    info!("  - Events fired: {}", events_fired);
    info!("  - Executors run: {}", executors_run);
    info!("  - Executor failures: {}", failures);

    if passed != outcomes.len() {
        error!("❌ {} scenario(s) failed", outcomes.len() - passed);
        return Ok(false);
    }
    Ok(true)
}

fn setup_logging(config: &LoggingSettings) -> anyhow::Result<()> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}
