//! pacer - run a timed multi-phase session from the command line
//!
//! Prints the configured schedule, or drives one session through it while
//! logging every transition and time warning.
//!
//! # Usage
//!
//! ```bash
//! # Show the schedule that would run
//! pacer schedule
//!
//! # Run a session with the default schedule
//! pacer run --session-id mock-interview
//!
//! # Use custom phases from a config file
//! pacer run --config ./pacer.toml
//!
//! # Enable debug logging
//! RUST_LOG=pacerd=debug pacer run
//! ```
//!
//! Transition events are written to stdout as JSON lines; logs go to
//! stderr.
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: end the session and exit

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pacer_core::{SessionId, WarningLevel};
use pacerd::{FnNotifier, NotifyError, PacerConfig, Scheduler, SchedulerEvent};

/// pacer - timed multi-phase session scheduler
#[derive(Parser, Debug)]
#[command(name = "pacer", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the configured schedule as JSON
    Schedule {
        /// Config file (defaults to the user config dir)
        #[arg(short, long, env = "PACER_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Run one session until its schedule completes
    Run {
        /// Config file (defaults to the user config dir)
        #[arg(short, long, env = "PACER_CONFIG")]
        config: Option<PathBuf>,

        /// Identifier for the session
        #[arg(short, long, default_value = "session")]
        session_id: String,

        /// Deadline poll interval, overriding the config
        #[arg(long)]
        poll_interval_ms: Option<u64>,

        /// How often to log progress and warnings
        #[arg(long, default_value_t = 30)]
        status_interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("pacer=info".parse()?)
                .add_directive("pacerd=info".parse()?)
                .add_directive("pacer_core=info".parse()?),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Schedule { config } => print_schedule(config),
        Command::Run {
            config,
            session_id,
            poll_interval_ms,
            status_interval_secs,
        } => {
            run_session(
                config,
                SessionId::new(session_id),
                poll_interval_ms,
                Duration::from_secs(status_interval_secs.max(1)),
            )
            .await
        }
    }
}

fn print_schedule(config: Option<PathBuf>) -> Result<()> {
    let config = PacerConfig::discover(config.as_deref()).context("Failed to load config")?;
    let schedule = config.schedule().context("Invalid schedule in config")?;
    let json = serde_json::to_string_pretty(&schedule).context("Failed to serialize schedule")?;
    println!("{json}");
    Ok(())
}

async fn run_session(
    config: Option<PathBuf>,
    session_id: SessionId,
    poll_interval_ms: Option<u64>,
    status_interval: Duration,
) -> Result<()> {
    let mut config = PacerConfig::discover(config.as_deref()).context("Failed to load config")?;
    if let Some(ms) = poll_interval_ms {
        config.scheduler = config
            .scheduler
            .with_poll_interval(Duration::from_millis(ms));
    }

    let schedule = config.schedule().context("Invalid schedule in config")?;
    let scheduler = Scheduler::new(config.scheduler).context("Invalid scheduler config")?;
    let mut events = scheduler.subscribe();

    let notifier = FnNotifier::new(|_, event| {
        let line = serde_json::to_string(event).map_err(NotifyError::failed)?;
        println!("{line}");
        Ok(())
    });

    info!(
        version = env!("CARGO_PKG_VERSION"),
        session_id = %session_id,
        total_minutes = schedule.total_duration_minutes(),
        "pacer starting"
    );
    scheduler
        .start_session(session_id.clone(), schedule, Arc::new(notifier))
        .context("Failed to start session")?;

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        shutdown_token.cancel();
    });

    let mut status_tick = interval(status_interval);
    status_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancel_token.cancelled() => {
                info!("Shutdown signal received");
                break;
            }

            event = events.recv() => match event {
                Ok(SchedulerEvent::Completed { session_id: done, time_impact }) if done == session_id => {
                    info!(
                        session_id = %done,
                        difference_minutes = time_impact.difference_minutes,
                        "Interview completed"
                    );
                    break;
                }
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },

            _ = status_tick.tick() => {
                log_status(&scheduler, &session_id).await;
            }
        }
    }

    scheduler.shutdown();
    info!("pacer stopped");
    Ok(())
}

fn log_event(event: &SchedulerEvent) {
    match event {
        SchedulerEvent::Started {
            session_id,
            total_duration_minutes,
        } => info!(session_id = %session_id, total_duration_minutes, "Started"),
        SchedulerEvent::Paused { session_id } => info!(session_id = %session_id, "Paused"),
        SchedulerEvent::Resumed { session_id } => info!(session_id = %session_id, "Resumed"),
        SchedulerEvent::Transition { session_id, event } => info!(
            session_id = %session_id,
            phase = %event.phase(),
            over_time = event.time_impact().is_over_time,
            "Phase closed"
        ),
        SchedulerEvent::Completed { session_id, .. } => {
            info!(session_id = %session_id, "Completed")
        }
        SchedulerEvent::Ended { session_id, reason } => {
            info!(session_id = %session_id, reason = %reason, "Ended")
        }
    }
}

async fn log_status(scheduler: &Scheduler, session_id: &SessionId) {
    let warnings = match scheduler.get_time_warnings(session_id).await {
        Ok(warnings) => warnings,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Status unavailable");
            return;
        }
    };

    let remaining = format!("{:.1}", warnings.remaining_minutes);
    match warnings.warnings.first() {
        Some(w) if w.level >= WarningLevel::Warning => warn!(
            phase = %warnings.phase,
            remaining_minutes = %remaining,
            level = %w.level,
            "{}",
            w.message
        ),
        Some(w) => info!(phase = %warnings.phase, remaining_minutes = %remaining, "{}", w.message),
        None => info!(phase = %warnings.phase, remaining_minutes = %remaining, "On schedule"),
    }
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_run_args() {
        let args = Args::parse_from([
            "pacer",
            "run",
            "--session-id",
            "mock-1",
            "--poll-interval-ms",
            "250",
        ]);
        match args.command {
            Command::Run {
                session_id,
                poll_interval_ms,
                status_interval_secs,
                config,
            } => {
                assert_eq!(session_id, "mock-1");
                assert_eq!(poll_interval_ms, Some(250));
                assert_eq!(status_interval_secs, 30);
                assert!(config.is_none());
            }
            other => panic!("expected Run, got {other:?}"),
        }
    }
}
