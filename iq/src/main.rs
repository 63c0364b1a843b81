//! iq - idlequeue command-line front end
//!
//! Inspect configuration, replay the scripted workload on a simulated clock,
//! or drive the real engine actor for a few seconds.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use idlequeue::cli::{Cli, Command, OutputFormat, get_log_path};
use idlequeue::config::{Config, Profile};
use idlequeue::host::SchedulerHandle;
use idlequeue::scheduler::ScheduleOptions;
use idlequeue::simulate::{Simulation, SimulationReport, TimelineKind};

fn parse_level(level_str: Option<&str>) -> tracing::Level {
    match level_str {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    }
}

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>, stderr: bool) -> Result<()> {
    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = parse_level(cli_log_level.or(config_log_level));
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    if stderr {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        let log_path = get_log_path();
        let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&log_dir).context("Failed to create log directory")?;
        let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

        tracing_subscriber::fmt()
            .with_writer(log_file)
            .with_ansi(false)
            .with_env_filter(filter)
            .init();
    }

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref(), cli.stderr)
        .context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(profile = %config.profile, "idlequeue loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Config { profile } => cmd_config(&config, profile),
        Command::Profiles => cmd_profiles(),
        Command::Simulate {
            profile,
            duration_ms,
            format,
        } => cmd_simulate(&config, profile, duration_ms, format),
        Command::Run { seconds, format } => cmd_run(&config, seconds, format).await,
    }
}

fn cmd_config(config: &Config, profile: Option<Profile>) -> Result<()> {
    debug!(?profile, "cmd_config: called");
    let config = match profile {
        Some(profile) => Config::for_profile(profile),
        None => config.clone(),
    };
    print!("{}", config.to_yaml()?);
    Ok(())
}

fn cmd_profiles() -> Result<()> {
    debug!("cmd_profiles: called");
    for profile in [Profile::Browser, Profile::Timer] {
        let config = Config::for_profile(profile);
        let frames = match config.engine.frame_period_ms {
            Some(period) => format!("{period}ms frames"),
            None => "no frame pacing".to_string(),
        };
        println!(
            "{:<8} tick {}ms (+{}ms), idle after {} polls, window {}ms, {}",
            profile.to_string().bold(),
            config.monitor.tick_ms,
            config.monitor.fuzziness_ms,
            config.monitor.idle_threshold,
            config.scheduler.default_interval_ms,
            frames
        );
    }
    Ok(())
}

fn cmd_simulate(config: &Config, profile: Option<Profile>, duration_ms: u64, format: OutputFormat) -> Result<()> {
    debug!(?profile, duration_ms, ?format, "cmd_simulate: called");
    let config = match profile {
        Some(profile) => Config::for_profile(profile),
        None => config.clone(),
    };
    let report = Simulation::new(config, duration_ms).run();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report).context("Failed to serialize report")?);
        }
        OutputFormat::Text => print_timeline(&report),
    }
    Ok(())
}

fn print_timeline(report: &SimulationReport) {
    println!(
        "{} profile, {}ms simulated (clock ended at {}ms)",
        report.profile.to_string().bold(),
        report.duration_ms,
        report.ended_ms
    );
    println!();

    for entry in &report.timeline {
        let kind = format!("{:<9}", entry.kind.to_string());
        let kind = match entry.kind {
            TimelineKind::Scheduled => kind.cyan(),
            TimelineKind::Executed => kind.green(),
            TimelineKind::Failed => kind.red().bold(),
            TimelineKind::Working | TimelineKind::Finished => kind.yellow(),
            TimelineKind::Busy => kind.red(),
            TimelineKind::Idle | TimelineKind::Flushed => kind.blue().bold(),
            TimelineKind::Activity => kind.magenta(),
        };
        let label = entry.label.as_deref().unwrap_or("-");
        println!(
            "{} {} {:<8} {}",
            format!("{:>7}ms", entry.at_ms).dimmed(),
            kind,
            label.bold(),
            entry.detail
        );
    }

    let stats = &report.stats;
    println!();
    println!(
        "polls {} (busy {}), batches {}, callbacks {}, failures {}, backoffs {}, idle actions {}",
        stats.monitor.polls,
        stats.monitor.busy_polls,
        stats.scheduler.batches_executed,
        stats.scheduler.callbacks_run,
        stats.scheduler.callback_failures,
        stats.scheduler.backoff_growths,
        stats.idle_actions
    );
}

async fn cmd_run(config: &Config, seconds: u64, format: OutputFormat) -> Result<()> {
    debug!(seconds, ?format, "cmd_run: called");
    let handle = SchedulerHandle::spawn(config);
    let started = tokio::time::Instant::now();
    let quiet = format == OutputFormat::Json;

    let announce = Arc::new(move |label: &str, detail: &str| {
        if !quiet {
            println!(
                "{} {} {}",
                format!("{:>7}ms", started.elapsed().as_millis()).dimmed(),
                label.bold(),
                detail
            );
        }
    });

    // A burst of typing: only the last query should run
    for query in ["i", "id", "idl", "idle"] {
        let announce = announce.clone();
        let detail = format!("searched '{query}'");
        handle
            .schedule_task(
                "search",
                move || {
                    announce("search", &detail);
                    Ok(())
                },
                ScheduleOptions::debounce(),
            )
            .await?;
    }

    // Log lines coalesce into one batch
    for line in ["starting", "ready"] {
        let announce = announce.clone();
        let detail = format!("wrote '{line}'");
        handle
            .schedule_task(
                "log",
                move || {
                    announce("log", &detail);
                    Ok(())
                },
                ScheduleOptions::queued(),
            )
            .await?;
    }

    // Report activity for the first half of the run so idle comes late
    let activity = handle.activity_handle();
    let active_for = Duration::from_millis(seconds.saturating_mul(500));
    tokio::spawn(async move {
        let deadline = tokio::time::Instant::now() + active_for;
        while tokio::time::Instant::now() < deadline {
            if activity.signal().is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    });

    tokio::time::sleep(Duration::from_secs(seconds)).await;

    let stats = handle.stats().await?;
    let tasks = handle.tasks().await?;
    let idle = handle.is_idle().await?;
    handle.shutdown().await?;

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({ "idle": idle, "stats": stats, "tasks": tasks });
            println!("{}", serde_json::to_string_pretty(&out).context("Failed to serialize stats")?);
        }
        OutputFormat::Text => {
            println!();
            println!(
                "idle {}, polls {} (busy {}), batches {}, idle actions {}, records left {}",
                if idle { "yes".green() } else { "no".yellow() },
                stats.monitor.polls,
                stats.monitor.busy_polls,
                stats.scheduler.batches_executed,
                stats.idle_actions,
                tasks.len()
            );
        }
    }
    Ok(())
}
