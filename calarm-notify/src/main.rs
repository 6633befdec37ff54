mod client;
mod input;
mod notifier;

use anyhow::{Context, Result};
use calarm_core::config::CalarmConfig;
use calarm_core::monitor::{MonitorEvent, MonitorHandle, MonitorOptions, MonitorState, SystemClock};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::client::RestStore;
use crate::input::{HELP, Input};

#[derive(Parser)]
#[command(name = "calarm-notify")]
#[command(about = "Watch calendar alarms and raise desktop notifications when they are due")]
struct Cli {
    /// Base URL of the calarm REST API
    #[arg(long)]
    api_url: Option<String>,

    /// Authorization header value forwarded to CalDAV
    #[arg(long)]
    authorization: Option<String>,

    /// Default snooze length in minutes
    #[arg(long)]
    snooze_minutes: Option<u32>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor alarms until interrupted (the default)
    Run,
    /// Print alarm fire times in a window (default: the next 30 days)
    Alarms {
        /// Window start (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Window end (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },
    /// Write a commented default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("calarm_notify=info,calarm_core=info")),
        )
        .init();

    let cli = Cli::parse();

    if let Some(Commands::InitConfig { force }) = cli.command {
        return init_config(force);
    }

    let mut config = CalarmConfig::load().context("Failed to load calarm config")?;
    if let Some(api_url) = cli.api_url {
        config.monitor.api_url = api_url;
    }
    if let Some(authorization) = cli.authorization {
        config.monitor.authorization = Some(authorization);
    }
    if let Some(minutes) = cli.snooze_minutes {
        config.monitor.snooze_minutes = minutes;
    }

    let store = RestStore::from_config(&config.monitor)?;

    match cli.command {
        Some(Commands::Alarms { from, to }) => print_alarms(&store, from.as_deref(), to.as_deref()).await,
        _ => run(store, &config).await,
    }
}

fn init_config(force: bool) -> Result<()> {
    let path = CalarmConfig::config_path()?;
    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {}\n\nUse --force to overwrite it.",
            path.display()
        );
    }
    CalarmConfig::create_default_config(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn print_alarms(store: &RestStore, from: Option<&str>, to: Option<&str>) -> Result<()> {
    let alarms = store.alarms(from, to).await?;
    if alarms.is_empty() {
        println!("No alarms in window");
    }
    for ms in alarms {
        match DateTime::from_timestamp_millis(ms) {
            Some(at) => println!("{}  ({ms})", at.with_timezone(&Local).format("%a %Y-%m-%d %H:%M:%S")),
            None => println!("{ms}"),
        }
    }
    Ok(())
}

async fn run(store: RestStore, config: &CalarmConfig) -> Result<()> {
    let snooze_default = config.monitor.snooze_minutes;
    let monitor = MonitorHandle::spawn(store, SystemClock, MonitorOptions::from(&config.monitor));
    let mut events = monitor.subscribe();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(api = %config.monitor.api_url, "watching alarms");
    println!("{HELP}");

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = events.recv() => match event {
                Ok(MonitorEvent::AlarmDue(due)) => {
                    println!(
                        "⏰ {} at {} (d to dismiss, s [minutes] to snooze)",
                        due.event.summary,
                        due.event.start.with_timezone(&Local).format("%H:%M")
                    );
                    notifier::present(&due).await;
                }
                Ok(MonitorEvent::Dismissed(due)) => println!("Dismissed {}", due.event.summary),
                Ok(MonitorEvent::Snoozed { original, created }) => println!(
                    "Snoozed {}, reminder at {}",
                    original.event.summary,
                    created.start.with_timezone(&Local).format("%H:%M")
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed monitor events"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match input::parse(&line) {
                    Ok(Some(Input::Quit)) => break,
                    Ok(Some(input)) => handle_input(&monitor, input, snooze_default).await,
                    Ok(None) => {}
                    Err(e) => eprintln!("{e}\n{HELP}"),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "stdin unavailable, continuing without commands");
                    stdin_open = false;
                }
            },
        }
    }

    monitor.shutdown().await;
    Ok(())
}

async fn handle_input(monitor: &MonitorHandle, input: Input, snooze_default: u32) {
    let result = match input {
        Input::Dismiss => monitor.dismiss().await.map(|_| ()),
        Input::Snooze(minutes) => monitor
            .snooze(minutes.unwrap_or(snooze_default))
            .await
            .map(|_| ()),
        Input::Refresh => monitor.refresh().await,
        Input::Status => monitor.snapshot().await.map(|snapshot| {
            match snapshot.state {
                MonitorState::Idle => println!("Idle"),
                MonitorState::Presenting(due) => println!("Presenting {}", due.event.summary),
            }
            println!(
                "{} upcoming, {} fired this session",
                snapshot.candidates.len(),
                snapshot.fired.len()
            );
        }),
        Input::Quit => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("{e}");
    }
}
