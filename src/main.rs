//! launchdeck - Headless driver for the launch orchestrator
//!
//! Replays recorded backend event streams (JSON lines, typed envelopes or the
//! legacy untyped form) and prints the resulting console log and state.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use launchdeck::backend::DetachedBackend;
use launchdeck::core::{LauncherState, Orchestrator, Settings};
use launchdeck::events::Event;
use launchdeck::{APP_NAME, APP_VERSION};

#[derive(Parser)]
#[command(name = "launchdeck", version, about = "Download and launch orchestration")]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Feed a recorded event stream through the orchestrator
    Replay {
        /// JSON-lines file; reads stdin when omitted or "-"
        file: Option<PathBuf>,
        /// Print the final state as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print the effective settings
    Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli.settings.clone().unwrap_or_else(Settings::default_path);
    let settings = Settings::load(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

    init_logging(settings.debug_logging);
    info!("{} v{} starting...", APP_NAME, APP_VERSION);

    match cli.command {
        Command::Replay { file, json } => replay(settings, file, json).await,
        Command::Settings => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

/// Initialize the logging system
fn init_logging(debug: bool) {
    let default = if debug { "launchdeck=debug" } else { "launchdeck=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn replay(settings: Settings, file: Option<PathBuf>, json: bool) -> Result<()> {
    let state = LauncherState::new(&settings);
    let orchestrator = Orchestrator::new(state, Arc::new(DetachedBackend), settings);

    let (tx, rx) = orchestrator.event_channel();
    let subscription = orchestrator.attach(rx);

    let input: Box<dyn AsyncBufRead + Unpin + Send> = match file {
        Some(path) if path.as_os_str() != "-" => {
            let f = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Box::new(BufReader::new(f))
        }
        _ => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let mut lines = input.lines();
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await.context("Failed to read event stream")? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match Event::from_json(&line) {
            Ok(Some(event)) => {
                if tx.send(event).await.is_err() {
                    warn!("Event subscription closed early at line {}", line_no);
                    break;
                }
            }
            Ok(None) => debug!("Line {}: legacy message without a typed counterpart", line_no),
            Err(e) => warn!("Line {}: {}", line_no, e),
        }
    }
    drop(tx);

    let routed = subscription.shutdown().await;
    info!("Replayed {} events", routed);

    let snapshot = orchestrator.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    for line in &snapshot.logs {
        println!("{}", line);
    }
    println!();
    match &snapshot.launching {
        Some(id) => println!("launching: {}", id),
        None => println!("launching: -"),
    }
    for (id, record) in &snapshot.progress {
        println!(
            "{}: {} {}/{}",
            id,
            record.status.label(),
            record.current,
            record.total
        );
    }
    Ok(())
}
