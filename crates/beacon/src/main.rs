//! Replays a recorded notification stream through the dispatcher and prints
//! one line per handler invocation.

#![deny(unsafe_code)]

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use beacon::SummaryHandlers;
use beacon_core::logging;
use beacon_settings::{BackendMode, BeaconSettings, load_settings, load_settings_from_path};
use clap::Parser;
use tracing::warn;

#[derive(Debug, Parser)]
#[command(
    name = "beacon-replay",
    about = "Replay recorded app-server notifications through the Beacon dispatcher"
)]
struct Args {
    /// JSON-lines file of inbound records; `-` reads stdin.
    input: PathBuf,

    /// Delta coalescing window in milliseconds (overrides settings).
    #[arg(long)]
    flush_ms: Option<u64>,

    /// Log filter, e.g. `debug` or `beacon_events=trace` (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Track liveness as for a remote backend.
    #[arg(long, default_value_t = false)]
    remote: bool,

    /// Read settings from this file instead of `~/.beacon/settings.json`.
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut settings, load_error) = match &args.settings {
        Some(path) => (
            load_settings_from_path(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?,
            None,
        ),
        None => match load_settings() {
            Ok(settings) => (settings, None),
            Err(err) => (BeaconSettings::default(), Some(err)),
        },
    };
    if let Some(ms) = args.flush_ms {
        settings.dispatcher.delta_flush_interval_ms = ms.max(1);
    }
    if let Some(level) = &args.log_level {
        settings.logging.level.clone_from(level);
    }
    if args.remote {
        settings.liveness.backend_mode = BackendMode::Remote;
    }

    logging::init_subscriber(&settings.logging.level);
    if let Some(err) = load_error {
        warn!(error = %err, "failed to load settings, using defaults");
    }

    let handlers = Arc::new(SummaryHandlers::stdout());
    let report = if args.input.as_os_str() == "-" {
        beacon::replay(io::stdin().lock(), &settings, handlers).await
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("failed to open {}", args.input.display()))?;
        beacon::replay(BufReader::new(file), &settings, handlers).await
    }
    .context("failed to read input")?;

    eprintln!(
        "routed={} skipped={} responses={} active={} state={}",
        report.routed,
        report.skipped,
        report.responses,
        report
            .active_thread
            .as_ref()
            .map_or_else(|| "-".to_owned(), ToString::to_string),
        report.final_state
    );
    Ok(())
}
