//! breakminder - break reminder daemon
//!
//! Watches whether the user is at the keyboard and sends a desktop
//! notification after too long without a break, or too long away.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use breakminder::activity::{ActivityLoop, ActivitySettings};
use breakminder::config::{Config, LogFormat};
use breakminder::environment::{BackendKind, DisplayServer};
use breakminder::idle::{shared_flag, FlagWriter, IdleBackend};
use breakminder::logging::JsonlJournal;
use breakminder::notify::CommandNotifier;

/// Application version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    let config = Config::load(config_path.as_deref())?;
    config.validate()?;

    init_tracing(&config.logging.level, config.logging.format)?;

    info!("Starting breakminder v{}", VERSION);

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    runtime.block_on(run(config))
}

/// Start both idle backends and run the activity loop until killed.
async fn run(config: Config) -> Result<()> {
    let display_server = DisplayServer::detect();
    info!("Detected display server: {}", display_server);

    let (idle_writer, idle_reader) = shared_flag("idle", config.flags.idle_sentinel());
    let (pre_idle_writer, pre_idle_reader) =
        shared_flag("pre-idle", config.flags.pre_idle_sentinel());

    match display_server.backend_kind() {
        Some(kind) => {
            start_backend(&config, kind, config.idle.threshold(), idle_writer).await;
            start_backend(&config, kind, config.idle.pre_idle_threshold(), pre_idle_writer).await;
        }
        None => warn!("🔴 Unknown display server, cannot track idle state"),
    }

    let settings = ActivitySettings::from_config(&config);
    info!(
        "Reminders: break after {} min active, resume after {} min idle, poll every {}s",
        config.activity.notify_after_active_minutes,
        config.activity.notify_after_idle_minutes,
        settings.poll_interval_secs
    );

    let notifier = CommandNotifier::from_config(&config.notifier);
    let mut activity = ActivityLoop::new(settings, idle_reader, pre_idle_reader, notifier);

    if config.logging.journal {
        match open_journal(&config, display_server) {
            Ok(journal) => activity = activity.with_journal(journal),
            Err(e) => warn!("Reminder journal disabled: {:#}", e),
        }
    }

    activity.run().await;
    Ok(())
}

async fn start_backend(
    config: &Config,
    kind: BackendKind,
    threshold: Duration,
    flag: FlagWriter,
) {
    match IdleBackend::new(kind, &config.backend, &config.idle).await {
        Ok(backend) => {
            backend.spawn(threshold, flag);
        }
        Err(e) => warn!("🔴 Cannot track {} state: {}", flag.name(), e),
    }
}

fn open_journal(config: &Config, display_server: DisplayServer) -> Result<JsonlJournal> {
    let mut journal = JsonlJournal::new(config.logging.logs_dir())?;
    journal.log_session_start(VERSION, &display_server.to_string())?;
    Ok(journal)
}

/// Initialize tracing subscriber with the given log level.
fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }

    Ok(())
}
