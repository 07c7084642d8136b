//! Idle signal backends and the flags they drive.

pub mod flag;
pub mod polling;
pub mod query;
pub mod watcher;

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::{BackendConfig, IdleConfig, X11Source};
use crate::environment::BackendKind;
use crate::error::IdleError;

pub use flag::{shared_flag, FlagReader, FlagWriter};
pub use polling::PollingBackend;
pub use query::{CommandQuery, IdleQuery, IdleSource};
pub use watcher::WatcherBackend;

/// Idle backend selected for the current display server.
pub enum IdleBackend {
    EventDriven(WatcherBackend),
    Polling(PollingBackend<IdleSource>),
}

impl IdleBackend {
    /// Build the backend for `kind` from configuration.
    pub async fn new(
        kind: BackendKind,
        backend: &BackendConfig,
        idle: &IdleConfig,
    ) -> Result<Self, IdleError> {
        match kind {
            BackendKind::EventDriven => {
                Ok(IdleBackend::EventDriven(WatcherBackend::new(&backend.watcher)))
            }
            BackendKind::Polling => {
                let source = idle_source(backend).await?;
                Ok(IdleBackend::Polling(PollingBackend::new(
                    source,
                    idle.check_interval(),
                    idle.retry_backoff(),
                )))
            }
        }
    }

    /// Drive `flag` until the backend stops. Under normal operation this
    /// never returns.
    pub async fn run(self, threshold: Duration, flag: FlagWriter) -> Result<(), IdleError> {
        match self {
            IdleBackend::EventDriven(backend) => backend.run(threshold, flag).await,
            IdleBackend::Polling(backend) => backend.run(threshold, flag).await,
        }
    }

    /// Run on its own task. Errors are logged and end only this backend;
    /// its flag then stays absent.
    pub fn spawn(self, threshold: Duration, flag: FlagWriter) -> JoinHandle<()> {
        let name = flag.name();
        tokio::spawn(async move {
            match self.run(threshold, flag).await {
                Ok(()) => info!("Idle backend for {} flag stopped", name),
                Err(e) => error!("Idle backend for {} flag stopped: {}", name, e),
            }
        })
    }
}

#[cfg(target_os = "linux")]
async fn idle_source(backend: &BackendConfig) -> Result<IdleSource, IdleError> {
    match backend.x11_source {
        X11Source::Command => Ok(IdleSource::Command(CommandQuery::new(&backend.query))),
        X11Source::Screensaver => Ok(IdleSource::ScreenSaver(
            query::ScreenSaverQuery::new(None).await?,
        )),
    }
}

#[cfg(not(target_os = "linux"))]
async fn idle_source(backend: &BackendConfig) -> Result<IdleSource, IdleError> {
    if backend.x11_source == X11Source::Screensaver {
        tracing::warn!("X11 screensaver query is only available on Linux, using {}", backend.query);
    }
    Ok(IdleSource::Command(CommandQuery::new(&backend.query)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_backend_for_each_kind() {
        let backend = BackendConfig::default();
        let idle = IdleConfig::default();

        let event_driven = IdleBackend::new(BackendKind::EventDriven, &backend, &idle)
            .await
            .unwrap();
        assert!(matches!(event_driven, IdleBackend::EventDriven(_)));

        let polling = IdleBackend::new(BackendKind::Polling, &backend, &idle)
            .await
            .unwrap();
        assert!(matches!(polling, IdleBackend::Polling(_)));
    }

    #[tokio::test]
    async fn failed_backend_task_ends_quietly() {
        let backend = BackendConfig {
            watcher: "breakminder-no-such-watcher".to_string(),
            ..BackendConfig::default()
        };
        let idle = IdleConfig::default();
        let (writer, reader) = shared_flag("idle", None);

        let handle = IdleBackend::new(BackendKind::EventDriven, &backend, &idle)
            .await
            .unwrap()
            .spawn(idle.threshold(), writer);

        handle.await.unwrap();
        assert!(!reader.is_set());
    }
}
