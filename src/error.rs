//! Error types for idle backends and notification delivery.

use std::process::ExitStatus;
use thiserror::Error;

/// Errors raised by idle signal backends and idle queries.
#[derive(Debug, Error)]
pub enum IdleError {
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}")]
    QueryFailed { program: String, status: ExitStatus },

    #[error("unparsable idle time output: {output:?}")]
    Parse { output: String },

    #[cfg(target_os = "linux")]
    #[error("failed to connect to X11 display: {0}")]
    X11Connect(#[from] x11rb::errors::ConnectError),

    #[cfg(target_os = "linux")]
    #[error("X11 connection error: {0}")]
    X11Connection(#[from] x11rb::errors::ConnectionError),

    #[cfg(target_os = "linux")]
    #[error("X11 screensaver query failed: {0}")]
    X11Reply(#[from] x11rb::errors::ReplyError),

    #[error("blocking idle query task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("idle watcher '{program}' exited ({status})")]
    WatcherExited { program: String, status: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to launch notifier '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("notifier '{program}' exited with {status}")]
    Failed { program: String, status: ExitStatus },
}
