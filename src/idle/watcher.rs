//! Event-driven idle backend backed by a long-lived `swayidle` watcher.
//!
//! The watcher runs one shell action when the timeout elapses without input
//! and another when input resumes. Both actions echo a marker line that is
//! inherited onto the watcher's stdout, which this backend reads.

use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use super::flag::FlagWriter;
use crate::error::IdleError;

/// Line printed by the watcher when the user goes idle.
pub const IDLE_MARKER: &str = "breakminder:idle";
/// Line printed by the watcher when input resumes.
pub const RESUME_MARKER: &str = "breakminder:resume";

/// A transition reported by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Idle,
    Resume,
}

impl Transition {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            IDLE_MARKER => Some(Transition::Idle),
            RESUME_MARKER => Some(Transition::Resume),
            _ => None,
        }
    }
}

/// Translates watcher transitions into flag updates.
#[derive(Debug, Clone)]
pub struct WatcherBackend {
    program: String,
}

impl WatcherBackend {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Watcher arguments for the given timeout.
    pub fn watcher_args(threshold: Duration) -> Vec<String> {
        vec![
            "-w".to_string(),
            "timeout".to_string(),
            threshold.as_secs().max(1).to_string(),
            format!("echo {}", IDLE_MARKER),
            "resume".to_string(),
            format!("echo {}", RESUME_MARKER),
        ]
    }

    /// Run the watcher until it exits.
    ///
    /// Launch failure is returned immediately with the flag untouched. If the
    /// watcher exits later the flag is cleared, so a dead watcher reads as
    /// "active" rather than as an idle episode that never ends.
    pub async fn run(self, threshold: Duration, flag: FlagWriter) -> Result<(), IdleError> {
        let mut child = Command::new(&self.program)
            .args(Self::watcher_args(threshold))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| IdleError::Launch {
                program: self.program.clone(),
                source,
            })?;

        info!(
            "Started {} for {} flag (timeout {:?})",
            self.program,
            flag.name(),
            threshold
        );

        let followed = match child.stdout.take() {
            Some(stdout) => follow_transitions(BufReader::new(stdout), &flag).await,
            None => Ok(()),
        };

        flag.clear();
        followed?;

        let status = child.wait().await?;
        Err(IdleError::WatcherExited {
            program: self.program,
            status: status.to_string(),
        })
    }
}

/// Apply every transition line from `reader` to the flag until EOF.
pub async fn follow_transitions<R>(reader: R, flag: &FlagWriter) -> Result<(), IdleError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        match Transition::parse(&line) {
            Some(Transition::Idle) => flag.set(),
            Some(Transition::Resume) => flag.clear(),
            None => debug!("Ignoring watcher output for {} flag: {}", flag.name(), line),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idle::flag::shared_flag;

    #[test]
    fn parses_markers() {
        assert_eq!(Transition::parse("breakminder:idle\n"), Some(Transition::Idle));
        assert_eq!(Transition::parse(" breakminder:resume"), Some(Transition::Resume));
        assert_eq!(Transition::parse("idle"), None);
    }

    #[test]
    fn args_carry_timeout_and_actions() {
        let args = WatcherBackend::watcher_args(Duration::from_secs(210));
        assert_eq!(
            args,
            vec![
                "-w",
                "timeout",
                "210",
                "echo breakminder:idle",
                "resume",
                "echo breakminder:resume",
            ]
        );
    }

    #[tokio::test]
    async fn transitions_drive_the_flag() {
        let (writer, reader) = shared_flag("idle", None);

        follow_transitions(&b"breakminder:idle\n"[..], &writer).await.unwrap();
        assert!(reader.is_set());

        follow_transitions(&b"noise\nbreakminder:resume\n"[..], &writer)
            .await
            .unwrap();
        assert!(!reader.is_set());

        follow_transitions(&b"breakminder:resume\nbreakminder:idle"[..], &writer)
            .await
            .unwrap();
        assert!(reader.is_set());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn watcher_exit_clears_flag_and_reports_status() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-swayidle");
        std::fs::write(
            &script,
            "#!/bin/sh\necho breakminder:idle\nsleep 1\nexit 3\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let (writer, reader) = shared_flag("idle", None);
        let backend = WatcherBackend::new(script.to_string_lossy());
        let handle = tokio::spawn(backend.run(Duration::from_secs(30), writer));

        let mut seen_idle = false;
        for _ in 0..100 {
            if reader.is_set() {
                seen_idle = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(seen_idle, "watcher idle line never reached the flag");

        let result = handle.await.unwrap();
        assert!(!reader.is_set());
        match result {
            Err(IdleError::WatcherExited { status, .. }) => assert!(status.contains('3')),
            other => panic!("expected WatcherExited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn launch_failure_leaves_flag_absent() {
        let (writer, reader) = shared_flag("idle", None);
        let backend = WatcherBackend::new("breakminder-no-such-watcher");

        let result = backend.run(Duration::from_secs(30), writer).await;

        assert!(matches!(result, Err(IdleError::Launch { .. })));
        assert!(!reader.is_set());
    }
}
