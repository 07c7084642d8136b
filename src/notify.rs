//! Desktop notification delivery through an external command.

use std::future::Future;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::config::NotifierConfig;
use crate::error::NotifyError;

/// Something that can show a message to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Runs `<program> <args...> <message>`, e.g. `notifyme -p -m "..."`.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
}

impl CommandNotifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &NotifierConfig) -> Self {
        Self::new(&config.program, config.args.clone())
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, message: &str) -> impl Future<Output = Result<(), NotifyError>> + Send {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(message)
            .stdin(Stdio::null())
            .stdout(Stdio::null());

        async move {
            let mut command = command;
            let status = command.status().await.map_err(|source| NotifyError::Launch {
                program: self.program.clone(),
                source,
            })?;

            if !status.success() {
                return Err(NotifyError::Failed {
                    program: self.program.clone(),
                    status,
                });
            }

            debug!("Notification delivered via {}", self.program);
            Ok(())
        }
    }
}
