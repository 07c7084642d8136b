//! Sources for "time since last user input", used by the polling backend.

use std::future::Future;
use std::time::Duration;
use tokio::process::Command;

use crate::error::IdleError;

/// A source that reports how long the user has been without input.
pub trait IdleQuery: Send + Sync {
    fn idle_time(&self) -> impl Future<Output = Result<Duration, IdleError>> + Send;
}

/// Queries an external command printing idle milliseconds (`xprintidle`).
#[derive(Debug, Clone)]
pub struct CommandQuery {
    program: String,
}

impl CommandQuery {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl IdleQuery for CommandQuery {
    fn idle_time(&self) -> impl Future<Output = Result<Duration, IdleError>> + Send {
        async move {
            let output = Command::new(&self.program)
                .output()
                .await
                .map_err(|source| IdleError::Launch {
                    program: self.program.clone(),
                    source,
                })?;

            if !output.status.success() {
                return Err(IdleError::QueryFailed {
                    program: self.program.clone(),
                    status: output.status,
                });
            }

            parse_idle_ms(&String::from_utf8_lossy(&output.stdout))
        }
    }
}

/// Parse a single integer of milliseconds, surrounding whitespace allowed.
pub fn parse_idle_ms(output: &str) -> Result<Duration, IdleError> {
    output
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| IdleError::Parse {
            output: output.to_string(),
        })
}

/// Queries the X11 MIT-SCREEN-SAVER extension in-process.
#[cfg(target_os = "linux")]
#[derive(Debug, Clone)]
pub struct ScreenSaverQuery {
    /// X11 display name, `None` for `$DISPLAY`.
    display: Option<String>,
}

#[cfg(target_os = "linux")]
impl ScreenSaverQuery {
    /// Verify the X11 connection and screensaver extension are usable.
    pub async fn new(display: Option<String>) -> Result<Self, IdleError> {
        let query = Self { display };
        query.idle_time().await?;
        Ok(query)
    }
}

#[cfg(target_os = "linux")]
impl IdleQuery for ScreenSaverQuery {
    fn idle_time(&self) -> impl Future<Output = Result<Duration, IdleError>> + Send {
        let display = self.display.clone();
        async move { tokio::task::spawn_blocking(move || x11_idle_time(display.as_deref())).await? }
    }
}

#[cfg(target_os = "linux")]
fn x11_idle_time(display: Option<&str>) -> Result<Duration, IdleError> {
    use x11rb::connection::Connection;
    use x11rb::protocol::screensaver::ConnectionExt as ScreensaverConnectionExt;
    use x11rb::rust_connection::RustConnection;

    let (conn, screen_num) = RustConnection::connect(display)?;
    let screen = &conn.setup().roots[screen_num];

    let reply = conn.screensaver_query_info(screen.root)?.reply()?;

    Ok(Duration::from_millis(reply.ms_since_user_input as u64))
}

/// Idle query selected from configuration.
#[derive(Debug, Clone)]
pub enum IdleSource {
    Command(CommandQuery),
    #[cfg(target_os = "linux")]
    ScreenSaver(ScreenSaverQuery),
}

impl IdleQuery for IdleSource {
    fn idle_time(&self) -> impl Future<Output = Result<Duration, IdleError>> + Send {
        async move {
            match self {
                IdleSource::Command(query) => query.idle_time().await,
                #[cfg(target_os = "linux")]
                IdleSource::ScreenSaver(query) => query.idle_time().await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trimmed_milliseconds() {
        assert_eq!(parse_idle_ms("1234\n").unwrap(), Duration::from_millis(1234));
        assert_eq!(parse_idle_ms("  0 ").unwrap(), Duration::ZERO);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(parse_idle_ms(""), Err(IdleError::Parse { .. })));
        assert!(matches!(
            parse_idle_ms("couldn't open display"),
            Err(IdleError::Parse { .. })
        ));
        assert!(matches!(parse_idle_ms("-5"), Err(IdleError::Parse { .. })));
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_error() {
        let query = CommandQuery::new("breakminder-no-such-idle-query");
        let result = query.idle_time().await;
        assert!(matches!(result, Err(IdleError::Launch { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_program_is_a_query_error() {
        let query = CommandQuery::new("false");
        let result = query.idle_time().await;
        assert!(matches!(result, Err(IdleError::QueryFailed { .. })));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn bad_display_keeps_the_x11_cause() {
        use std::error::Error as _;

        let result = ScreenSaverQuery::new(Some("not a display".to_string())).await;

        let err = result.unwrap_err();
        assert!(matches!(err, IdleError::X11Connect(_)));
        assert!(err.source().is_some());
    }
}
