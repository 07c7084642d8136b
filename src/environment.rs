//! Display server detection from the session environment.

use std::fmt;

/// Idle detection ecosystem of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayServer {
    Wayland,
    X11,
    Unknown,
}

/// Which idle backend strategy a display server supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// A long-lived watcher process reports idle/resume transitions.
    EventDriven,
    /// Idle milliseconds are queried on a fixed cadence.
    Polling,
}

impl DisplayServer {
    /// Classify the session from the process environment.
    pub fn detect() -> Self {
        Self::detect_with(|key| std::env::var(key).ok())
    }

    /// Classify the session using the given variable lookup.
    ///
    /// Wayland wins when both `WAYLAND_DISPLAY` and `DISPLAY` are set, since
    /// XWayland sessions export both.
    pub fn detect_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_set = |key: &str| lookup(key).is_some_and(|v| !v.is_empty());

        if is_set("WAYLAND_DISPLAY") {
            DisplayServer::Wayland
        } else if is_set("DISPLAY") {
            DisplayServer::X11
        } else {
            DisplayServer::Unknown
        }
    }

    pub fn backend_kind(self) -> Option<BackendKind> {
        match self {
            DisplayServer::Wayland => Some(BackendKind::EventDriven),
            DisplayServer::X11 => Some(BackendKind::Polling),
            DisplayServer::Unknown => None,
        }
    }
}

impl fmt::Display for DisplayServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DisplayServer::Wayland => "wayland",
            DisplayServer::X11 => "x11",
            DisplayServer::Unknown => "unknown",
        };
        f.write_str(name)
    }
}
