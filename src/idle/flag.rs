//! Shared idle flags between an idle backend and the activity loop.
//!
//! Each flag has exactly one writer (its backend task) and one reader (the
//! activity loop). Neither half is `Clone`, so the pairing is enforced by the
//! type system and a plain atomic is enough.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared state behind a flag pair.
struct FlagState {
    /// Flag name used in logs ("idle", "pre-idle").
    name: &'static str,
    /// Whether the user is idle according to the backend.
    present: AtomicBool,
    /// Optional sentinel file mirroring the flag for external observers.
    sentinel: Option<PathBuf>,
}

/// Create a flag pair, initially absent.
///
/// When `sentinel` is given, a leftover sentinel from an earlier run is
/// removed so the file starts out agreeing with the in-process flag.
pub fn shared_flag(name: &'static str, sentinel: Option<PathBuf>) -> (FlagWriter, FlagReader) {
    if let Some(path) = &sentinel {
        remove_sentinel(name, path);
    }

    let state = Arc::new(FlagState {
        name,
        present: AtomicBool::new(false),
        sentinel,
    });

    (
        FlagWriter {
            state: state.clone(),
        },
        FlagReader { state },
    )
}

/// Write half of a shared flag, owned by an idle backend.
pub struct FlagWriter {
    state: Arc<FlagState>,
}

impl FlagWriter {
    pub fn name(&self) -> &'static str {
        self.state.name
    }

    /// Mark the user idle.
    pub fn set(&self) {
        self.store(true);
    }

    /// Mark the user active.
    pub fn clear(&self) {
        self.store(false);
    }

    /// Store the idle state. Repeated stores of the same value are no-ops.
    pub fn store(&self, idle: bool) {
        let previous = self.state.present.swap(idle, Ordering::SeqCst);
        if previous == idle {
            return;
        }

        debug!(flag = self.state.name, idle, "Idle flag changed");

        if let Some(path) = &self.state.sentinel {
            if idle {
                if let Err(e) = fs::write(path, "idle\n") {
                    warn!("Failed to write {} sentinel {:?}: {}", self.state.name, path, e);
                }
            } else {
                remove_sentinel(self.state.name, path);
            }
        }
    }
}

/// Read half of a shared flag, owned by the activity loop.
pub struct FlagReader {
    state: Arc<FlagState>,
}

impl FlagReader {
    pub fn name(&self) -> &'static str {
        self.state.name
    }

    /// Whether the flag is present (user idle).
    pub fn is_set(&self) -> bool {
        self.state.present.load(Ordering::SeqCst)
    }
}

fn remove_sentinel(name: &str, path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {} sentinel {:?}: {}", name, path, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_changes_are_visible_to_reader() {
        let (writer, reader) = shared_flag("idle", None);
        assert!(!reader.is_set());

        writer.set();
        assert!(reader.is_set());

        writer.set();
        assert!(reader.is_set());

        writer.clear();
        assert!(!reader.is_set());
        assert_eq!(reader.name(), writer.name());
    }

    #[test]
    fn sentinel_mirrors_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_idle_state");
        let (writer, reader) = shared_flag("idle", Some(path.clone()));

        assert!(!path.exists());

        writer.set();
        assert!(reader.is_set());
        assert!(path.exists());

        writer.clear();
        assert!(!reader.is_set());
        assert!(!path.exists());
    }

    #[test]
    fn stale_sentinel_is_removed_on_creation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_pre_idle_state");
        fs::write(&path, "idle\n").unwrap();

        let (_writer, reader) = shared_flag("pre-idle", Some(path.clone()));

        assert!(!path.exists());
        assert!(!reader.is_set());
    }

    #[test]
    fn unwritable_sentinel_still_updates_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("user_idle_state");
        let (writer, reader) = shared_flag("idle", Some(path.clone()));

        writer.set();

        assert!(reader.is_set());
        assert!(!path.exists());
    }
}
