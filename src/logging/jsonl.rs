//! JSONL journal of reminders and idle episodes.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::debug;

use crate::activity::Reminder;

/// Journal event types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum JournalEvent {
    #[serde(rename = "session_start")]
    SessionStart {
        timestamp: DateTime<Utc>,
        version: String,
        display_server: String,
    },
    #[serde(rename = "idle_start")]
    IdleStart {
        timestamp: DateTime<Utc>,
        active_seconds_before: u64,
    },
    #[serde(rename = "idle_end")]
    IdleEnd {
        timestamp: DateTime<Utc>,
        idle_duration_seconds: u64,
    },
    #[serde(rename = "reminder")]
    Reminder {
        timestamp: DateTime<Utc>,
        kind: ReminderKind,
        minutes: u64,
        delivered: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    TakeBreak,
    ResumeWork,
}

/// Daily-rotated JSONL journal.
pub struct JsonlJournal {
    logs_dir: PathBuf,
    current_file: Option<BufWriter<File>>,
    current_date: Option<String>,
    idle_start_time: Option<DateTime<Utc>>,
}

impl JsonlJournal {
    /// Create a journal writing into `logs_dir`.
    pub fn new(logs_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))?;

        Ok(Self {
            logs_dir,
            current_file: None,
            current_date: None,
            idle_start_time: None,
        })
    }

    /// Get or create the journal file for today.
    fn get_writer(&mut self) -> Result<&mut BufWriter<File>> {
        let today = Local::now().format("%Y-%m-%d").to_string();

        if self.current_date.as_ref() != Some(&today) {
            let log_path = self.logs_dir.join(format!("{}.jsonl", today));

            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .with_context(|| format!("Failed to open journal file: {:?}", log_path))?;

            self.current_file = Some(BufWriter::new(file));
            self.current_date = Some(today);

            debug!("Opened journal file: {:?}", log_path);
        }

        self.current_file
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("No journal file available"))
    }

    fn write_line<T: Serialize>(&mut self, entry: &T) -> Result<()> {
        let line = serde_json::to_string(entry)?;
        let writer = self.get_writer()?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }

    pub fn log_session_start(&mut self, version: &str, display_server: &str) -> Result<()> {
        let event = JournalEvent::SessionStart {
            timestamp: Utc::now(),
            version: version.to_string(),
            display_server: display_server.to_string(),
        };
        self.write_line(&event)
    }

    pub fn log_idle_start(&mut self, active_seconds_before: u64) -> Result<()> {
        self.idle_start_time = Some(Utc::now());
        let event = JournalEvent::IdleStart {
            timestamp: Utc::now(),
            active_seconds_before,
        };
        self.write_line(&event)
    }

    pub fn log_idle_end(&mut self) -> Result<()> {
        let idle_duration = self
            .idle_start_time
            .take()
            .map(|start| (Utc::now() - start).num_seconds().max(0) as u64)
            .unwrap_or(0);

        let event = JournalEvent::IdleEnd {
            timestamp: Utc::now(),
            idle_duration_seconds: idle_duration,
        };
        self.write_line(&event)
    }

    pub fn log_reminder(&mut self, reminder: &Reminder, delivered: bool) -> Result<()> {
        let (kind, minutes) = match reminder {
            Reminder::TakeBreak { active_minutes } => (ReminderKind::TakeBreak, *active_minutes),
            Reminder::ResumeWork { idle_minutes } => (ReminderKind::ResumeWork, *idle_minutes),
        };
        let event = JournalEvent::Reminder {
            timestamp: Utc::now(),
            kind,
            minutes,
            delivered,
        };
        self.write_line(&event)
    }
}

impl Drop for JsonlJournal {
    fn drop(&mut self) {
        if let Some(ref mut writer) = self.current_file {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_events(dir: &std::path::Path) -> Vec<JournalEvent> {
        let today = Local::now().format("%Y-%m-%d").to_string();
        let content = std::fs::read_to_string(dir.join(format!("{}.jsonl", today))).unwrap();
        content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn writes_one_event_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let logs_dir = dir.path().join("logs");
        let mut journal = JsonlJournal::new(logs_dir.clone()).unwrap();

        journal.log_session_start("0.1.0", "wayland").unwrap();
        journal.log_idle_start(1800).unwrap();
        journal.log_idle_end().unwrap();
        journal
            .log_reminder(&Reminder::TakeBreak { active_minutes: 30 }, false)
            .unwrap();

        let events = read_events(&logs_dir);
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], JournalEvent::SessionStart { .. }));
        assert!(matches!(
            events[1],
            JournalEvent::IdleStart {
                active_seconds_before: 1800,
                ..
            }
        ));
        assert!(matches!(events[2], JournalEvent::IdleEnd { .. }));
        assert!(matches!(
            events[3],
            JournalEvent::Reminder {
                kind: ReminderKind::TakeBreak,
                minutes: 30,
                delivered: false,
                ..
            }
        ));
    }

    #[test]
    fn reminder_line_is_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = JsonlJournal::new(dir.path().to_path_buf()).unwrap();

        journal
            .log_reminder(&Reminder::ResumeWork { idle_minutes: 60 }, true)
            .unwrap();

        let today = Local::now().format("%Y-%m-%d").to_string();
        let content = std::fs::read_to_string(dir.path().join(format!("{}.jsonl", today))).unwrap();
        assert!(content.contains(r#""event":"reminder""#));
        assert!(content.contains(r#""kind":"resume_work""#));
    }
}
