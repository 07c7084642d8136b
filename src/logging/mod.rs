//! Reminder journal.

mod jsonl;

pub use jsonl::{JournalEvent, JsonlJournal, ReminderKind};
