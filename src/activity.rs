//! Activity aggregation: turns the idle flags into accumulated active and
//! idle time and decides when a reminder is due.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{Config, IdleReset};
use crate::idle::FlagReader;
use crate::logging::JsonlJournal;
use crate::notify::Notifier;

/// Thresholds and cadence for the activity loop, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivitySettings {
    pub poll_interval_secs: u64,
    pub notify_after_active_secs: u64,
    pub notify_after_idle_secs: u64,
    /// Value `idle_secs` is reset to while the user is active.
    pub idle_baseline_secs: u64,
}

impl ActivitySettings {
    pub fn from_config(config: &Config) -> Self {
        let idle_baseline_secs = match config.activity.idle_reset {
            IdleReset::Threshold => config.idle.threshold_seconds,
            IdleReset::Zero => 0,
        };

        Self {
            poll_interval_secs: config.activity.poll_interval_seconds,
            notify_after_active_secs: config.activity.notify_after_active_minutes.saturating_mul(60),
            notify_after_idle_secs: config.activity.notify_after_idle_minutes.saturating_mul(60),
            idle_baseline_secs,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Coarse presence derived from the latest flag reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Active,
    /// Active overall, but on a short break.
    PreIdle,
    Idle,
}

/// A reminder to send to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reminder {
    TakeBreak { active_minutes: u64 },
    ResumeWork { idle_minutes: u64 },
}

impl Reminder {
    pub fn message(&self) -> String {
        match self {
            Reminder::TakeBreak { active_minutes } => {
                format!("🚨 Time for a break! ({} min active)", active_minutes)
            }
            Reminder::ResumeWork { idle_minutes } => {
                format!("🦋 Ready to get back to it? ({} min idle)", idle_minutes)
            }
        }
    }
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cycle {
    pub reminders: Vec<Reminder>,
    /// The idle flag appeared this cycle.
    pub idle_started: bool,
    /// The idle flag disappeared this cycle.
    pub idle_ended: bool,
}

/// Accumulators and the idle reminder latch.
#[derive(Debug)]
pub struct ActivityTracker {
    settings: ActivitySettings,
    active_secs: u64,
    idle_secs: u64,
    pre_idle_secs: u64,
    /// Set once the idle reminder fired for the current idle episode.
    notified_idle: bool,
    was_idle: bool,
    presence: Presence,
}

impl ActivityTracker {
    pub fn new(settings: ActivitySettings) -> Self {
        Self {
            settings,
            active_secs: 0,
            idle_secs: 0,
            pre_idle_secs: 0,
            notified_idle: false,
            was_idle: false,
            presence: Presence::Active,
        }
    }

    /// Advance by one poll interval given the current flag values.
    ///
    /// The break reminder has no latch: it repeats every cycle while the
    /// user stays active past the threshold without a short break. The
    /// resume reminder fires once per idle episode.
    pub fn step(&mut self, idle: bool, pre_idle: bool) -> Cycle {
        let interval = self.settings.poll_interval_secs;
        let mut cycle = Cycle::default();

        if idle {
            cycle.idle_started = !self.was_idle;
            self.active_secs = 0;
            self.idle_secs += interval;
        } else {
            cycle.idle_ended = self.was_idle;
            self.active_secs += interval;
            self.idle_secs = self.settings.idle_baseline_secs;
            self.notified_idle = false;
        }
        self.was_idle = idle;

        if pre_idle {
            self.pre_idle_secs += interval;
        } else {
            self.pre_idle_secs = 0;
        }

        self.presence = if idle {
            Presence::Idle
        } else if pre_idle {
            Presence::PreIdle
        } else {
            Presence::Active
        };

        if self.active_secs >= self.settings.notify_after_active_secs && self.pre_idle_secs == 0 {
            cycle.reminders.push(Reminder::TakeBreak {
                active_minutes: self.active_secs / 60,
            });
        }

        if self.idle_secs >= self.settings.notify_after_idle_secs && !self.notified_idle {
            cycle.reminders.push(Reminder::ResumeWork {
                idle_minutes: self.idle_secs / 60,
            });
            self.notified_idle = true;
        }

        cycle
    }

    pub fn active_secs(&self) -> u64 {
        self.active_secs
    }

    pub fn idle_secs(&self) -> u64 {
        self.idle_secs
    }

    pub fn pre_idle_secs(&self) -> u64 {
        self.pre_idle_secs
    }

    pub fn notified_idle(&self) -> bool {
        self.notified_idle
    }

    pub fn presence(&self) -> Presence {
        self.presence
    }
}

/// The activity loop: reads both flags, steps the tracker and notifies.
pub struct ActivityLoop<N> {
    tracker: ActivityTracker,
    idle: FlagReader,
    pre_idle: FlagReader,
    notifier: N,
    journal: Option<JsonlJournal>,
}

impl<N: Notifier> ActivityLoop<N> {
    pub fn new(settings: ActivitySettings, idle: FlagReader, pre_idle: FlagReader, notifier: N) -> Self {
        Self {
            tracker: ActivityTracker::new(settings),
            idle,
            pre_idle,
            notifier,
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: JsonlJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn tracker(&self) -> &ActivityTracker {
        &self.tracker
    }

    /// Run one poll cycle. Notifier and journal failures are logged only.
    pub async fn cycle(&mut self) -> Cycle {
        let active_before = self.tracker.active_secs();
        let cycle = self.tracker.step(self.idle.is_set(), self.pre_idle.is_set());

        match self.tracker.presence() {
            Presence::Idle => info!("💤 Idle for {} min", self.tracker.idle_secs() / 60),
            presence => info!(
                "😅 Active for {} min{}",
                self.tracker.active_secs() / 60,
                if presence == Presence::PreIdle { " (short break)" } else { "" }
            ),
        }

        if cycle.idle_started {
            debug!("Idle episode started after {} s active", active_before);
            self.journal_write(|journal| journal.log_idle_start(active_before));
        }
        if cycle.idle_ended {
            debug!("Idle episode ended");
            self.journal_write(|journal| journal.log_idle_end());
        }

        for reminder in &cycle.reminders {
            let message = reminder.message();
            let delivered = match self.notifier.notify(&message).await {
                Ok(()) => {
                    info!("Sent reminder: {}", message);
                    true
                }
                Err(e) => {
                    warn!("Failed to send reminder: {}", e);
                    false
                }
            };
            self.journal_write(|journal| journal.log_reminder(reminder, delivered));
        }

        cycle
    }

    /// Poll forever.
    pub async fn run(mut self) {
        let interval = self.tracker.settings.poll_interval();
        info!(
            "Tracking activity every {:?} ({} and {} flags)",
            interval,
            self.idle.name(),
            self.pre_idle.name()
        );

        loop {
            self.cycle().await;
            tokio::time::sleep(interval).await;
        }
    }

    fn journal_write<F>(&mut self, write: F)
    where
        F: FnOnce(&mut JsonlJournal) -> anyhow::Result<()>,
    {
        if let Some(journal) = self.journal.as_mut() {
            if let Err(e) = write(journal) {
                warn!("Failed to write journal: {}", e);
            }
        }
    }
}
