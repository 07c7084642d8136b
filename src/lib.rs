//! breakminder - break and resume reminders driven by user idle state.
//!
//! Idle backends (a `swayidle` watcher on Wayland, idle-time polling on X11)
//! each drive a shared flag; the activity loop reads both flags once per
//! cycle, accumulates active and idle time and sends reminders through an
//! external notifier.

pub mod activity;
pub mod config;
pub mod environment;
pub mod error;
pub mod idle;
pub mod logging;
pub mod notify;
