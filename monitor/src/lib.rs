//! Turns raw execution-log deliveries into per-run status reports.
//!
//! A log subscription delivers a compressed envelope of log events. Each
//! `END` event marks a completed run; the events for that run are analyzed
//! for duration and error/warning counts, formatted into a human-readable
//! report, and relayed to a notification topic.

pub mod envelope;
pub mod notify;
pub mod report;

pub use envelope::{Envelope, LogEvent};
pub use notify::{HttpTopicNotifier, Notifier, StdoutNotifier};
pub use report::{RunReport, RunStatus};
