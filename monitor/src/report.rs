//! Per-run analysis and report formatting.

use chrono::DateTime;

use crate::envelope::LogEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Warning,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Warning => "warning",
            RunStatus::Error => "error",
        }
    }
}

/// Summary of one completed run, built from its log events.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub name: String,
    pub request_id: String,
    pub duration_ms: i64,
    pub errors: u32,
    pub warnings: u32,
    pub events: Vec<LogEvent>,
}

impl RunReport {
    /// Analyzes a run's events: duration from the START/END timestamps,
    /// error and warning counts from the message level prefixes.
    pub fn analyze(name: impl Into<String>, request_id: impl Into<String>, events: Vec<LogEvent>) -> Self {
        let mut start_ts = 0;
        let mut end_ts = 0;
        let mut errors = 0;
        let mut warnings = 0;
        for event in &events {
            if event.message.starts_with("START") {
                start_ts = event.timestamp;
            } else if event.message.starts_with("END") {
                end_ts = event.timestamp;
            } else if event.message.starts_with("[ERROR]") {
                errors += 1;
            } else if event.message.starts_with("[WARNING]") {
                warnings += 1;
            }
        }
        RunReport {
            name: name.into(),
            request_id: request_id.into(),
            duration_ms: end_ts - start_ts,
            errors,
            warnings,
            events,
        }
    }

    pub fn status(&self) -> RunStatus {
        if self.errors > 0 {
            RunStatus::Error
        } else if self.warnings > 0 {
            RunStatus::Warning
        } else {
            RunStatus::Success
        }
    }

    pub fn subject(&self) -> String {
        let base = format!("{} request completed", self.name);
        match self.status() {
            RunStatus::Error => format!("{base} with ERRORS!"),
            RunStatus::Warning => format!("{base} with WARNINGS!"),
            RunStatus::Success => base,
        }
    }

    /// The full report: a summary header followed by the formatted event
    /// log.
    pub fn body(&self) -> String {
        let mut body = format!(
            "Execution results for {} ({})\n\n",
            self.name, self.request_id
        );
        body.push_str(&format!(
            "Execution time: {} seconds\n",
            self.duration_ms as f64 / 1000.0
        ));
        body.push_str(&format!("{} errors\n", self.errors));
        body.push_str(&format!("{} warnings\n", self.warnings));
        body.push_str("\nExecution Log\n\n");
        for event in &self.events {
            body.push_str(&format_log_event(event));
        }
        body
    }
}

/// One log line of the report: `HH:MM:SS LEVEL message`. REPORT events
/// carry no information the summary lacks and are elided.
fn format_log_event(event: &LogEvent) -> String {
    let ts = clock_time(event.timestamp);
    let message = &event.message;
    if message.starts_with("START") {
        format!("{ts} {:<7}\n", "START")
    } else if message.starts_with("END") {
        format!("{ts} {:<7}\n", "END")
    } else if message.starts_with("REPORT") {
        String::new()
    } else if let Some((level, detail)) = level_line(message) {
        format!("{ts} {level:<7} {detail}\n")
    } else {
        format!("{ts} {message}\n")
    }
}

fn clock_time(timestamp_ms: i64) -> String {
    match DateTime::from_timestamp(timestamp_ms / 1000, 0) {
        Some(ts) => ts.format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}

/// Splits a `[LEVEL]\t{timestamp}\t{request id}\t{detail}` message.
fn level_line(message: &str) -> Option<(&str, &str)> {
    let mut parts = message.splitn(4, '\t');
    let level = parts
        .next()?
        .strip_prefix('[')?
        .strip_suffix(']')
        .filter(|level| !level.is_empty() && level.bytes().all(|b| b.is_ascii_uppercase()))?;
    parts.next()?;
    parts.next()?;
    let detail = parts.next()?.trim_end_matches('\n');
    Some((level, detail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn event(timestamp: i64, message: &str) -> LogEvent {
        LogEvent {
            timestamp,
            message: message.to_string(),
            extracted_fields: BTreeMap::new(),
        }
    }

    fn run_events() -> Vec<LogEvent> {
        vec![
            event(1515097568871, "START RequestId: f65dbf9d\n"),
            event(1515097569871, "[WARNING]\t1515097569871\tf65dbf9d\tslow source\n"),
            event(1515097570871, "[WARNING]\t1515097570871\tf65dbf9d\tslow source\n"),
            event(1515097571871, "[INFO]\t1515097571871\tf65dbf9d\tworking\n"),
            event(1515097572871, "[WARNING]\t1515097572871\tf65dbf9d\tslow source\n"),
            event(1515097573871, "[ERROR]\t1515097573871\tf65dbf9d\tgeocode failed\n"),
            event(1515097574871, "END RequestId: f65dbf9d\n"),
        ]
    }

    #[test]
    fn test_analyze_counts_and_duration() {
        let report = RunReport::analyze("Hello World", "f65dbf9d", run_events());
        assert_eq!(report.duration_ms, 6000);
        assert_eq!(report.errors, 1);
        assert_eq!(report.warnings, 3);
        assert_eq!(report.status(), RunStatus::Error);
    }

    #[test]
    fn test_subject_reflects_status() {
        let report = RunReport::analyze("Hello World", "f65dbf9d", run_events());
        assert_eq!(report.subject(), "Hello World request completed with ERRORS!");

        let clean = RunReport::analyze("Hello World", "abc", vec![]);
        assert_eq!(clean.subject(), "Hello World request completed");

        let mut warned = clean.clone();
        warned.warnings = 2;
        assert_eq!(warned.subject(), "Hello World request completed with WARNINGS!");
    }

    #[test]
    fn test_body_contains_summary_and_log() {
        let report = RunReport::analyze("Hello World", "f65dbf9d", run_events());
        let body = report.body();
        assert!(body.starts_with("Execution results for Hello World (f65dbf9d)\n"));
        assert!(body.contains("Execution time: 6 seconds\n"));
        assert!(body.contains("1 errors\n"));
        assert!(body.contains("3 warnings\n"));
        assert!(body.contains("ERROR   geocode failed\n"));
    }

    #[test]
    fn test_report_events_are_elided() {
        assert_eq!(
            format_log_event(&event(0, "REPORT RequestId: abc Duration: 1 ms\n")),
            ""
        );
    }

    #[test]
    fn test_unstructured_messages_pass_through() {
        let formatted = format_log_event(&event(1515097568871, "plain line"));
        assert!(formatted.ends_with(" plain line\n"));
    }

    #[test]
    fn test_level_line_rejects_non_level_brackets() {
        assert!(level_line("[notlevel]\ta\tb\tc\n").is_none());
        assert!(level_line("no brackets here").is_none());
    }
}
