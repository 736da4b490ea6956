//! Job-log stream parser.
//!
//! The host streams a job log as `JOB\tSTEP\tTIMESTAMP TEXT` lines. [`parse`]
//! turns that blob into classified [`LogEvent`]s with a nesting depth. Markers
//! are left in the text; stripping and styling happen at render time.

use crate::app::{LogEvent, LogKind};
use chrono::{DateTime, Utc};

pub const STEP_START_MARKER: &str = "##[group]Run ";
pub const GROUP_START_MARKER: &str = "##[group]";
pub const GROUP_END_MARKER: &str = "##[endgroup]";
pub const JOB_CLEANUP_MARKER: &str = "Post job cleanup.";
pub const COMMAND_MARKER: &str = "[command]";
pub const ERROR_MARKER: &str = "##[error]";
pub const COMPLETE_JOB_MARKER: &str = "Cleaning up orphan processes";

/// Parses a raw job-log blob. Total: malformed lines still yield an event.
pub fn parse(blob: &str) -> Vec<LogEvent> {
    let mut prefixes: Option<(String, String)> = None;
    let mut last_time: Option<DateTime<Utc>> = None;
    let mut depth: usize = 0;
    let mut events = Vec::new();

    for raw in blob.lines() {
        let raw = raw.trim_end_matches('\r');

        if prefixes.is_none() {
            let mut fields = raw.splitn(3, '\t');
            if let (Some(job), Some(step), Some(_)) = (fields.next(), fields.next(), fields.next()) {
                prefixes = Some((format!("{job}\t"), format!("{step}\t")));
            }
        }

        let mut line = raw;
        if let Some((job, step)) = &prefixes {
            line = line.strip_prefix(job.as_str()).unwrap_or(line);
            line = line.strip_prefix(step.as_str()).unwrap_or(line);
        }

        let (time, payload) = split_timestamp(line);
        let time = match time {
            Some(t) => {
                last_time = Some(t);
                Some(t)
            }
            None => last_time,
        };

        let kind = classify(line, payload);
        let text = match kind {
            LogKind::StepStart | LogKind::GroupStart => {
                depth += 1;
                payload.to_string()
            }
            LogKind::GroupEnd => {
                depth = depth.saturating_sub(1);
                "\n".to_string()
            }
            _ => payload.to_string(),
        };

        events.push(LogEvent {
            time,
            depth,
            kind,
            text,
        });
    }

    events
}

/// Splits `TIMESTAMP TEXT` on the first space. When the head is not an
/// RFC 3339 timestamp the whole line is text.
fn split_timestamp(line: &str) -> (Option<DateTime<Utc>>, &str) {
    let (head, rest) = match line.split_once(' ') {
        Some((head, rest)) => (head, rest),
        None => (line, ""),
    };
    match parse_time(head) {
        Some(t) => (Some(t), rest),
        None => (None, line),
    }
}

fn parse_time(head: &str) -> Option<DateTime<Utc>> {
    let head = head.trim_start_matches('\u{feff}');
    if head.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(head)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn classify(line: &str, payload: &str) -> LogKind {
    if line.contains(STEP_START_MARKER) {
        LogKind::StepStart
    } else if line.contains(GROUP_START_MARKER) {
        LogKind::GroupStart
    } else if payload.contains(GROUP_END_MARKER) {
        LogKind::GroupEnd
    } else if line.contains(JOB_CLEANUP_MARKER) {
        LogKind::JobCleanup
    } else if line.contains(COMMAND_MARKER) {
        LogKind::Command
    } else if line.contains(ERROR_MARKER) {
        LogKind::Error
    } else if line.contains(COMPLETE_JOB_MARKER) {
        LogKind::CompleteJob
    } else {
        LogKind::Plain
    }
}
