//! Logs pane: the decorated job log for native jobs, or the check-run output
//! rendered as markdown for everything else.
//!
//! Decorated lines are built once per job and width in [`prepare`] and kept
//! in `AppState::rendered_logs`; drawing only slices the cache.

use crate::app::{AppState, LogEvent, LogKind, Pane, WorkflowJob};
use crate::logs::{
    COMMAND_MARKER, ERROR_MARKER, GROUP_END_MARKER, GROUP_START_MARKER, STEP_START_MARKER,
};
use crate::markdown;
use crate::tui::widgets::{pane_block, truncate};
use ratatui::layout::{Margin, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState};
use ratatui::Frame;

#[derive(Debug, Clone)]
pub struct RenderedLogs {
    pub width: u16,
    pub lines: Vec<Line<'static>>,
}

/// Builds the cache entry for the selected job when it is missing or was
/// rendered for another width. Jobs without content are not cached.
pub fn prepare(state: &mut AppState) {
    let width = state.logs_viewport.0;
    let Some(job) = state.current_job() else {
        return;
    };
    if job.id.is_empty() || !has_content(job) {
        return;
    }
    if state
        .rendered_logs
        .get(&job.id)
        .is_some_and(|r| r.width == width)
    {
        return;
    }
    let lines = decorate(job, width as usize);
    tracing::trace!(job_id = %job.id, lines = lines.len(), width, "rendered logs");
    let id = job.id.clone();
    state.rendered_logs.insert(id, RenderedLogs { width, lines });
    state.logs_scroll = state.logs_scroll.min(state.max_logs_scroll());
}

fn has_content(job: &WorkflowJob) -> bool {
    !job.logs.is_empty() || job.output.is_some() || job.logs_error.is_some()
}

/// Full set of lines for `job`. Log events map one-to-one onto lines so a
/// step's log offset is also its line number.
pub fn decorate(job: &WorkflowJob, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(err) = &job.logs_error {
        lines.push(Line::from(Span::styled(
            format!("Failed to load logs: {err}"),
            Style::default().fg(Color::Red),
        )));
        if job.logs.is_empty() && job.output.is_none() {
            return lines;
        }
    }
    if job.wants_check_output() {
        if let Some(output) = &job.output {
            let rendered = markdown::render(output, width);
            if rendered.is_empty() {
                lines.extend(output.lines().map(|l| Line::raw(truncate(l, width))));
            } else {
                lines.extend(rendered);
            }
            if lines.is_empty() {
                lines.push(placeholder("No output"));
            }
            return lines;
        }
    }
    lines.extend(job.logs.iter().map(|e| log_line(e, width)));
    lines
}

fn log_line(event: &LogEvent, width: usize) -> Line<'static> {
    let depth = match event.kind {
        LogKind::StepStart | LogKind::GroupStart => event.depth.saturating_sub(1),
        _ => event.depth,
    };
    let indent = "  ".repeat(depth);
    let text = strip_ansi(&strip_markers(event.kind, &event.text));
    let (prefix, style) = match event.kind {
        LogKind::StepStart => (
            "▸ ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        LogKind::GroupStart => ("▸ ", Style::default().add_modifier(Modifier::BOLD)),
        LogKind::GroupEnd => ("", Style::default()),
        LogKind::Command => ("$ ", Style::default().fg(Color::Blue)),
        LogKind::Error => ("", Style::default().fg(Color::Red)),
        LogKind::JobCleanup | LogKind::CompleteJob => ("", Style::default().fg(Color::DarkGray)),
        LogKind::Plain => ("", Style::default()),
    };
    let body = truncate(
        text.trim_end(),
        width.saturating_sub(indent.len() + prefix.chars().count()),
    );
    Line::from(vec![
        Span::raw(indent),
        Span::styled(prefix, style),
        Span::styled(body, style),
    ])
}

fn strip_markers(kind: LogKind, text: &str) -> String {
    let marker = match kind {
        LogKind::StepStart => STEP_START_MARKER,
        LogKind::GroupStart => GROUP_START_MARKER,
        LogKind::GroupEnd => GROUP_END_MARKER,
        LogKind::Command => COMMAND_MARKER,
        LogKind::Error => ERROR_MARKER,
        _ => return text.to_string(),
    };
    match text.find(marker) {
        Some(pos) => format!("{}{}", &text[..pos], &text[pos + marker.len()..]),
        None => text.replace('\n', ""),
    }
}

/// Removes CSI escape sequences (`ESC [ ... final`) and lone escapes.
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\u{1b}' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'[') {
            chars.next();
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) {
                    break;
                }
            }
        }
    }
    out
}

fn placeholder(msg: &str) -> Line<'static> {
    Line::from(Span::styled(
        msg.to_string(),
        Style::default().fg(Color::DarkGray),
    ))
}

pub fn render(f: &mut Frame, area: Rect, state: &AppState) {
    let focused = state.focus == Pane::Logs;
    let title = match state.current_job() {
        Some(job) if job.wants_check_output() => "Output",
        _ => "Logs",
    };
    let block = pane_block(title, focused);

    let Some(job) = state.current_job() else {
        f.render_widget(block, area);
        return;
    };

    let Some(rendered) = state.rendered_logs.get(&job.id) else {
        let msg = if job.state.is_active() {
            "Job is still running; logs appear once it completes"
        } else if job.loading_logs {
            "Loading…"
        } else if job.id.is_empty() {
            "No details available for this check"
        } else {
            "No logs"
        };
        f.render_widget(Paragraph::new(placeholder(msg)).block(block), area);
        return;
    };

    let height = area.height.saturating_sub(2) as usize;
    let visible: Vec<Line> = rendered
        .lines
        .iter()
        .skip(state.logs_scroll)
        .take(height)
        .cloned()
        .collect();
    f.render_widget(Paragraph::new(visible).block(block), area);

    if rendered.lines.len() > height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(None)
            .end_symbol(None);
        let mut scrollbar_state = ScrollbarState::new(rendered.lines.len().saturating_sub(height))
            .position(state.logs_scroll);
        f.render_stateful_widget(
            scrollbar,
            area.inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}
