use crate::app::{AppState, Pane, Step};
use crate::tui::widgets::{elapsed, format_duration, icon_span, pane_block, scroll_offset, selected_style, truncate};
use chrono::{DateTime, Utc};
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

pub fn render(f: &mut Frame, area: Rect, state: &AppState) {
    let focused = state.focus == Pane::Steps;
    let block = pane_block("Steps", focused);
    let inner = block.inner(area);

    let Some(job) = state.current_job() else {
        f.render_widget(block, area);
        return;
    };

    if job.steps.is_empty() {
        let loading = state
            .runs
            .get(state.current_job_position().map_or(state.selected_run, |(r, _)| r))
            .is_some_and(|r| r.loading_steps);
        let msg = if loading { "Loading…" } else { "No steps" };
        let para = Paragraph::new(msg)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(para, area);
        return;
    }

    let now = Utc::now();
    let height = inner.height as usize;
    let offset = scroll_offset(state.selected_step, height);
    let lines: Vec<Line> = job
        .steps
        .iter()
        .enumerate()
        .skip(offset)
        .take(height)
        .map(|(i, step)| step_line(step, i == state.selected_step, focused, inner.width as usize, now))
        .collect();

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn step_line(step: &Step, selected: bool, focused: bool, width: usize, now: DateTime<Utc>) -> Line<'static> {
    let duration = elapsed(step.started_at, step.completed_at, now)
        .map(|s| format!(" {}", format_duration(s)))
        .unwrap_or_default();
    let name_width = width.saturating_sub(2 + duration.len());
    Line::from(vec![
        icon_span(step.bucket(), step.status),
        Span::styled(truncate(&step.name, name_width), selected_style(selected, focused)),
        Span::styled(duration, Style::default().fg(Color::DarkGray)),
    ])
}
