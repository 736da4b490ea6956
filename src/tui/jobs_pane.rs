use crate::app::{AppState, Pane, WorkflowJob};
use crate::tui::widgets::{elapsed, format_duration, icon_span, pane_block, scroll_offset, selected_style, truncate};
use chrono::{DateTime, Utc};
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

pub fn render(f: &mut Frame, area: Rect, state: &AppState) {
    let focused = state.focus == Pane::Jobs;
    let title = match (state.config.opts.flat, state.current_run()) {
        (false, Some(run)) => format!("Jobs · {}", run.name),
        _ => "Jobs".to_string(),
    };
    let block = pane_block(&title, focused);
    let inner = block.inner(area);
    let visible = state.visible_jobs();

    if visible.is_empty() {
        let msg = if state.is_loading { "Loading…" } else { "No jobs" };
        let para = Paragraph::new(msg)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(para, area);
        return;
    }

    let now = Utc::now();
    let height = inner.height as usize;
    let offset = scroll_offset(state.selected_job, height);
    let lines: Vec<Line> = visible
        .iter()
        .enumerate()
        .skip(offset)
        .take(height)
        .filter_map(|(i, &(r, j))| {
            let job = state.runs.get(r)?.jobs.get(j)?;
            Some(job_line(
                job,
                state.config.opts.flat,
                i == state.selected_job,
                focused,
                inner.width as usize,
                now,
            ))
        })
        .collect();

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn job_line(
    job: &WorkflowJob,
    flat: bool,
    selected: bool,
    focused: bool,
    width: usize,
    now: DateTime<Utc>,
) -> Line<'static> {
    let suffix = match &job.pending_env {
        Some(env) => format!(" waiting for {env}"),
        None => elapsed(job.started_at, job.completed_at, now)
            .map(|s| format!(" {}", format_duration(s)))
            .unwrap_or_default(),
    };
    let name = if flat && !job.workflow.is_empty() && job.workflow != job.name {
        format!("{} / {}", job.workflow, job.name)
    } else {
        job.name.clone()
    };
    let name_width = width.saturating_sub(2 + UnicodeWidthStr::width(suffix.as_str()));
    let suffix_color = if job.pending_env.is_some() {
        Color::Magenta
    } else {
        Color::DarkGray
    };
    Line::from(vec![
        icon_span(job.bucket, job.state),
        Span::styled(truncate(&name, name_width), selected_style(selected, focused)),
        Span::styled(suffix, Style::default().fg(suffix_color)),
    ])
}
