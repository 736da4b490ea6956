use crate::app::{AppState, JobState, Pane, WorkflowRun};
use crate::tui::widgets::{icon_span, pane_block, scroll_offset, selected_style, truncate};
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

pub fn render(f: &mut Frame, area: Rect, state: &AppState) {
    let focused = state.focus == Pane::Runs;
    let block = pane_block("Runs", focused);
    let inner = block.inner(area);
    let width = inner.width as usize;

    if state.runs.is_empty() {
        let msg = if state.is_loading { "Loading…" } else { "No checks" };
        let para = Paragraph::new(msg)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(para, area);
        return;
    }

    let height = inner.height as usize;
    let offset = scroll_offset(state.selected_run, height);
    let lines: Vec<Line> = state
        .runs
        .iter()
        .enumerate()
        .skip(offset)
        .take(height)
        .map(|(i, run)| run_line(run, i == state.selected_run, focused, width))
        .collect();

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn run_line(run: &WorkflowRun, selected: bool, focused: bool, width: usize) -> Line<'static> {
    let state = if run.jobs.iter().any(|j| j.state == JobState::InProgress) {
        JobState::InProgress
    } else {
        JobState::Completed
    };
    let counts = if run.jobs.len() > 1 {
        format!(" ({})", run.jobs.len())
    } else {
        String::new()
    };
    let name_width = width.saturating_sub(2 + counts.chars().count());
    let style = selected_style(selected, focused);
    Line::from(vec![
        icon_span(run.bucket, state),
        Span::styled(truncate(&run.name, name_width), style),
        Span::styled(counts, Style::default().fg(Color::DarkGray)),
    ])
}
