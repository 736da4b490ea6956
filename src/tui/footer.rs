use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::{AppState, Pane};

pub fn render(f: &mut Frame, area: Rect, state: &AppState) {
    let line = if state.fatal_error.is_some() {
        hint_line(&[("q", "quit")])
    } else {
        hint_line(hints(state, area.width < crate::app::NARROW_WIDTH_THRESHOLD))
    };

    let footer = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(footer, area);
}

fn hints(state: &AppState, narrow: bool) -> &'static [(&'static str, &'static str)] {
    let rerun_run = state.focus == Pane::Runs && !state.config.opts.flat;
    match (narrow, rerun_run) {
        (true, _) => &[
            ("j/k", "nav"),
            ("tab", "pane"),
            ("o", "open"),
            ("r", "refresh"),
            ("R", "rerun"),
            ("q", "quit"),
        ],
        (false, true) => &[
            ("↑↓/jk", "navigate"),
            ("tab/→", "next pane"),
            ("g/G", "top/bottom"),
            ("o", "open"),
            ("r", "refresh"),
            ("R", "rerun run"),
            ("q", "quit"),
        ],
        (false, false) => &[
            ("↑↓/jk", "navigate"),
            ("tab/→", "next pane"),
            ("g/G", "top/bottom"),
            ("o", "open"),
            ("r", "refresh"),
            ("R", "rerun job"),
            ("q", "quit"),
        ],
    }
}

fn hint_line(hints: &[(&'static str, &'static str)]) -> Line<'static> {
    let mut spans: Vec<Span> = Vec::new();
    for (i, (key, desc)) in hints.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" "));
        }
        spans.push(Span::styled(*key, Style::default().fg(Color::Cyan)));
        spans.push(Span::styled(
            format!(" {desc}"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}
