use crate::app::AppState;
use crate::tui::spinner;
use crate::tui::widgets::truncate;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

pub fn render(f: &mut Frame, area: Rect, state: &AppState) {
    let mut spans = vec![
        Span::styled(
            format!(" ghpr v{} ", env!("CARGO_PKG_VERSION")),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("│ "),
        Span::styled(
            format!("{} #{}", state.config.repo, state.config.pr_number),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ];

    if let Some(pr) = state.pr.as_ref().filter(|pr| !pr.title.is_empty()) {
        let used: usize = spans.iter().map(|s| UnicodeWidthStr::width(s.content.as_ref())).sum();
        let room = (area.width as usize).saturating_sub(used + 8);
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            truncate(&pr.title, room),
            Style::default().fg(Color::Yellow),
        ));
    }

    if state.config.opts.flat {
        spans.push(Span::styled(" [flat]", Style::default().fg(Color::Magenta)));
    }

    // Loading spinner or poll countdown
    if state.is_loading {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            spinner::frame(state.spinner_frame).to_string(),
            Style::default().fg(Color::Yellow),
        ));
    } else if state.next_poll_in > 0 {
        spans.push(Span::styled(
            format!(" {}s", state.next_poll_in),
            Style::default().fg(Color::DarkGray),
        ));
    }

    if state.error_message().is_some() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            "!",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    f.render_widget(header, area);
}
