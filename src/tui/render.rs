use crate::app::AppState;
use crate::tui::{footer, header, jobs_pane, logs_pane, runs_pane, steps_pane};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

/// Screen regions for one frame. `runs` is `None` in flat mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneAreas {
    pub header: Rect,
    pub runs: Option<Rect>,
    pub jobs: Rect,
    pub steps: Rect,
    pub logs: Rect,
    pub footer: Rect,
}

impl PaneAreas {
    /// Inner size of the logs pane (borders excluded).
    pub fn logs_viewport(&self) -> (u16, u16) {
        (
            self.logs.width.saturating_sub(2),
            self.logs.height.saturating_sub(2),
        )
    }
}

pub fn pane_areas(area: Rect, flat: bool) -> PaneAreas {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // header
            Constraint::Min(1),    // panes
            Constraint::Length(2), // footer
        ])
        .split(area);

    let body = rows[1];
    if flat {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(30),
                Constraint::Percentage(20),
                Constraint::Percentage(50),
            ])
            .split(body);
        return PaneAreas {
            header: rows[0],
            runs: None,
            jobs: cols[0],
            steps: cols[1],
            logs: cols[2],
            footer: rows[2],
        };
    }

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(25),
            Constraint::Percentage(20),
            Constraint::Percentage(35),
        ])
        .split(body);
    PaneAreas {
        header: rows[0],
        runs: Some(cols[0]),
        jobs: cols[1],
        steps: cols[2],
        logs: cols[3],
        footer: rows[2],
    }
}

pub fn render(f: &mut Frame, state: &AppState) {
    let areas = pane_areas(f.area(), state.config.opts.flat);

    header::render(f, areas.header, state);
    if let Some(runs) = areas.runs {
        runs_pane::render(f, runs, state);
    }
    jobs_pane::render(f, areas.jobs, state);
    steps_pane::render(f, areas.steps, state);
    logs_pane::render(f, areas.logs, state);
    footer::render(f, areas.footer, state);

    if let Some(fatal) = &state.fatal_error {
        render_fatal(f, fatal);
        return;
    }

    // Error overlay
    if let Some(err) = state.error_message() {
        let area = f.area();
        if area.height > 6 && area.width >= 4 {
            let err_area = Rect {
                x: area.x + 1,
                y: area.y + area.height.saturating_sub(5),
                width: area.width.saturating_sub(2),
                height: 3,
            };
            let err_widget = Paragraph::new(err.to_owned())
                .style(Style::default().fg(Color::Red))
                .block(
                    Block::default()
                        .title(" Error ")
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(Color::Red)),
                )
                .wrap(Wrap { trim: true });
            f.render_widget(Clear, err_area);
            f.render_widget(err_widget, err_area);
        }
    }
}

/// Centered box for an error that ends the session.
fn render_fatal(f: &mut Frame, msg: &str) {
    let area = f.area();
    let width = area.width.saturating_sub(4).min(70);
    let height = 5.min(area.height);
    let rect = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    };
    let widget = Paragraph::new(format!("{msg}\n\nPress q to quit."))
        .style(Style::default().fg(Color::Red))
        .block(
            Block::default()
                .title(" Error ")
                .title_style(Style::default().add_modifier(Modifier::BOLD))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(Clear, rect);
    f.render_widget(widget, rect);
}
