//! Small rendering helpers shared by the panes.

use crate::app::{Bucket, JobState};
use chrono::{DateTime, Utc};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders};
use unicode_width::UnicodeWidthStr;

pub fn bucket_icon(bucket: Bucket, state: JobState) -> (&'static str, Color) {
    match (bucket, state) {
        (Bucket::Pass, _) => ("✓", Color::Green),
        (Bucket::Fail, _) => ("✗", Color::Red),
        (Bucket::Cancel, _) => ("⊘", Color::Yellow),
        (Bucket::Skipping, _) => ("⊘", Color::DarkGray),
        (Bucket::Pending, JobState::InProgress) => ("⟳", Color::Yellow),
        (Bucket::Pending, _) => ("·", Color::DarkGray),
    }
}

pub fn icon_span(bucket: Bucket, state: JobState) -> Span<'static> {
    let (icon, color) = bucket_icon(bucket, state);
    Span::styled(format!("{icon} "), Style::default().fg(color))
}

pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Seconds between start and completion; running items count up to `now`.
pub fn elapsed(
    started: Option<DateTime<Utc>>,
    completed: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<i64> {
    let started = started?;
    Some((completed.unwrap_or(now) - started).num_seconds())
}

pub fn truncate(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut width = 0;
    for c in s.chars() {
        let cw = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if width + cw + 1 > max_width {
            result.push('…');
            break;
        }
        result.push(c);
        width += cw;
    }
    result
}

/// Bordered pane with its title; the focused pane gets a cyan border.
pub fn pane_block(title: &str, focused: bool) -> Block<'static> {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let mut title_style = Style::default().add_modifier(Modifier::BOLD);
    if !focused {
        title_style = title_style.fg(Color::Gray);
    }
    Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(Span::styled(format!(" {title} "), title_style))
}

/// First row to draw so that `cursor` stays inside a window of `height` rows.
pub fn scroll_offset(cursor: usize, height: usize) -> usize {
    if height > 0 && cursor >= height {
        cursor - height + 1
    } else {
        0
    }
}

pub fn selected_style(selected: bool, focused: bool) -> Style {
    match (selected, focused) {
        (true, true) => Style::default().add_modifier(Modifier::REVERSED),
        (true, false) => Style::default().add_modifier(Modifier::BOLD),
        _ => Style::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_duration_units() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(3720), "1h 2m");
        assert_eq!(format_duration(-5), "0s");
    }

    #[test]
    fn truncate_ascii_and_wide() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("hello world", 6), "hello…");
        let t = truncate("日本語テキスト", 7);
        assert!(UnicodeWidthStr::width(t.as_str()) <= 7);
        assert!(t.ends_with('…'));
    }

    #[test]
    fn icons_per_bucket() {
        assert_eq!(bucket_icon(Bucket::Pass, JobState::Completed).0, "✓");
        assert_eq!(bucket_icon(Bucket::Fail, JobState::Completed).0, "✗");
        assert_eq!(bucket_icon(Bucket::Pending, JobState::InProgress).0, "⟳");
        assert_eq!(bucket_icon(Bucket::Pending, JobState::Queued).0, "·");
        assert_eq!(bucket_icon(Bucket::Skipping, JobState::Completed).1, Color::DarkGray);
    }

    #[test]
    fn elapsed_counts_running_items_to_now() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 30).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap();
        assert_eq!(elapsed(Some(start), Some(end), now), Some(90));
        assert_eq!(elapsed(Some(start), None, now), Some(300));
        assert_eq!(elapsed(None, Some(end), now), None);
    }

    #[test]
    fn scroll_keeps_cursor_visible() {
        assert_eq!(scroll_offset(3, 10), 0);
        assert_eq!(scroll_offset(12, 10), 3);
        assert_eq!(scroll_offset(5, 0), 0);
    }
}
