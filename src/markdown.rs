//! Renders a check run's markdown "output" payload into styled terminal
//! lines, word-wrapped to the pane width.

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const MIN_WIDTH: usize = 20;
const RULE_WIDTH: usize = 40;

pub fn render(text: &str, width: usize) -> Vec<Line<'static>> {
    let mut renderer = Renderer::new(width.max(MIN_WIDTH));
    for event in Parser::new(text) {
        renderer.event(event);
    }
    renderer.finish()
}

struct Renderer {
    width: usize,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    current_width: usize,
    styles: Vec<Style>,
    /// Next ordinal per open list; `None` for bullet lists.
    lists: Vec<Option<u64>>,
    in_code_block: bool,
    link: Option<String>,
}

impl Renderer {
    fn new(width: usize) -> Self {
        Self {
            width,
            lines: Vec::new(),
            current: Vec::new(),
            current_width: 0,
            styles: Vec::new(),
            lists: Vec::new(),
            in_code_block: false,
            link: None,
        }
    }

    fn style(&self) -> Style {
        self.styles
            .iter()
            .fold(Style::default(), |acc, s| acc.patch(*s))
    }

    fn flush(&mut self) {
        if let Some(last) = self.current.last_mut() {
            let trimmed = last.content.trim_end().to_string();
            last.content = trimmed.into();
            self.lines.push(Line::from(std::mem::take(&mut self.current)));
        }
        self.current_width = 0;
    }

    /// Ends the current line and leaves one empty line before the next block.
    fn separate(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|l| l.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn indent(&self) -> usize {
        self.lists.len() * 2
    }

    /// Places `word`, hard-splitting it when it is wider than a whole line.
    fn push_word(&mut self, word: &str, style: Style) {
        let avail = self.width.saturating_sub(self.indent()).max(1);
        let body = word.trim_end();
        if UnicodeWidthStr::width(body) <= avail {
            self.place(word, style);
            return;
        }
        let mut chunks = split_at_width(body, avail);
        if let Some(last) = chunks.last_mut() {
            last.push_str(&word[body.len()..]);
        }
        for chunk in chunks {
            self.place(&chunk, style);
        }
    }

    fn place(&mut self, word: &str, style: Style) {
        let w = UnicodeWidthStr::width(word.trim_end());
        if self.current_width > self.indent() && self.current_width + w > self.width {
            self.flush();
            let pad = " ".repeat(self.indent());
            self.current_width = pad.len();
            self.current.push(Span::raw(pad));
        }
        if self.current_width == self.indent() && !self.current.is_empty() {
            let trimmed = word.trim_start();
            self.current_width += UnicodeWidthStr::width(trimmed);
            self.current.push(Span::styled(trimmed.to_string(), style));
            return;
        }
        self.current_width += UnicodeWidthStr::width(word);
        self.current.push(Span::styled(word.to_string(), style));
    }

    fn text(&mut self, text: &str) {
        let style = self.style();
        if self.in_code_block {
            for line in text.lines() {
                for part in split_at_width(line, self.width.saturating_sub(2).max(1)) {
                    self.lines
                        .push(Line::from(Span::styled(format!("  {part}"), style)));
                }
            }
            return;
        }
        for word in text.split_inclusive(' ') {
            self.push_word(word, style);
        }
    }

    fn event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(t) => self.text(&t),
            Event::Code(t) => {
                let style = self.style().fg(Color::Yellow);
                self.push_word(&t, style);
            }
            Event::Html(t) | Event::InlineHtml(t) => {
                let style = self.style().fg(Color::DarkGray);
                for word in t.trim_end().split_inclusive(' ') {
                    self.push_word(word, style);
                }
            }
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.separate();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(self.width.min(RULE_WIDTH)),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Heading { level, .. } => {
                self.separate();
                let mut style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
                if level == HeadingLevel::H1 {
                    style = style.add_modifier(Modifier::UNDERLINED);
                }
                self.styles.push(style);
            }
            Tag::Paragraph => {
                if self.lists.is_empty() {
                    self.separate();
                }
            }
            Tag::List(first) => {
                if self.lists.is_empty() {
                    self.separate();
                } else {
                    self.flush();
                }
                self.lists.push(first);
            }
            Tag::Item => {
                self.flush();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let m = format!("{n}. ");
                        *n += 1;
                        m
                    }
                    _ => "• ".to_string(),
                };
                let prefix = format!("{}{marker}", "  ".repeat(depth));
                self.current_width = UnicodeWidthStr::width(prefix.as_str());
                self.current
                    .push(Span::styled(prefix, Style::default().fg(Color::Yellow)));
            }
            Tag::CodeBlock(_) => {
                self.separate();
                self.in_code_block = true;
                self.styles.push(Style::default().fg(Color::Green));
            }
            Tag::Emphasis => self.styles.push(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.styles.push(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Link { dest_url, .. } => {
                self.styles.push(
                    Style::default()
                        .fg(Color::Blue)
                        .add_modifier(Modifier::UNDERLINED),
                );
                self.link = Some(dest_url.to_string());
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                self.styles.pop();
                self.flush();
            }
            TagEnd::Paragraph | TagEnd::Item => self.flush(),
            TagEnd::List(_) => {
                self.lists.pop();
                self.flush();
            }
            TagEnd::CodeBlock => {
                self.styles.pop();
                self.in_code_block = false;
                self.flush();
            }
            TagEnd::Emphasis | TagEnd::Strong => {
                self.styles.pop();
            }
            TagEnd::Link => {
                self.styles.pop();
                if let Some(dest) = self.link.take().filter(|d| d.starts_with("http")) {
                    self.push_word(" ", Style::default());
                    self.push_word(&format!("<{dest}>"), Style::default().fg(Color::DarkGray));
                }
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|l| l.width() == 0) {
            self.lines.pop();
        }
        while self.lines.first().is_some_and(|l| l.width() == 0) {
            self.lines.remove(0);
        }
        self.lines
    }
}

/// Cuts `s` into pieces no wider than `max` columns. A piece holds at least
/// one char, and an empty input yields one empty piece.
fn split_at_width(s: &str, max: usize) -> Vec<String> {
    let mut pieces = vec![String::new()];
    let mut width = 0;
    for c in s.chars() {
        let cw = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + cw > max && width > 0 {
            pieces.push(String::new());
            width = 0;
        }
        if let Some(piece) = pieces.last_mut() {
            piece.push(c);
        }
        width += cw;
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn plain(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
            .collect()
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(render("", 80).is_empty());
        assert!(render("   \n\n", 80).is_empty());
    }

    #[test]
    fn heading_and_paragraph_are_separated() {
        let lines = render("# Coverage\n\nAll good.", 80);
        assert_eq!(plain(&lines), vec!["Coverage", "", "All good."]);
        assert!(lines[0].spans[0].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn lists_get_markers() {
        let lines = render("- one\n- two\n\n1. first\n2. second", 80);
        assert_eq!(
            plain(&lines),
            vec!["• one", "• two", "", "1. first", "2. second"]
        );
    }

    #[test]
    fn code_blocks_keep_lines() {
        let lines = render("```\nfn main() {}\nlet x = 1;\n```", 80);
        assert_eq!(plain(&lines), vec!["  fn main() {}", "  let x = 1;"]);
    }

    #[test]
    fn long_paragraphs_wrap_at_width() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let lines = render(text, 20);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.width() <= 20, "line too wide: {:?}", plain(&[line.clone()]));
        }
        assert_eq!(plain(&lines).join(" ").split_whitespace().count(), 10);
    }

    #[test]
    fn overlong_words_and_code_lines_are_split() {
        let url = format!("https://ci.example.com/{}", "q".repeat(60));
        let text = format!("see {url} now\n\n```\n{}\n```", "y".repeat(50));
        let lines = render(&text, 24);
        for line in &lines {
            assert!(line.width() <= 24, "line too wide: {:?}", plain(&[line.clone()]));
        }
        let joined: String = plain(&lines).concat();
        assert!(joined.contains("now"));
        assert_eq!(joined.matches('q').count(), 60);
        assert_eq!(joined.matches('y').count(), 50);
    }

    #[test]
    fn split_respects_wide_chars() {
        assert_eq!(split_at_width("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(split_at_width("日本語", 4), vec!["日本", "語"]);
        assert_eq!(split_at_width("", 4), vec![""]);
    }

    #[test]
    fn links_show_destination() {
        let lines = render("[report](https://codecov.io/r/1)", 80);
        assert_eq!(plain(&lines), vec!["report <https://codecov.io/r/1>"]);
    }

    #[test]
    fn inline_code_is_styled() {
        let lines = render("run `cargo fmt`", 80);
        let code = lines[0].spans.iter().find(|s| s.content == "cargo fmt").unwrap();
        assert_eq!(code.style.fg, Some(Color::Yellow));
    }
}
