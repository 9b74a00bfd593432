use crossterm::event::{MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Frame;

use crate::action::Action;
use crate::ui::{nav, Nav};

const WHEEL_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Syntax {
    Markdown,
    Diff,
    Plain,
}

impl Syntax {
    fn from_path(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".md") || lower.ends_with(".markdown") {
            Syntax::Markdown
        } else if lower.ends_with(".diff") || lower.ends_with(".patch") {
            Syntax::Diff
        } else {
            Syntax::Plain
        }
    }
}

/// Scrollable, lightly highlighted text. Backs the readme tab, the file
/// browser's file view and the commit diff.
#[derive(Debug, Clone)]
pub struct CodeViewer {
    lines: Vec<Line<'static>>,
    path: String,
    offset: usize,
    width: u16,
    height: u16,
    loading: bool,
    error: Option<String>,
    placeholder: &'static str,
}

impl CodeViewer {
    pub fn new(placeholder: &'static str) -> Self {
        Self {
            lines: Vec::new(),
            path: String::new(),
            offset: 0,
            width: 0,
            height: 0,
            loading: false,
            error: None,
            placeholder,
        }
    }

    pub fn set_content(&mut self, content: &str, path: &str) {
        self.lines = highlight(content, path);
        self.path = path.to_string();
        self.loading = false;
        self.error = None;
        self.goto_top();
    }

    /// Drop the current text and show a loading marker until content arrives
    pub fn set_loading(&mut self) {
        self.lines.clear();
        self.path.clear();
        self.loading = true;
        self.error = None;
        self.goto_top();
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.loading = false;
        self.error = Some(error.into());
    }

    pub fn goto_top(&mut self) {
        self.offset = 0;
    }

    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.offset = self.offset.min(self.max_offset());
    }

    #[cfg(test)]
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    #[cfg(test)]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[cfg(test)]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[cfg(test)]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    #[cfg(test)]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[cfg(test)]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn max_offset(&self) -> usize {
        self.lines.len().saturating_sub(self.height as usize)
    }

    /// 1.0 when everything fits, otherwise how far through the text the
    /// top line is.
    pub fn scroll_percent(&self) -> f64 {
        let max = self.max_offset();
        if max == 0 {
            return 1.0;
        }
        (self.offset as f64 / max as f64).clamp(0.0, 1.0)
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.offset = (self.offset + lines).min(self.max_offset());
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.offset = self.offset.saturating_sub(lines);
    }

    fn page(&self) -> usize {
        (self.height as usize).max(1)
    }

    /// Apply a key or wheel event. Returns whether the event was used.
    pub fn update(&mut self, action: &Action) -> bool {
        match action {
            Action::Key(key) => match nav(key) {
                Some(Nav::Down) => self.scroll_down(1),
                Some(Nav::Up) => self.scroll_up(1),
                Some(Nav::PageDown) => self.scroll_down(self.page()),
                Some(Nav::PageUp) => self.scroll_up(self.page()),
                Some(Nav::Top) => self.goto_top(),
                Some(Nav::Bottom) => self.offset = self.max_offset(),
                _ => return false,
            },
            Action::Mouse(mouse) => return self.wheel(mouse),
            _ => return false,
        }
        true
    }

    fn wheel(&mut self, mouse: &MouseEvent) -> bool {
        match mouse.kind {
            MouseEventKind::ScrollDown => self.scroll_down(WHEEL_LINES),
            MouseEventKind::ScrollUp => self.scroll_up(WHEEL_LINES),
            _ => return false,
        }
        true
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        if let Some(error) = &self.error {
            let error = Paragraph::new(format!("Error: {}", error))
                .style(Style::default().fg(Color::Red))
                .wrap(Wrap { trim: true });
            frame.render_widget(error, area);
            return;
        }

        if self.loading {
            let loading = Paragraph::new("Loading...").style(Style::default().fg(Color::Yellow));
            frame.render_widget(loading, area);
            return;
        }

        if self.lines.is_empty() {
            let empty = Paragraph::new(self.placeholder).style(Style::default().fg(Color::Gray));
            frame.render_widget(empty, area);
            return;
        }

        let visible: Vec<Line> = self
            .lines
            .iter()
            .skip(self.offset)
            .take(area.height as usize)
            .cloned()
            .collect();

        frame.render_widget(Paragraph::new(visible), area);
    }
}

fn highlight(content: &str, path: &str) -> Vec<Line<'static>> {
    let syntax = Syntax::from_path(path);
    let mut in_fence = false;

    content
        .lines()
        .map(|raw| {
            // Tabs confuse cell width accounting
            let line = raw.replace('\t', "    ");
            let style = match syntax {
                Syntax::Markdown => {
                    if line.trim_start().starts_with("```") {
                        in_fence = !in_fence;
                        Style::default().fg(Color::DarkGray)
                    } else if in_fence {
                        Style::default().fg(Color::Yellow)
                    } else if line.starts_with('#') {
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD)
                    } else if line.starts_with("> ") {
                        Style::default()
                            .fg(Color::Gray)
                            .add_modifier(Modifier::ITALIC)
                    } else {
                        Style::default()
                    }
                }
                Syntax::Diff => diff_style(&line),
                Syntax::Plain => Style::default(),
            };
            Line::from(Span::styled(line, style))
        })
        .collect()
}

pub fn diff_style(line: &str) -> Style {
    if line.starts_with('+') && !line.starts_with("+++") {
        Style::default().fg(Color::Green)
    } else if line.starts_with('-') && !line.starts_with("---") {
        Style::default().fg(Color::Red)
    } else if line.starts_with("@@") {
        Style::default().fg(Color::Cyan)
    } else if line.starts_with("commit ") {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    }
}
