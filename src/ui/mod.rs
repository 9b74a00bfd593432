mod code;
mod files;
mod log;
mod repo_view;
mod statusbar;
mod tabs;

pub use code::CodeViewer;
pub use files::FileBrowser;
pub use log::CommitLog;
#[cfg(test)]
pub use repo_view::RepoState;
pub use repo_view::RepoView;
pub use statusbar::{StatusBar, StatusSnapshot};
pub use tabs::TabStrip;

use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::app::App;

/// Rows taken by the help footer under the repository view
pub const FOOTER_HEIGHT: u16 = 1;

pub fn render(frame: &mut Frame, app: &App) {
    let [body, footer] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(FOOTER_HEIGHT)])
            .areas(frame.area());

    app.repo_view.render(frame, body);
    render_footer(frame, app, footer);
}

fn render_footer(frame: &mut Frame, app: &App, area: ratatui::layout::Rect) {
    if let Some(notice) = &app.notice {
        let line = Line::from(Span::styled(
            notice.as_str(),
            Style::default().fg(Color::Green),
        ));
        frame.render_widget(Paragraph::new(line), area);
        return;
    }

    let mut hints = app.repo_view.short_help();
    hints.extend(App::global_help());

    let mut spans = Vec::new();
    for (i, hint) in hints.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" • ", Style::default().fg(Color::DarkGray)));
        }
        spans.push(Span::styled(hint.key, Style::default().fg(Color::Gray)));
        spans.push(Span::raw(" "));
        spans.push(Span::styled(hint.desc, Style::default().fg(Color::DarkGray)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// One entry of the help footer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyHint {
    pub key: &'static str,
    pub desc: &'static str,
}

impl KeyHint {
    pub const fn new(key: &'static str, desc: &'static str) -> Self {
        Self { key, desc }
    }
}

/// Navigation intent shared by the scrollable views
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    Up,
    Down,
    PageUp,
    PageDown,
    Top,
    Bottom,
    Select,
    Back,
}

pub fn nav(key: &KeyEvent) -> Option<Nav> {
    match (key.code, key.modifiers) {
        (KeyCode::Char('d'), KeyModifiers::CONTROL) | (KeyCode::PageDown, _) => Some(Nav::PageDown),
        (KeyCode::Char('u'), KeyModifiers::CONTROL) | (KeyCode::PageUp, _) => Some(Nav::PageUp),
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(Nav::Down),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(Nav::Up),
        (KeyCode::Char('g'), _) | (KeyCode::Home, _) => Some(Nav::Top),
        (KeyCode::Char('G'), _) | (KeyCode::End, _) => Some(Nav::Bottom),
        (KeyCode::Enter, _) | (KeyCode::Char('l'), _) | (KeyCode::Right, _) => Some(Nav::Select),
        (KeyCode::Esc, _)
        | (KeyCode::Backspace, _)
        | (KeyCode::Char('h'), _)
        | (KeyCode::Left, _) => Some(Nav::Back),
        _ => None,
    }
}

/// Wheel events move list selections one row at a time
pub fn wheel(mouse: &MouseEvent) -> Option<Nav> {
    match mouse.kind {
        MouseEventKind::ScrollDown => Some(Nav::Down),
        MouseEventKind::ScrollUp => Some(Nav::Up),
        _ => None,
    }
}

/// Move a list selection. `page` is the visible row count.
pub fn step(selected: usize, len: usize, nav: Nav, page: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let last = len - 1;
    let page = page.max(1);
    match nav {
        Nav::Up => selected.saturating_sub(1),
        Nav::Down => (selected + 1).min(last),
        Nav::PageUp => selected.saturating_sub(page),
        Nav::PageDown => (selected + page).min(last),
        Nav::Top => 0,
        Nav::Bottom => last,
        Nav::Select | Nav::Back => selected,
    }
}

/// First visible row of a list window `rows` tall that keeps `selected` on
/// screen, moving as little as possible from `offset`
pub fn follow(offset: usize, selected: usize, rows: usize) -> usize {
    let rows = rows.max(1);
    if selected < offset {
        selected
    } else if selected >= offset + rows {
        selected + 1 - rows
    } else {
        offset
    }
}

/// Cut `s` to `max` characters, marking the cut with "..."
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

pub fn format_age(dt: chrono::DateTime<chrono::Utc>) -> String {
    let now = Utc::now();
    let duration = now.signed_duration_since(dt);

    if duration.num_days() > 0 {
        format!("{}d", duration.num_days())
    } else if duration.num_hours() > 0 {
        format!("{}h", duration.num_hours())
    } else if duration.num_minutes() > 0 {
        format!("{}m", duration.num_minutes())
    } else {
        "now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn step_clamps_at_both_ends() {
        assert_eq!(step(0, 5, Nav::Up, 3), 0);
        assert_eq!(step(4, 5, Nav::Down, 3), 4);
        assert_eq!(step(1, 5, Nav::PageDown, 3), 4);
        assert_eq!(step(4, 5, Nav::PageUp, 3), 1);
        assert_eq!(step(2, 0, Nav::Bottom, 3), 0);
    }

    #[test]
    fn follow_scrolls_only_at_the_edges() {
        // Moving up from the bottom keeps the window until the top edge
        assert_eq!(follow(90, 98, 10), 90);
        assert_eq!(follow(90, 90, 10), 90);
        assert_eq!(follow(90, 89, 10), 89);
        assert_eq!(follow(0, 10, 10), 1);
        assert_eq!(follow(0, 3, 0), 3);
    }

    #[test]
    fn ctrl_d_pages_but_d_does_nothing() {
        let ctrl_d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);
        let d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::NONE);
        assert_eq!(nav(&ctrl_d), Some(Nav::PageDown));
        assert_eq!(nav(&d), None);
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
        assert_eq!(truncate("short", 8), "short");
    }

    #[test]
    fn age_buckets() {
        assert_eq!(format_age(Utc::now() - Duration::days(3)), "3d");
        assert_eq!(format_age(Utc::now() - Duration::hours(5)), "5h");
        assert_eq!(format_age(Utc::now()), "now");
    }
}
