use crossterm::event::{KeyCode, MouseButton, MouseEventKind};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Tabs};
use ratatui::Frame;

use crate::action::{Action, RepoTab};

const DIVIDER: &str = "│";

/// Tab strip for the repository view. Emits the newly active tab on
/// Tab/Shift-Tab or a click on a title.
#[derive(Debug, Clone)]
pub struct TabStrip {
    active: RepoTab,
    // Screen row the titles are drawn on, for click hit tests
    row: u16,
    frame: u16,
    width: u16,
    height: u16,
}

impl TabStrip {
    pub fn new(row: u16, frame: u16) -> Self {
        Self {
            active: RepoTab::default(),
            row,
            frame,
            width: 0,
            height: 0,
        }
    }

    #[cfg(test)]
    pub fn active(&self) -> RepoTab {
        self.active
    }

    pub fn set_active(&mut self, tab: RepoTab) {
        self.active = tab;
    }

    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }

    #[cfg(test)]
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Returns the new tab when the event switched tabs
    pub fn update(&mut self, action: &Action) -> Option<RepoTab> {
        let next = match action {
            Action::Key(key) => match key.code {
                KeyCode::Tab => Some(self.active.next()),
                KeyCode::BackTab => Some(self.active.prev()),
                _ => None,
            },
            Action::Mouse(mouse) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => {
                if mouse.row == self.row {
                    tab_at(mouse.column)
                } else {
                    None
                }
            }
            _ => None,
        }?;

        self.active = next;
        Some(next)
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<String> = RepoTab::ALL.iter().map(|t| t.to_string()).collect();
        let block = if self.frame > 0 {
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(Color::DarkGray))
        } else {
            Block::default()
        };
        let tabs = Tabs::new(titles)
            .block(block)
            .select(self.active.index())
            .divider(DIVIDER)
            .style(Style::default().fg(Color::Gray))
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            );

        frame.render_widget(tabs, area);
    }
}

/// Column layout mirrors the Tabs widget: " title " then a divider
fn tab_at(column: u16) -> Option<RepoTab> {
    let mut x = 0u16;
    for tab in RepoTab::ALL {
        let width = tab.to_string().chars().count() as u16 + 2;
        if column >= x && column < x + width {
            return Some(tab);
        }
        x += width + DIVIDER.chars().count() as u16;
    }
    None
}
