use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

/// What the status bar shows. Rebuilt from the active view on each refresh.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    pub key: String,
    pub value: String,
    pub info: String,
    pub branch: String,
}

#[derive(Debug, Clone, Default)]
pub struct StatusBar {
    snapshot: StatusSnapshot,
    width: u16,
    height: u16,
}

impl StatusBar {
    pub fn set_snapshot(&mut self, snapshot: StatusSnapshot) {
        self.snapshot = snapshot;
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> &StatusSnapshot {
        &self.snapshot
    }

    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }

    #[cfg(test)]
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let s = &self.snapshot;
        let key = format!(" {} ", s.key);
        let info = if s.info.is_empty() {
            String::new()
        } else {
            format!(" {} ", s.info)
        };
        let branch = if s.branch.is_empty() {
            String::new()
        } else {
            format!("{} ", s.branch)
        };

        let used = [&key, &info, &branch]
            .iter()
            .map(|p| p.chars().count())
            .sum::<usize>();
        let room = (area.width as usize).saturating_sub(used + 1);
        let value: String = s.value.chars().take(room).collect();
        let value = format!(" {:<room$}", value);

        let line = Line::from(vec![
            Span::styled(
                key,
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(value, Style::default().fg(Color::Gray)),
            Span::styled(info, Style::default().fg(Color::White)),
            Span::styled(
                branch,
                Style::default().fg(Color::Black).bg(Color::Cyan),
            ),
        ]);

        let bar = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
        frame.render_widget(bar, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    #[test]
    fn info_and_branch_sit_at_the_right_edge() {
        let mut bar = StatusBar::default();
        bar.set_snapshot(StatusSnapshot {
            key: "demo".to_string(),
            value: String::new(),
            info: "100%".to_string(),
            branch: " main".to_string(),
        });

        let mut terminal = Terminal::new(TestBackend::new(40, 1)).unwrap();
        terminal.draw(|frame| bar.render(frame, frame.area())).unwrap();

        let row: String = (0..40u16)
            .map(|x| terminal.backend().buffer()[(x, 0u16)].symbol().to_string())
            .collect();
        assert!(row.starts_with(" demo "));
        assert!(row.ends_with(" 100%  main "));
    }
}
