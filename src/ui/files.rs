use std::collections::HashMap;

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{List, ListItem, ListState, Paragraph};
use ratatui::Frame;
use tracing::debug;

use crate::action::{Action, FilesMsg, Request, Ticket};
use crate::types::{EntryKind, Reference, TreeEntry};
use crate::ui::{follow, nav, step, truncate, wheel, CodeViewer, KeyHint, Nav};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Listing,
    File,
}

/// Directory browser over the resolved reference. Listings are cached per
/// path so walking back up never refetches.
#[derive(Debug, Clone)]
pub struct FileBrowser {
    ticket: Option<Ticket>,
    reference: Option<Reference>,
    path: String,
    entries: Vec<TreeEntry>,
    selected: usize,
    offset: usize,
    // Parent directories with the selection and scroll to restore in each
    history: Vec<(String, usize, usize)>,
    listings: HashMap<String, Vec<TreeEntry>>,
    pending: Option<String>,
    error: Option<String>,
    mode: Mode,
    file: Option<String>,
    viewer: CodeViewer,
    width: u16,
    height: u16,
}

impl Default for FileBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl FileBrowser {
    pub fn new() -> Self {
        Self {
            ticket: None,
            reference: None,
            path: String::new(),
            entries: Vec::new(),
            selected: 0,
            offset: 0,
            history: Vec::new(),
            listings: HashMap::new(),
            pending: None,
            error: None,
            mode: Mode::Listing,
            file: None,
            viewer: CodeViewer::new("Empty file."),
            width: 0,
            height: 0,
        }
    }

    pub fn reset(&mut self) {
        let (width, height) = (self.width, self.height);
        *self = Self::new();
        self.set_size(width, height);
    }

    pub fn init(&mut self, ticket: Ticket, reference: Reference) -> Vec<Request> {
        self.reset();
        self.ticket = Some(ticket);
        self.reference = Some(reference);
        self.list(String::new()).into_iter().collect()
    }

    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.offset = follow(self.offset, self.selected, height as usize);
        self.viewer.set_size(width, height);
    }

    #[cfg(test)]
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    #[cfg(test)]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[cfg(test)]
    pub fn selected(&self) -> usize {
        self.selected
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    #[cfg(test)]
    pub fn is_initialized(&self) -> bool {
        self.ticket.is_some()
    }

    #[cfg(test)]
    pub fn viewing_file(&self) -> Option<&str> {
        match self.mode {
            Mode::File => self.file.as_deref(),
            Mode::Listing => None,
        }
    }

    fn list(&mut self, path: String) -> Option<Request> {
        let ticket = self.ticket.clone()?;
        let reference = self.reference.clone()?;
        self.pending = Some(path.clone());
        Some(Request::ListTree {
            ticket,
            reference,
            path,
        })
    }

    fn enter_dir(&mut self, path: String) -> Option<Request> {
        self.history
            .push((std::mem::take(&mut self.path), self.selected, self.offset));
        self.path = path.clone();
        self.selected = 0;
        self.offset = 0;
        self.error = None;
        match self.listings.get(&path) {
            Some(cached) => {
                self.entries = cached.clone();
                self.pending = None;
                None
            }
            None => {
                self.entries.clear();
                self.list(path)
            }
        }
    }

    fn open_file(&mut self, path: String) -> Option<Request> {
        let ticket = self.ticket.clone()?;
        let reference = self.reference.clone()?;
        self.mode = Mode::File;
        self.file = Some(path.clone());
        self.pending = Some(path.clone());
        self.viewer.set_loading();
        Some(Request::ReadBlob {
            ticket,
            reference,
            path,
        })
    }

    fn go_back(&mut self) {
        if self.mode == Mode::File {
            self.mode = Mode::Listing;
            self.file = None;
            self.pending = None;
            return;
        }
        let Some((path, selected, offset)) = self.history.pop() else {
            return;
        };
        self.entries = self.listings.get(&path).cloned().unwrap_or_default();
        self.path = path;
        self.selected = selected;
        self.offset = follow(offset, selected, self.height as usize);
        self.pending = None;
        self.error = None;
    }

    /// Data arriving from the worker
    pub fn receive(&mut self, msg: FilesMsg) -> Vec<Request> {
        match msg {
            FilesMsg::Listing { path, mut entries } => {
                if self.pending.as_deref() != Some(path.as_str()) {
                    debug!(path = %path, "dropping listing nobody asked for");
                    return Vec::new();
                }
                self.pending = None;
                sort_entries(&mut entries);
                self.listings.insert(path.clone(), entries.clone());
                if path == self.path {
                    self.entries = entries;
                    self.error = None;
                }
            }
            FilesMsg::Blob { path, content } => {
                if self.pending.as_deref() != Some(path.as_str()) {
                    debug!(path = %path, "dropping blob nobody asked for");
                    return Vec::new();
                }
                self.pending = None;
                self.viewer.set_content(&content, &path);
            }
            FilesMsg::Failed { path, error } => {
                if self.pending.as_deref() != Some(path.as_str()) {
                    return Vec::new();
                }
                self.pending = None;
                match self.mode {
                    Mode::File => self.viewer.set_error(error),
                    Mode::Listing => self.error = Some(error),
                }
            }
        }
        Vec::new()
    }

    /// Key and mouse input while the Files tab is active
    pub fn update(&mut self, action: &Action) -> Vec<Request> {
        if self.mode == Mode::File {
            if let Action::Key(key) = action {
                if nav(key) == Some(Nav::Back) {
                    self.go_back();
                    return Vec::new();
                }
            }
            self.viewer.update(action);
            return Vec::new();
        }

        let intent = match action {
            Action::Key(key) => nav(key),
            Action::Mouse(mouse) => wheel(mouse),
            _ => None,
        };
        let Some(intent) = intent else {
            return Vec::new();
        };

        match intent {
            Nav::Select => {
                let Some(entry) = self.entries.get(self.selected).cloned() else {
                    return Vec::new();
                };
                let request = match entry.kind {
                    EntryKind::Dir => self.enter_dir(entry.path),
                    EntryKind::File | EntryKind::Symlink => self.open_file(entry.path),
                    EntryKind::Submodule => None,
                };
                request.into_iter().collect()
            }
            Nav::Back => {
                self.go_back();
                Vec::new()
            }
            _ => {
                self.selected = step(
                    self.selected,
                    self.entries.len(),
                    intent,
                    self.height as usize,
                );
                self.offset = follow(self.offset, self.selected, self.height as usize);
                Vec::new()
            }
        }
    }

    pub fn status_value(&self) -> String {
        match (self.mode, &self.file) {
            (Mode::File, Some(file)) => format!("/{}", file),
            _ => format!("/{}", self.path),
        }
    }

    pub fn status_info(&self) -> String {
        match self.mode {
            Mode::File => format!("☰ {:.0}%", self.viewer.scroll_percent() * 100.0),
            Mode::Listing if self.entries.is_empty() => String::new(),
            Mode::Listing => format!("{}/{}", self.selected + 1, self.entries.len()),
        }
    }

    pub fn short_help(&self) -> Vec<KeyHint> {
        match self.mode {
            Mode::Listing => vec![
                KeyHint::new("↑/↓", "navigate"),
                KeyHint::new("enter", "open"),
                KeyHint::new("h", "parent"),
            ],
            Mode::File => vec![KeyHint::new("↑/↓", "scroll"), KeyHint::new("h", "back")],
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        if self.mode == Mode::File {
            self.viewer.render(frame, area);
            return;
        }

        if let Some(error) = &self.error {
            let error = Paragraph::new(format!("Error: {}", error))
                .style(Style::default().fg(Color::Red));
            frame.render_widget(error, area);
            return;
        }

        if self.entries.is_empty() {
            let (text, color) = if self.pending.is_some() {
                ("Loading files...", Color::Yellow)
            } else {
                ("No files", Color::Gray)
            };
            frame.render_widget(
                Paragraph::new(text).style(Style::default().fg(color)),
                area,
            );
            return;
        }

        let w = area.width as usize;
        let fixed = 13; // mode(2) + space(1) + space(1) + size(9)
        let flex = w.saturating_sub(fixed).max(10);

        let items: Vec<ListItem> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let (icon, name_style) = match entry.kind {
                    EntryKind::Dir => (
                        "▸",
                        Style::default()
                            .fg(Color::Blue)
                            .add_modifier(Modifier::BOLD),
                    ),
                    EntryKind::Symlink => ("↪", Style::default().fg(Color::Cyan)),
                    EntryKind::Submodule => ("◆", Style::default().fg(Color::Magenta)),
                    EntryKind::File => (" ", Style::default()),
                };
                let name_style = if i == self.selected {
                    name_style.fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    name_style
                };
                let name = if entry.is_dir() {
                    format!("{}/", entry.name)
                } else {
                    entry.name.clone()
                };
                let size = match entry.kind {
                    EntryKind::File => format_size(entry.size),
                    _ => String::new(),
                };

                let line = Line::from(vec![
                    Span::styled(format!("{:<2}", icon), Style::default().fg(Color::DarkGray)),
                    Span::raw(" "),
                    Span::styled(format!("{:<flex$}", truncate(&name, flex)), name_style),
                    Span::raw(" "),
                    Span::styled(format!("{:>9}", size), Style::default().fg(Color::DarkGray)),
                ]);
                ListItem::new(line)
            })
            .collect();

        let list = List::new(items).highlight_style(Style::default().bg(Color::DarkGray));
        let mut state = ListState::default()
            .with_offset(self.offset)
            .with_selected(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }
}

/// Directories first, then by name
fn sort_entries(entries: &mut [TreeEntry]) {
    entries.sort_by(|a, b| {
        b.is_dir()
            .cmp(&a.is_dir())
            .then_with(|| a.name.cmp(&b.name))
    });
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
