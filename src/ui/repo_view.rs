use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Padding, Paragraph};
use ratatui::Frame;
use tracing::{debug, warn};

use crate::action::{Action, RepoTab, Request, Ticket};
use crate::config::LayoutConfig;
use crate::types::{Reference, RepositoryHandle, SelectedItem};
use crate::ui::{CodeViewer, CommitLog, FileBrowser, KeyHint, StatusBar, StatusSnapshot, TabStrip};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoState {
    /// Nothing selected yet
    Empty,
    /// Readme and HEAD are in flight; log and files wait for HEAD
    ReferencePending,
    Ready,
}

/// Drives one repository: owns the tab strip, status bar and the three
/// content views, decides what to fetch and routes every event.
pub struct RepoView {
    layout: LayoutConfig,
    state: RepoState,
    generation: u64,
    selected_repo: Option<RepositoryHandle>,
    selected_item: Option<SelectedItem>,
    reference: Option<Reference>,
    active_tab: RepoTab,
    tabs: TabStrip,
    statusbar: StatusBar,
    readme: CodeViewer,
    log: CommitLog,
    files: FileBrowser,
    error: Option<String>,
    width: u16,
    height: u16,
}

impl RepoView {
    pub fn new(layout: LayoutConfig) -> Self {
        let mut view = Self {
            layout,
            state: RepoState::Empty,
            generation: 0,
            selected_repo: None,
            selected_item: None,
            reference: None,
            active_tab: RepoTab::Readme,
            tabs: TabStrip::new(
                layout.header_height + layout.header_frame,
                layout.tabs_frame,
            ),
            statusbar: StatusBar::default(),
            readme: CodeViewer::new("No readme found."),
            log: CommitLog::new(),
            files: FileBrowser::new(),
            error: None,
            width: 0,
            height: 0,
        };
        view.set_size(0, 0);
        view
    }

    /// Every child gets the same body height, active or not
    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let body = self.layout.body_height(height);
        self.tabs.set_size(width, body);
        self.statusbar.set_size(width, body);
        self.readme.set_size(width, body);
        self.log.set_size(width, body);
        self.files.set_size(width, body);
    }

    #[cfg(test)]
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    #[cfg(test)]
    pub fn state(&self) -> RepoState {
        self.state
    }

    #[cfg(test)]
    pub fn active_tab(&self) -> RepoTab {
        self.active_tab
    }

    pub fn selected_repo(&self) -> Option<&RepositoryHandle> {
        self.selected_repo.as_ref()
    }

    #[cfg(test)]
    pub fn reference(&self) -> Option<&Reference> {
        self.reference.as_ref()
    }

    #[cfg(test)]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[cfg(test)]
    pub fn status(&self) -> &StatusSnapshot {
        self.statusbar.snapshot()
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.selected_repo.is_none() || generation != self.generation
    }

    fn ticket(&self) -> Option<Ticket> {
        Some(Ticket {
            generation: self.generation,
            repo: self.selected_repo.clone()?,
        })
    }

    /// Apply one event and return the fetches it calls for
    pub fn update(&mut self, action: Action) -> Vec<Request> {
        let mut requests = Vec::new();
        let mut refresh = false;

        match action {
            Action::SelectItem(item) => self.selected_item = Some(item),
            Action::SelectRepository(repo) => {
                requests = self.select(repo);
                refresh = true;
            }
            Action::ReferenceResolved {
                generation,
                reference,
            } => {
                if self.is_stale(generation) {
                    debug!(generation, "dropping stale reference");
                } else if self.state != RepoState::ReferencePending {
                    debug!(?reference, "reference already resolved");
                } else if let Some(ticket) = self.ticket() {
                    debug!(reference = %reference, "reference resolved");
                    self.reference = Some(reference.clone());
                    requests.extend(self.log.init(ticket.clone(), reference.clone()));
                    requests.extend(self.files.init(ticket, reference));
                    self.state = RepoState::Ready;
                    refresh = true;
                }
            }
            Action::ReferenceFailed { generation, error } => {
                if self.is_stale(generation) {
                    debug!(generation, "dropping stale reference failure");
                } else {
                    warn!("{}", error);
                    self.error = Some(error);
                }
            }
            Action::ReadmeLoaded { generation, readme } => {
                if self.is_stale(generation) {
                    debug!(generation, "dropping stale readme");
                } else {
                    self.readme.set_content(&readme.content, &readme.path);
                    refresh = true;
                }
            }
            Action::ReadmeFailed { generation, error } => {
                if self.is_stale(generation) {
                    debug!(generation, "dropping stale readme failure");
                } else {
                    self.readme.set_error(error);
                }
            }
            Action::Log { generation, msg } => {
                if self.is_stale(generation) {
                    debug!(generation, "dropping stale commit data");
                } else {
                    requests = self.log.receive(msg);
                    refresh = true;
                }
            }
            Action::Files { generation, msg } => {
                if self.is_stale(generation) {
                    debug!(generation, "dropping stale file data");
                } else {
                    requests = self.files.receive(msg);
                    refresh = true;
                }
            }
            Action::TabChanged(tab) => {
                if self.state == RepoState::Ready {
                    self.active_tab = tab;
                    self.tabs.set_active(tab);
                    refresh = true;
                } else {
                    self.tabs.set_active(self.active_tab);
                }
            }
            Action::Resize { width, height } => self.set_size(width, height),
            Action::Key(_) | Action::Mouse(_) => {
                if matches!(action, Action::Key(_)) {
                    self.error = None;
                }
                // A key the tab strip used is not seen by the views
                if let Some(tab) = self.tabs.update(&action) {
                    return self.update(Action::TabChanged(tab));
                }
                if self.selected_repo.is_some() {
                    requests = match self.active_tab {
                        RepoTab::Readme => {
                            self.readme.update(&action);
                            Vec::new()
                        }
                        RepoTab::Files => self.files.update(&action),
                        RepoTab::Commits => self.log.update(&action),
                        RepoTab::Branches | RepoTab::Tags => Vec::new(),
                    };
                    refresh = true;
                }
            }
            Action::UpdateStatusBar => refresh = true,
            Action::Error(message) => {
                warn!("{}", message);
                self.error = Some(message);
            }
        }

        if refresh {
            self.refresh_status();
        }
        requests
    }

    fn select(&mut self, repo: RepositoryHandle) -> Vec<Request> {
        self.generation += 1;
        debug!(repo = %repo.full_name(), generation = self.generation, "selecting");

        let item_matches = self
            .selected_item
            .as_ref()
            .is_some_and(|item| item.url == repo.url);
        if !item_matches {
            self.selected_item = Some(SelectedItem::from(&repo));
        }

        self.active_tab = RepoTab::Readme;
        self.tabs.set_active(RepoTab::Readme);
        self.readme.set_loading();
        self.log.reset();
        self.files.reset();
        self.reference = None;
        self.error = None;
        self.state = RepoState::ReferencePending;
        self.selected_repo = Some(repo.clone());

        let ticket = Ticket {
            generation: self.generation,
            repo,
        };
        vec![
            Request::FetchReadme(ticket.clone()),
            Request::ResolveReference(ticket),
        ]
    }

    /// Pull the status from whichever view is showing
    fn refresh_status(&mut self) {
        let Some(repo) = &self.selected_repo else {
            return;
        };

        let (value, info) = match self.active_tab {
            RepoTab::Readme => (
                String::new(),
                format!("{:.0}%", self.readme.scroll_percent() * 100.0),
            ),
            RepoTab::Commits => (self.log.status_value(), self.log.status_info()),
            RepoTab::Files => (self.files.status_value(), self.files.status_info()),
            RepoTab::Branches | RepoTab::Tags => (String::new(), String::new()),
        };
        let branch = self
            .reference
            .as_ref()
            .map(|r| format!(" {}", r.short()))
            .unwrap_or_default();

        self.statusbar.set_snapshot(StatusSnapshot {
            key: repo.name.clone(),
            value,
            info,
            branch,
        });
    }

    pub fn short_help(&self) -> Vec<KeyHint> {
        let mut hints = vec![KeyHint::new("esc", "back"), KeyHint::new("tab", "switch tab")];
        match self.active_tab {
            RepoTab::Readme => hints.push(KeyHint::new("↑/↓", "scroll")),
            RepoTab::Commits => hints.extend(self.log.short_help()),
            RepoTab::Files => hints.extend(self.files.short_help()),
            RepoTab::Branches | RepoTab::Tags => {}
        }
        hints
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let l = &self.layout;
        let [header, tabs, body, status] = Layout::vertical([
            Constraint::Length(l.header_height + l.header_frame),
            Constraint::Length(l.tabs_height + l.tabs_frame),
            Constraint::Length(l.body_height(area.height) + l.body_frame),
            Constraint::Length(l.status_bar_height),
        ])
        .areas(area);

        self.render_header(frame, header);
        self.tabs.render(frame, tabs);

        let top = l.body_frame / 2;
        let body = Block::default()
            .padding(Padding::new(0, 0, top, l.body_frame - top))
            .inner(body);
        match self.active_tab {
            RepoTab::Readme if self.selected_repo.is_some() => self.readme.render(frame, body),
            RepoTab::Files => self.files.render(frame, body),
            RepoTab::Commits => self.log.render(frame, body),
            RepoTab::Readme | RepoTab::Branches | RepoTab::Tags => {}
        }

        match &self.error {
            Some(error) => {
                let line = Line::from(Span::styled(
                    format!("Error: {}", error),
                    Style::default().fg(Color::Red),
                ));
                frame.render_widget(
                    Paragraph::new(line).style(Style::default().bg(Color::DarkGray)),
                    status,
                );
            }
            None => self.statusbar.render(frame, status),
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        if self.selected_repo.is_none() {
            return;
        }
        let Some(item) = &self.selected_item else {
            return;
        };

        let name = Span::styled(
            item.title.as_str(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
        let url = Span::styled(item.url.as_str(), Style::default().fg(Color::DarkGray));
        let gap = (area.width as usize)
            .saturating_sub(name.width() + url.width())
            .max(1);

        let lines = vec![
            Line::from(vec![name, Span::raw(" ".repeat(gap)), url]),
            Line::from(Span::styled(
                item.description.as_str(),
                Style::default().fg(Color::Gray),
            )),
        ];

        let header = Paragraph::new(lines)
            .block(Block::default().padding(Padding::bottom(self.layout.header_frame)));
        frame.render_widget(header, area);
    }
}
