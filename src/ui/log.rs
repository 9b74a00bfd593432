use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{List, ListItem, ListState, Paragraph};
use ratatui::Frame;
use tracing::debug;

use crate::action::{Action, LogMsg, Request, Ticket};
use crate::forge::PAGE_SIZE;
use crate::types::{Commit, CommitDetail, Reference};
use crate::ui::{follow, format_age, nav, step, truncate, wheel, CodeViewer, KeyHint, Nav};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    List,
    Diff,
}

/// Paged commit history with a diff view for the highlighted commit
#[derive(Debug, Clone)]
pub struct CommitLog {
    ticket: Option<Ticket>,
    reference: Option<Reference>,
    commits: Vec<Commit>,
    total: Option<u64>,
    selected: usize,
    // First visible row of the list
    offset: usize,
    loaded_pages: u32,
    pending_page: Option<u32>,
    exhausted: bool,
    error: Option<String>,
    mode: Mode,
    diff_sha: Option<String>,
    diff: CodeViewer,
    width: u16,
    height: u16,
}

impl Default for CommitLog {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitLog {
    pub fn new() -> Self {
        Self {
            ticket: None,
            reference: None,
            commits: Vec::new(),
            total: None,
            selected: 0,
            offset: 0,
            loaded_pages: 0,
            pending_page: None,
            exhausted: false,
            error: None,
            mode: Mode::List,
            diff_sha: None,
            diff: CodeViewer::new("No changes."),
            width: 0,
            height: 0,
        }
    }

    /// Forget everything loaded for the previous repository. Size is kept.
    pub fn reset(&mut self) {
        let (width, height) = (self.width, self.height);
        *self = Self::new();
        self.set_size(width, height);
    }

    pub fn init(&mut self, ticket: Ticket, reference: Reference) -> Vec<Request> {
        self.reset();
        self.ticket = Some(ticket);
        self.reference = Some(reference);
        self.request_page(1).into_iter().collect()
    }

    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.offset = follow(self.offset, self.selected, height as usize);
        self.diff.set_size(width, height);
    }

    #[cfg(test)]
    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    #[cfg(test)]
    pub fn selected(&self) -> usize {
        self.selected
    }

    #[cfg(test)]
    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    #[cfg(test)]
    pub fn is_initialized(&self) -> bool {
        self.ticket.is_some()
    }

    #[cfg(test)]
    pub fn showing_diff(&self) -> bool {
        self.mode == Mode::Diff
    }

    #[cfg(test)]
    pub fn pending_page(&self) -> Option<u32> {
        self.pending_page
    }

    fn request_page(&mut self, page: u32) -> Option<Request> {
        let ticket = self.ticket.clone()?;
        let reference = self.reference.clone()?;
        self.pending_page = Some(page);
        Some(Request::FetchCommits {
            ticket,
            reference,
            page,
        })
    }

    fn has_more(&self) -> bool {
        !self.exhausted
            && self
                .total
                .map_or(true, |total| (self.commits.len() as u64) < total)
    }

    /// Ask for the next page once the selection is within a screen of the end
    fn maybe_fetch_more(&mut self) -> Option<Request> {
        if self.pending_page.is_some() || !self.has_more() {
            return None;
        }
        let near_end = self.selected + (self.height as usize).max(1) >= self.commits.len();
        if !near_end {
            return None;
        }
        self.request_page(self.loaded_pages + 1)
    }

    /// Data arriving from the worker
    pub fn receive(&mut self, msg: LogMsg) -> Vec<Request> {
        match msg {
            LogMsg::PageLoaded { page, result } => {
                if self.pending_page != Some(page) {
                    debug!(page, "dropping commit page nobody asked for");
                    return Vec::new();
                }
                self.pending_page = None;
                self.loaded_pages = page;
                self.exhausted = result.items.len() < PAGE_SIZE as usize;
                self.commits.extend(result.items);
                self.total = match result.total_count.or(self.total) {
                    None if self.exhausted => Some(self.commits.len() as u64),
                    total => total,
                };
                self.error = None;
                // A tall window may still have room below the last row
                self.maybe_fetch_more().into_iter().collect()
            }
            LogMsg::PageFailed { page, error } => {
                if self.pending_page == Some(page) {
                    self.pending_page = None;
                    self.error = Some(error);
                }
                Vec::new()
            }
            LogMsg::DetailLoaded(detail) => {
                if self.diff_sha.as_deref() == Some(detail.sha.as_str()) {
                    let path = format!("{}.diff", short(&detail.sha));
                    self.diff.set_content(&commit_text(&detail), &path);
                }
                Vec::new()
            }
            LogMsg::DetailFailed { sha, error } => {
                if self.diff_sha.as_deref() == Some(sha.as_str()) {
                    self.diff.set_error(error);
                }
                Vec::new()
            }
        }
    }

    /// Key and mouse input while the Commits tab is active
    pub fn update(&mut self, action: &Action) -> Vec<Request> {
        if self.mode == Mode::Diff {
            if let Action::Key(key) = action {
                if nav(key) == Some(Nav::Back) {
                    self.mode = Mode::List;
                    self.diff_sha = None;
                    return Vec::new();
                }
            }
            self.diff.update(action);
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
            Nav::Select => self.open_selected().into_iter().collect(),
            Nav::Back => Vec::new(),
            _ => {
                self.selected = step(
                    self.selected,
                    self.commits.len(),
                    intent,
                    self.height as usize,
                );
                self.offset = follow(self.offset, self.selected, self.height as usize);
                self.maybe_fetch_more().into_iter().collect()
            }
        }
    }

    fn open_selected(&mut self) -> Option<Request> {
        let ticket = self.ticket.clone()?;
        let sha = self.commits.get(self.selected)?.sha.clone();
        self.mode = Mode::Diff;
        self.diff_sha = Some(sha.clone());
        self.diff.set_loading();
        Some(Request::FetchCommit { ticket, sha })
    }

    pub fn status_value(&self) -> String {
        match self.commits.get(self.selected) {
            Some(c) => format!(
                "{} by {} on {}",
                c.short_sha(),
                c.author,
                c.date.format("%d %b %Y")
            ),
            None => String::new(),
        }
    }

    pub fn status_info(&self) -> String {
        match self.mode {
            Mode::Diff => format!("☰ {:.0}%", self.diff.scroll_percent() * 100.0),
            Mode::List if self.commits.is_empty() => String::new(),
            Mode::List => match self.total {
                Some(total) => format!("{}/{}", self.selected + 1, total),
                None => format!("{}/{}+", self.selected + 1, self.commits.len()),
            },
        }
    }

    pub fn short_help(&self) -> Vec<KeyHint> {
        match self.mode {
            Mode::List => vec![
                KeyHint::new("↑/↓", "navigate"),
                KeyHint::new("enter", "view diff"),
            ],
            Mode::Diff => vec![KeyHint::new("↑/↓", "scroll"), KeyHint::new("h", "back")],
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        if self.mode == Mode::Diff {
            self.diff.render(frame, area);
            return;
        }

        if self.commits.is_empty() {
            let (text, color) = match (&self.error, self.pending_page) {
                (Some(error), _) => (format!("Error: {}", error), Color::Red),
                (None, Some(_)) => ("Loading commits...".to_string(), Color::Yellow),
                (None, None) => ("No commits found".to_string(), Color::Gray),
            };
            frame.render_widget(
                Paragraph::new(text).style(Style::default().fg(color)),
                area,
            );
            return;
        }

        let w = area.width as usize;
        let fixed = 29; // sha(7) + space(1) + space(1) + @author(16) + space(1) + age(3)
        let flex = w.saturating_sub(fixed).max(10);

        let items: Vec<ListItem> = self
            .commits
            .iter()
            .enumerate()
            .map(|(i, commit)| {
                let style = if i == self.selected {
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };

                let line = Line::from(vec![
                    Span::styled(commit.short_sha(), Style::default().fg(Color::Yellow)),
                    Span::raw(" "),
                    Span::styled(format!("{:<flex$}", truncate(&commit.message, flex)), style),
                    Span::raw(" "),
                    Span::styled(
                        format!("@{:<15}", truncate(&commit.author, 15)),
                        Style::default().fg(Color::Cyan),
                    ),
                    Span::raw(" "),
                    Span::styled(
                        format!("{:>3}", format_age(commit.date)),
                        Style::default().fg(Color::DarkGray),
                    ),
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

fn short(sha: &str) -> &str {
    &sha[..7.min(sha.len())]
}

fn status_char(status: &str) -> char {
    match status {
        "added" => 'A',
        "removed" | "deleted" => 'D',
        "modified" | "changed" => 'M',
        "renamed" => 'R',
        _ => '?',
    }
}

/// Plain text for the diff view, in the shape of `git show`
fn commit_text(detail: &CommitDetail) -> String {
    let mut out = format!(
        "commit {}\nAuthor: {}\nDate:   {}\n\n",
        detail.sha,
        detail.author,
        detail.date.format("%a %b %e %H:%M:%S %Y %z")
    );

    for line in detail.message.lines() {
        out.push_str("    ");
        out.push_str(line);
        out.push('\n');
    }

    out.push_str(&format!(
        "\n {} files changed, {} insertions(+), {} deletions(-)\n",
        detail.files.len(),
        detail.stats.additions,
        detail.stats.deletions
    ));

    for file in &detail.files {
        out.push_str(&format!(
            "\n{} {} +{} -{}\n",
            status_char(&file.status),
            file.filename,
            file.additions,
            file.deletions
        ));
        if let Some(patch) = &file.patch {
            out.push_str(&format!("--- a/{0}\n+++ b/{0}\n", file.filename));
            out.push_str(patch);
            if !patch.ends_with('\n') {
                out.push('\n');
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    use crate::types::{CommitFile, CommitStats, PagedResult, RepositoryHandle};

    fn ticket() -> Ticket {
        Ticket {
            generation: 1,
            repo: RepositoryHandle {
                owner: "acme".to_string(),
                name: "demo".to_string(),
                description: None,
                url: String::new(),
                clone_url: String::new(),
            },
        }
    }

    fn commits(range: std::ops::Range<usize>) -> Vec<Commit> {
        range
            .map(|i| Commit {
                sha: format!("{:040x}", i),
                message: format!("change {}", i),
                author: "ada".to_string(),
                date: Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap(),
            })
            .collect()
    }

    fn page(page: u32, items: Vec<Commit>, total: u64) -> LogMsg {
        LogMsg::PageLoaded {
            page,
            result: PagedResult {
                items,
                total_count: Some(total),
            },
        }
    }

    fn key(code: KeyCode) -> Action {
        Action::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn loaded_log(total: u64) -> CommitLog {
        let mut log = CommitLog::new();
        log.set_size(80, 10);
        log.init(ticket(), Reference::branch("main", "abc"));
        let first = (total as usize).min(PAGE_SIZE as usize);
        log.receive(page(1, commits(0..first), total));
        log
    }

    #[test]
    fn init_requests_first_page() {
        let mut log = CommitLog::new();
        let requests = log.init(ticket(), Reference::branch("main", "abc"));
        assert_eq!(
            requests,
            vec![Request::FetchCommits {
                ticket: ticket(),
                reference: Reference::branch("main", "abc"),
                page: 1,
            }]
        );
        assert_eq!(log.pending_page(), Some(1));
    }

    #[test]
    fn unrequested_page_is_dropped() {
        let mut log = loaded_log(120);
        log.receive(page(3, commits(100..120), 120));
        assert_eq!(log.commit_count(), 50);
    }

    #[test]
    fn nearing_the_end_fetches_next_page() {
        let mut log = loaded_log(120);
        let requests = log.update(&key(KeyCode::Char('G')));
        assert!(matches!(
            requests.as_slice(),
            [Request::FetchCommits { page: 2, .. }]
        ));

        // No duplicate while page 2 is in flight
        assert!(log.update(&key(KeyCode::Char('k'))).is_empty());

        log.receive(page(2, commits(50..100), 120));
        assert_eq!(log.commit_count(), 100);
        assert_eq!(log.status_info(), "49/120");
    }

    #[test]
    fn short_final_page_stops_paging() {
        let mut log = loaded_log(12);
        assert!(log.update(&key(KeyCode::Char('G'))).is_empty());
        assert_eq!(log.selected(), 11);
    }

    #[test]
    fn unknown_total_counts_loaded_commits_until_the_last_page() {
        let mut log = CommitLog::new();
        log.set_size(80, 10);
        log.init(ticket(), Reference::branch("main", "abc"));
        log.receive(LogMsg::PageLoaded {
            page: 1,
            result: PagedResult {
                items: commits(0..50),
                total_count: None,
            },
        });
        assert_eq!(log.status_info(), "1/50+");

        let requests = log.update(&key(KeyCode::Char('G')));
        assert!(matches!(
            requests.as_slice(),
            [Request::FetchCommits { page: 2, .. }]
        ));
        log.receive(LogMsg::PageLoaded {
            page: 2,
            result: PagedResult {
                items: commits(50..60),
                total_count: None,
            },
        });
        assert_eq!(log.status_info(), "50/60");
        assert!(log.update(&key(KeyCode::Char('G'))).is_empty());
        assert_eq!(log.status_info(), "60/60");
    }

    #[test]
    fn known_total_survives_a_page_without_one() {
        let mut log = loaded_log(120);
        log.update(&key(KeyCode::Char('G')));
        log.receive(LogMsg::PageLoaded {
            page: 2,
            result: PagedResult {
                items: commits(50..100),
                total_count: None,
            },
        });
        assert_eq!(log.status_info(), "50/120");
    }

    #[test]
    fn moving_up_from_the_bottom_keeps_the_window() {
        let mut log = loaded_log(50);
        log.update(&key(KeyCode::Char('G')));
        log.update(&key(KeyCode::Char('k')));
        log.update(&key(KeyCode::Char('k')));

        let mut terminal = Terminal::new(TestBackend::new(80, 10)).unwrap();
        terminal
            .draw(|frame| log.render(frame, frame.area()))
            .unwrap();
        let buffer = terminal.backend().buffer();
        let row = |y: u16| -> String {
            (0..80u16)
                .map(|x| buffer[(x, y)].symbol().to_string())
                .collect()
        };

        assert!(row(0).contains("change 40 "));
        assert!(row(7).contains("change 47 "));
        assert!(row(9).contains("change 49 "));
    }

    #[test]
    fn status_value_describes_selection() {
        let log = loaded_log(3);
        assert_eq!(log.status_value(), "0000000 by ada on 09 Mar 2024");
        assert_eq!(log.status_info(), "1/3");
    }

    #[test]
    fn enter_opens_diff_and_back_restores_selection() {
        let mut log = loaded_log(3);
        log.set_size(80, 40);
        log.update(&key(KeyCode::Down));
        let requests = log.update(&key(KeyCode::Enter));
        let sha = format!("{:040x}", 1);
        assert_eq!(
            requests,
            vec![Request::FetchCommit {
                ticket: ticket(),
                sha: sha.clone(),
            }]
        );
        assert!(log.showing_diff());

        log.receive(LogMsg::DetailLoaded(Box::new(CommitDetail {
            sha,
            message: "change 1".to_string(),
            author: "ada".to_string(),
            date: Utc::now(),
            stats: CommitStats {
                additions: 1,
                deletions: 0,
                total: 1,
            },
            files: vec![CommitFile {
                filename: "src/lib.rs".to_string(),
                status: "modified".to_string(),
                additions: 1,
                deletions: 0,
                patch: Some("@@ -1 +1,2 @@\n fn a() {}\n+fn b() {}".to_string()),
            }],
        })));
        assert_eq!(log.status_info(), "☰ 100%");

        log.update(&key(KeyCode::Esc));
        assert!(!log.showing_diff());
        assert_eq!(log.selected(), 1);
    }

    #[test]
    fn commit_text_includes_patch_headers() {
        let detail = CommitDetail {
            sha: "abc".to_string(),
            message: "subject\n\nbody".to_string(),
            author: "ada".to_string(),
            date: Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap(),
            stats: CommitStats::default(),
            files: vec![CommitFile {
                filename: "a.txt".to_string(),
                status: "added".to_string(),
                additions: 1,
                deletions: 0,
                patch: Some("+hello".to_string()),
            }],
        };
        let text = commit_text(&detail);
        assert!(text.starts_with("commit abc\nAuthor: ada\n"));
        assert!(text.contains("    subject\n    \n    body\n"));
        assert!(text.ends_with("A a.txt +1 -0\n--- a/a.txt\n+++ b/a.txt\n+hello\n"));
    }
}
