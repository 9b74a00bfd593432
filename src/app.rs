use crossterm::event::{KeyCode, KeyEvent};
use tracing::{info, warn};

use crate::action::{Action, Request};
use crate::config::LayoutConfig;
use crate::event::Event;
use crate::ui::{KeyHint, RepoView, FOOTER_HEIGHT};

pub struct App {
    pub repo_view: RepoView,
    /// One-shot message shown in the footer until the next key
    pub notice: Option<String>,
    pub should_quit: bool,
    repo_name: String,
    requests: Vec<Request>,
}

impl App {
    pub fn new(repo_name: String, layout: LayoutConfig) -> Self {
        Self {
            repo_view: RepoView::new(layout),
            notice: None,
            should_quit: false,
            repo_name,
            requests: Vec::new(),
        }
    }

    pub fn global_help() -> [KeyHint; 4] {
        [
            KeyHint::new("o", "open"),
            KeyHint::new("y", "copy clone"),
            KeyHint::new("r", "reload"),
            KeyHint::new("q", "quit"),
        ]
    }

    /// Requests produced since the last call, for the worker
    pub fn take_requests(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.requests)
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Init => self.resolve(),
            Event::Render => {}
            Event::Resize(width, height) => self.resize(width, height),
            Event::Mouse(mouse) => self.update(Action::Mouse(mouse)),
            Event::Key(key) => self.handle_key(key),
        }
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.update(Action::Resize {
            width,
            height: height.saturating_sub(FOOTER_HEIGHT),
        });
    }

    fn handle_key(&mut self, key: KeyEvent) {
        self.notice = None;
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('o') => self.open_in_browser(),
            KeyCode::Char('y') => self.copy_clone_command(),
            KeyCode::Char('r') => self.resolve(),
            _ => self.update(Action::Key(key)),
        }
    }

    /// Look the repository up again. Doubles as retry after a failure.
    fn resolve(&mut self) {
        info!(repo = %self.repo_name, "resolving");
        self.requests.push(Request::ResolveRepository {
            name: self.repo_name.clone(),
        });
    }

    pub fn update(&mut self, action: Action) {
        let requests = self.repo_view.update(action);
        self.requests.extend(requests);
    }

    fn open_in_browser(&mut self) {
        let Some(repo) = self.repo_view.selected_repo() else {
            return;
        };
        let url = repo.url.clone();
        self.notice = Some(match open::that(&url) {
            Ok(()) => format!("Opened {}", url),
            Err(e) => {
                warn!("opening {}: {}", url, e);
                format!("Could not open browser: {}", e)
            }
        });
    }

    fn copy_clone_command(&mut self) {
        let Some(command) = self.clone_command() else {
            return;
        };
        let copied = arboard::Clipboard::new().and_then(|mut c| c.set_text(command.clone()));
        self.notice = Some(match copied {
            Ok(()) => format!("Copied: {}", command),
            Err(e) => {
                warn!("clipboard: {}", e);
                format!("Could not copy to clipboard: {}", e)
            }
        });
    }

    pub fn clone_command(&self) -> Option<String> {
        self.repo_view
            .selected_repo()
            .map(|repo| format!("git clone {}", repo.clone_url))
    }
}
