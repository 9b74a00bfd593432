use std::fmt;

use crossterm::event::{KeyEvent, MouseEvent};

use crate::types::{
    Commit, CommitDetail, PagedResult, Readme, Reference, RepositoryHandle, SelectedItem,
    TreeEntry,
};

/// Tabs of the repository view, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepoTab {
    #[default]
    Readme,
    Files,
    Commits,
    Branches,
    Tags,
}

impl RepoTab {
    pub const ALL: [RepoTab; 5] = [
        RepoTab::Readme,
        RepoTab::Files,
        RepoTab::Commits,
        RepoTab::Branches,
        RepoTab::Tags,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for RepoTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoTab::Readme => write!(f, "Readme"),
            RepoTab::Files => write!(f, "Files"),
            RepoTab::Commits => write!(f, "Commits"),
            RepoTab::Branches => write!(f, "Branches"),
            RepoTab::Tags => write!(f, "Tags"),
        }
    }
}

/// Identifies which selection a request was issued for. Results carry the
/// generation back so late answers for an earlier selection can be dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub generation: u64,
    pub repo: RepositoryHandle,
}

/// Work for the background worker. Each one completes as exactly one `Action`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ResolveRepository {
        name: String,
    },
    FetchReadme(Ticket),
    ResolveReference(Ticket),
    FetchCommits {
        ticket: Ticket,
        reference: Reference,
        page: u32,
    },
    FetchCommit {
        ticket: Ticket,
        sha: String,
    },
    ListTree {
        ticket: Ticket,
        reference: Reference,
        path: String,
    },
    ReadBlob {
        ticket: Ticket,
        reference: Reference,
        path: String,
    },
}

/// Results for the commit log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogMsg {
    PageLoaded {
        page: u32,
        result: PagedResult<Commit>,
    },
    PageFailed {
        page: u32,
        error: String,
    },
    DetailLoaded(Box<CommitDetail>),
    DetailFailed {
        sha: String,
        error: String,
    },
}

/// Results for the file browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilesMsg {
    Listing {
        path: String,
        entries: Vec<TreeEntry>,
    },
    Blob {
        path: String,
        content: String,
    },
    Failed {
        path: String,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    // Selection
    SelectItem(SelectedItem),
    SelectRepository(RepositoryHandle),

    // Reference resolution
    ReferenceResolved {
        generation: u64,
        reference: Reference,
    },
    ReferenceFailed {
        generation: u64,
        error: String,
    },

    // Readme
    ReadmeLoaded {
        generation: u64,
        readme: Readme,
    },
    ReadmeFailed {
        generation: u64,
        error: String,
    },

    // Per-view data
    Log {
        generation: u64,
        msg: LogMsg,
    },
    Files {
        generation: u64,
        msg: FilesMsg,
    },

    // Chrome and input
    TabChanged(RepoTab),
    Resize {
        width: u16,
        height: u16,
    },
    Key(KeyEvent),
    Mouse(MouseEvent),
    UpdateStatusBar,

    Error(String),
}
