use chrono::{DateTime, Utc};
use std::fmt;

/// A repository as returned by the forge. Replaced wholesale on every
/// selection, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryHandle {
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub clone_url: String,
}

impl RepositoryHandle {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Header metadata for whatever is currently selected
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectedItem {
    pub title: String,
    pub url: String,
    pub description: String,
}

impl From<&RepositoryHandle> for SelectedItem {
    fn from(repo: &RepositoryHandle) -> Self {
        Self {
            title: repo.full_name(),
            url: repo.url.clone(),
            description: repo.description.clone().unwrap_or_default(),
        }
    }
}

/// A resolved ref: symbolic name plus the commit it points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    pub target: String,
}

impl Reference {
    pub fn branch(branch: &str, target: impl Into<String>) -> Self {
        Self {
            name: format!("refs/heads/{}", branch),
            target: target.into(),
        }
    }

    /// Name without the `refs/heads/`, `refs/tags/` or `refs/remotes/` prefix
    pub fn short(&self) -> &str {
        ["refs/heads/", "refs/tags/", "refs/remotes/"]
            .iter()
            .find_map(|prefix| self.name.strip_prefix(prefix))
            .unwrap_or(&self.name)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Readme {
    pub content: String,
    pub path: String,
}

/// Git Commit (summary for list view)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub date: DateTime<Utc>,
}

impl Commit {
    pub fn short_sha(&self) -> &str {
        &self.sha[..7.min(self.sha.len())]
    }
}

/// Git Commit (full detail)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDetail {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub date: DateTime<Utc>,
    pub stats: CommitStats,
    pub files: Vec<CommitFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub additions: u64,
    pub deletions: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFile {
    pub filename: String,
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
    pub patch: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
    Symlink,
    Submodule,
}

impl EntryKind {
    /// Maps the `type` field shared by the GitHub and Gitea contents APIs
    pub fn from_api(kind: &str) -> Self {
        match kind {
            "dir" => EntryKind::Dir,
            "symlink" => EntryKind::Symlink,
            "submodule" => EntryKind::Submodule,
            _ => EntryKind::File,
        }
    }
}

/// One row of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub size: u64,
}

impl TreeEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total_count: Option<u64>,
}
