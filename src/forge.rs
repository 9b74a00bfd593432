use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Commit, CommitDetail, PagedResult, Readme, Reference, RepositoryHandle, TreeEntry};

/// Commits requested per page of the log
pub const PAGE_SIZE: u32 = 50;

/// Where repository content comes from. Every call is scoped to one
/// repository and, apart from `resolve`, `readme` and `get_commit`, to one
/// resolved reference.
#[async_trait]
pub trait Forge: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Look up `owner/repo`. Unknown repositories yield `ArborError::NotFound`.
    async fn resolve(&self, name: &str) -> Result<RepositoryHandle>;

    /// The repository's readme on its default branch. A repository without
    /// one yields an empty `Readme` rather than an error.
    async fn readme(&self, repo: &RepositoryHandle) -> Result<Readme>;

    async fn head_reference(&self, repo: &RepositoryHandle) -> Result<Reference>;

    async fn list_commits(
        &self,
        repo: &RepositoryHandle,
        reference: &Reference,
        page: u32,
    ) -> Result<PagedResult<Commit>>;

    async fn get_commit(&self, repo: &RepositoryHandle, sha: &str) -> Result<CommitDetail>;

    /// Entries of the directory at `path` ("" is the root)
    async fn list_tree(
        &self,
        repo: &RepositoryHandle,
        reference: &Reference,
        path: &str,
    ) -> Result<Vec<TreeEntry>>;

    async fn read_blob(
        &self,
        repo: &RepositoryHandle,
        reference: &Reference,
        path: &str,
    ) -> Result<String>;
}

const README_NAMES: [&str; 5] = ["readme.md", "readme.markdown", "readme.rst", "readme.txt", "readme"];

/// Pick the readme out of a root listing, preferring markdown
pub fn find_readme(entries: &[TreeEntry]) -> Option<&TreeEntry> {
    README_NAMES.iter().find_map(|wanted| {
        entries
            .iter()
            .find(|e| !e.is_dir() && e.name.eq_ignore_ascii_case(wanted))
    })
}

/// Turn raw blob bytes into displayable text
pub fn decode_text(bytes: &[u8]) -> String {
    if bytes.contains(&0) {
        return format!("Binary file ({} bytes) not shown.", bytes.len());
    }
    String::from_utf8_lossy(bytes).into_owned()
}

/// Percent-encode each segment of a repository path, keeping the slashes
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::encode(s).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Split `owner/repo` into its two halves
pub fn split_name(name: &str) -> Option<(&str, &str)> {
    let (owner, repo) = name.trim().split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner, repo))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryKind;

    fn entry(name: &str, kind: EntryKind) -> TreeEntry {
        TreeEntry {
            name: name.to_string(),
            path: name.to_string(),
            kind,
            size: 1,
        }
    }

    #[test]
    fn find_readme_prefers_markdown() {
        let entries = vec![
            entry("README", EntryKind::File),
            entry("src", EntryKind::Dir),
            entry("Readme.md", EntryKind::File),
        ];
        assert_eq!(find_readme(&entries).unwrap().name, "Readme.md");
    }

    #[test]
    fn find_readme_skips_directories() {
        let entries = vec![entry("readme", EntryKind::Dir)];
        assert!(find_readme(&entries).is_none());
    }

    #[test]
    fn decode_text_flags_binary() {
        assert_eq!(decode_text(b"hello"), "hello");
        assert_eq!(decode_text(&[0x89, 0, 1]), "Binary file (3 bytes) not shown.");
    }

    #[test]
    fn encode_path_keeps_separators() {
        assert_eq!(encode_path("docs/my file.md"), "docs/my%20file.md");
        assert_eq!(encode_path(""), "");
        assert_eq!(encode_path("/src/"), "src");
    }

    #[test]
    fn split_name_requires_owner_and_repo() {
        assert_eq!(split_name("acme/demo"), Some(("acme", "demo")));
        assert_eq!(split_name("demo"), None);
        assert_eq!(split_name("/demo"), None);
        assert_eq!(split_name("a/b/c"), None);
    }
}
