use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::action::{Action, FilesMsg, LogMsg, Request};
use crate::error::ArborError;
use crate::forge::Forge;

/// Runs requests on the tokio runtime and feeds each result back into the
/// action channel.
pub struct Worker {
    forge: Arc<dyn Forge>,
    action_tx: mpsc::UnboundedSender<Action>,
}

impl Worker {
    pub fn new(forge: Arc<dyn Forge>, action_tx: mpsc::UnboundedSender<Action>) -> Self {
        Self { forge, action_tx }
    }

    pub fn submit(&self, request: Request) {
        debug!(forge = self.forge.name(), ?request, "dispatching");
        let tx = self.action_tx.clone();
        let forge = Arc::clone(&self.forge);
        tokio::spawn(async move {
            let action = execute(forge.as_ref(), request).await;
            tx.send(action).ok();
        });
    }

    pub fn submit_all(&self, requests: Vec<Request>) {
        for request in requests {
            self.submit(request);
        }
    }
}

/// Perform one request. Failures come back as display-only actions.
pub async fn execute(forge: &dyn Forge, request: Request) -> Action {
    match request {
        Request::ResolveRepository { name } => match forge.resolve(&name).await {
            Ok(repo) => Action::SelectRepository(repo),
            Err(e) => {
                warn!("resolving {}: {}", name, e);
                let e = match e {
                    ArborError::NotFound(_) => ArborError::NotFound(name),
                    other => other,
                };
                Action::Error(e.to_string())
            }
        },
        Request::FetchReadme(ticket) => match forge.readme(&ticket.repo).await {
            Ok(readme) => Action::ReadmeLoaded {
                generation: ticket.generation,
                readme,
            },
            Err(e) => {
                warn!("readme for {}: {}", ticket.repo.full_name(), e);
                Action::ReadmeFailed {
                    generation: ticket.generation,
                    error: ArborError::content("readme", e).to_string(),
                }
            }
        },
        Request::ResolveReference(ticket) => match forge.head_reference(&ticket.repo).await {
            Ok(reference) => Action::ReferenceResolved {
                generation: ticket.generation,
                reference,
            },
            Err(e) => {
                warn!("HEAD of {}: {}", ticket.repo.full_name(), e);
                let e = match e {
                    ArborError::ResolutionFailed(_) => e,
                    other => ArborError::ResolutionFailed(other.to_string()),
                };
                Action::ReferenceFailed {
                    generation: ticket.generation,
                    error: e.to_string(),
                }
            }
        },
        Request::FetchCommits {
            ticket,
            reference,
            page,
        } => {
            let msg = match forge.list_commits(&ticket.repo, &reference, page).await {
                Ok(result) => LogMsg::PageLoaded { page, result },
                Err(e) => LogMsg::PageFailed {
                    page,
                    error: ArborError::content("commits", e).to_string(),
                },
            };
            Action::Log {
                generation: ticket.generation,
                msg,
            }
        }
        Request::FetchCommit { ticket, sha } => {
            let msg = match forge.get_commit(&ticket.repo, &sha).await {
                Ok(detail) => LogMsg::DetailLoaded(Box::new(detail)),
                Err(e) => LogMsg::DetailFailed {
                    error: ArborError::content(format!("commit {}", sha), e).to_string(),
                    sha,
                },
            };
            Action::Log {
                generation: ticket.generation,
                msg,
            }
        }
        Request::ListTree {
            ticket,
            reference,
            path,
        } => {
            let msg = match forge.list_tree(&ticket.repo, &reference, &path).await {
                Ok(entries) => FilesMsg::Listing { path, entries },
                Err(e) => FilesMsg::Failed {
                    error: ArborError::content(display_path(&path), e).to_string(),
                    path,
                },
            };
            Action::Files {
                generation: ticket.generation,
                msg,
            }
        }
        Request::ReadBlob {
            ticket,
            reference,
            path,
        } => {
            let msg = match forge.read_blob(&ticket.repo, &reference, &path).await {
                Ok(content) => FilesMsg::Blob { path, content },
                Err(e) => FilesMsg::Failed {
                    error: ArborError::content(display_path(&path), e).to_string(),
                    path,
                },
            };
            Action::Files {
                generation: ticket.generation,
                msg,
            }
        }
    }
}

fn display_path(path: &str) -> String {
    format!("/{}", path)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::action::Ticket;
    use crate::error::Result;
    use crate::types::{
        Commit, CommitDetail, CommitStats, EntryKind, PagedResult, Readme, Reference,
        RepositoryHandle, TreeEntry,
    };

    /// In-memory forge holding a single repository
    #[derive(Debug, Default)]
    pub(crate) struct MemoryForge {
        pub repo: Option<RepositoryHandle>,
        pub readme: Readme,
        pub head: Option<Reference>,
        pub commits: Vec<Commit>,
        pub trees: HashMap<String, Vec<TreeEntry>>,
        pub blobs: HashMap<String, String>,
    }

    #[async_trait]
    impl Forge for MemoryForge {
        fn name(&self) -> &str {
            "memory"
        }

        async fn resolve(&self, name: &str) -> Result<RepositoryHandle> {
            self.repo
                .clone()
                .filter(|r| r.full_name() == name)
                .ok_or_else(|| ArborError::NotFound(name.to_string()))
        }

        async fn readme(&self, _repo: &RepositoryHandle) -> Result<Readme> {
            Ok(self.readme.clone())
        }

        async fn head_reference(&self, _repo: &RepositoryHandle) -> Result<Reference> {
            self.head
                .clone()
                .ok_or_else(|| ArborError::Api("empty repository".to_string()))
        }

        async fn list_commits(
            &self,
            _repo: &RepositoryHandle,
            _reference: &Reference,
            page: u32,
        ) -> Result<PagedResult<Commit>> {
            let size = crate::forge::PAGE_SIZE as usize;
            let start = (page.saturating_sub(1) as usize) * size;
            Ok(PagedResult {
                items: self.commits.iter().skip(start).take(size).cloned().collect(),
                total_count: Some(self.commits.len() as u64),
            })
        }

        async fn get_commit(&self, _repo: &RepositoryHandle, sha: &str) -> Result<CommitDetail> {
            let commit = self
                .commits
                .iter()
                .find(|c| c.sha == sha)
                .ok_or_else(|| ArborError::NotFound(sha.to_string()))?;
            Ok(CommitDetail {
                sha: commit.sha.clone(),
                message: commit.message.clone(),
                author: commit.author.clone(),
                date: commit.date,
                stats: CommitStats::default(),
                files: Vec::new(),
            })
        }

        async fn list_tree(
            &self,
            _repo: &RepositoryHandle,
            _reference: &Reference,
            path: &str,
        ) -> Result<Vec<TreeEntry>> {
            self.trees
                .get(path)
                .cloned()
                .ok_or_else(|| ArborError::NotFound(path.to_string()))
        }

        async fn read_blob(
            &self,
            _repo: &RepositoryHandle,
            _reference: &Reference,
            path: &str,
        ) -> Result<String> {
            self.blobs
                .get(path)
                .cloned()
                .ok_or_else(|| ArborError::NotFound(path.to_string()))
        }
    }

    fn demo_repo() -> RepositoryHandle {
        RepositoryHandle {
            owner: "acme".to_string(),
            name: "demo".to_string(),
            description: Some("A demo".to_string()),
            url: "https://example.org/acme/demo".to_string(),
            clone_url: "https://example.org/acme/demo.git".to_string(),
        }
    }

    fn demo_forge() -> MemoryForge {
        let mut trees = HashMap::new();
        trees.insert(
            String::new(),
            vec![TreeEntry {
                name: "README.md".to_string(),
                path: "README.md".to_string(),
                kind: EntryKind::File,
                size: 7,
            }],
        );
        let mut blobs = HashMap::new();
        blobs.insert("README.md".to_string(), "# Demo\n".to_string());

        MemoryForge {
            repo: Some(demo_repo()),
            readme: Readme {
                content: "# Demo\n".to_string(),
                path: "README.md".to_string(),
            },
            head: Some(Reference::branch("main", "abc123")),
            commits: (0..3)
                .map(|i| Commit {
                    sha: format!("{:07x}", i),
                    message: format!("commit {}", i),
                    author: "ada".to_string(),
                    date: Utc::now(),
                })
                .collect(),
            trees,
            blobs,
        }
    }

    fn ticket(generation: u64) -> Ticket {
        Ticket {
            generation,
            repo: demo_repo(),
        }
    }

    #[tokio::test]
    async fn resolve_found_selects_repository() {
        let forge = demo_forge();
        let action = execute(
            &forge,
            Request::ResolveRepository {
                name: "acme/demo".to_string(),
            },
        )
        .await;
        assert_eq!(action, Action::SelectRepository(demo_repo()));
    }

    #[tokio::test]
    async fn resolve_missing_is_not_found_error() {
        let forge = demo_forge();
        let action = execute(
            &forge,
            Request::ResolveRepository {
                name: "acme/gone".to_string(),
            },
        )
        .await;
        assert_eq!(
            action,
            Action::Error("Not found: acme/gone".to_string())
        );
    }

    #[tokio::test]
    async fn results_echo_the_ticket_generation() {
        let forge = demo_forge();

        let readme = execute(&forge, Request::FetchReadme(ticket(7))).await;
        assert!(matches!(readme, Action::ReadmeLoaded { generation: 7, .. }));

        let reference = execute(&forge, Request::ResolveReference(ticket(9))).await;
        assert_eq!(
            reference,
            Action::ReferenceResolved {
                generation: 9,
                reference: Reference::branch("main", "abc123"),
            }
        );

        let log = execute(
            &forge,
            Request::FetchCommits {
                ticket: ticket(4),
                reference: Reference::branch("main", "abc123"),
                page: 1,
            },
        )
        .await;
        match log {
            Action::Log {
                generation: 4,
                msg: LogMsg::PageLoaded { page: 1, result },
            } => {
                assert_eq!(result.items.len(), 3);
                assert_eq!(result.total_count, Some(3));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn reference_failure_is_resolution_failed() {
        let forge = MemoryForge {
            head: None,
            ..demo_forge()
        };
        let action = execute(&forge, Request::ResolveReference(ticket(2))).await;
        assert_eq!(
            action,
            Action::ReferenceFailed {
                generation: 2,
                error: "Could not resolve reference: API error: empty repository".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn missing_blob_is_reported_for_its_path() {
        let forge = demo_forge();
        let action = execute(
            &forge,
            Request::ReadBlob {
                ticket: ticket(1),
                reference: Reference::branch("main", "abc123"),
                path: "src/lib.rs".to_string(),
            },
        )
        .await;
        assert_eq!(
            action,
            Action::Files {
                generation: 1,
                msg: FilesMsg::Failed {
                    path: "src/lib.rs".to_string(),
                    error: "Failed to load /src/lib.rs: Not found: src/lib.rs"
                        .to_string(),
                },
            }
        );
    }

    #[tokio::test]
    async fn worker_delivers_results_over_the_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let worker = Worker::new(Arc::new(demo_forge()), tx);
        worker.submit_all(vec![
            Request::FetchReadme(ticket(1)),
            Request::ListTree {
                ticket: ticket(1),
                reference: Reference::branch("main", "abc123"),
                path: String::new(),
            },
        ]);

        let mut readme = false;
        let mut listing = false;
        for _ in 0..2 {
            match rx.recv().await {
                Some(Action::ReadmeLoaded { .. }) => readme = true,
                Some(Action::Files {
                    msg: FilesMsg::Listing { .. },
                    ..
                }) => listing = true,
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(readme && listing);
    }
}
