use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;

use crate::error::{ArborError, Result};
use crate::forge::{decode_text, encode_path, find_readme, split_name, Forge, PAGE_SIZE};
use crate::types::{
    Commit, CommitDetail, CommitFile, CommitStats, EntryKind, PagedResult, Readme, Reference,
    RepositoryHandle, TreeEntry,
};

pub struct Gitea {
    client: Client,
    host: String,
    token: String,
}

impl std::fmt::Debug for Gitea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gitea")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl Gitea {
    pub fn new(host: String, token: String) -> Self {
        Self {
            client: Client::new(),
            host,
            token,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("https://{}/api/v1{}", self.host, path)
    }

    fn repo_url(&self, repo: &RepositoryHandle, path: &str) -> String {
        self.api_url(&format!("/repos/{}/{}{}", repo.owner, repo.name, path))
    }

    async fn get(&self, url: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("token {}", self.token))
            .send()
            .await
            .map_err(|e| ArborError::Api(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ArborError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ArborError::Api(format!("Gitea API {}: {}", status, text)));
        }
        Ok(response)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.get(url)
            .await?
            .json()
            .await
            .map_err(|e| ArborError::Api(e.to_string()))
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let bytes = self
            .get(url)
            .await?
            .bytes()
            .await
            .map_err(|e| ArborError::Api(e.to_string()))?;
        Ok(decode_text(&bytes))
    }

    async fn default_branch(&self, repo: &RepositoryHandle) -> Result<String> {
        let info: GtRepo = self.get_json(&self.repo_url(repo, "")).await?;
        info.default_branch
            .filter(|b| !b.is_empty())
            .ok_or_else(|| {
                ArborError::ResolutionFailed(format!("{} has no default branch", repo.full_name()))
            })
    }

    async fn contents(
        &self,
        repo: &RepositoryHandle,
        path: &str,
        reference: Option<&str>,
    ) -> Result<Vec<TreeEntry>> {
        let path = encode_path(path);
        let mut url = if path.is_empty() {
            self.repo_url(repo, "/contents")
        } else {
            self.repo_url(repo, &format!("/contents/{}", path))
        };
        if let Some(r) = reference {
            url.push_str(&format!("?ref={}", urlencoding::encode(r)));
        }
        let items: Vec<GtContent> = self.get_json(&url).await?;
        Ok(items.into_iter().map(TreeEntry::from).collect())
    }
}

// Gitea API response types

#[derive(Deserialize)]
struct GtRepo {
    owner: Option<GtUser>,
    name: String,
    description: Option<String>,
    html_url: Option<String>,
    clone_url: Option<String>,
    default_branch: Option<String>,
}

#[derive(Deserialize)]
struct GtUser {
    login: String,
}

#[derive(Deserialize)]
struct GtBranch {
    name: String,
    commit: GtBranchCommit,
}

#[derive(Deserialize)]
struct GtBranchCommit {
    id: String,
}

#[derive(Deserialize)]
struct GtContent {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    size: Option<u64>,
}

impl From<GtContent> for TreeEntry {
    fn from(c: GtContent) -> Self {
        TreeEntry {
            name: c.name,
            path: c.path,
            kind: EntryKind::from_api(&c.kind),
            size: c.size.unwrap_or(0),
        }
    }
}

#[derive(Deserialize)]
struct GtCommit {
    sha: Option<String>,
    commit: Option<GtCommitInner>,
    stats: Option<GtCommitStats>,
    files: Option<Vec<GtCommitFile>>,
}

#[derive(Deserialize)]
struct GtCommitInner {
    message: Option<String>,
    author: Option<GtCommitAuthor>,
}

#[derive(Deserialize)]
struct GtCommitAuthor {
    name: Option<String>,
    date: Option<String>,
}

#[derive(Deserialize)]
struct GtCommitStats {
    additions: Option<u64>,
    deletions: Option<u64>,
    total: Option<u64>,
}

#[derive(Deserialize)]
struct GtCommitFile {
    filename: Option<String>,
    status: Option<String>,
    additions: Option<u64>,
    deletions: Option<u64>,
}

impl GtCommit {
    fn author(&self) -> Option<&GtCommitAuthor> {
        self.commit.as_ref().and_then(|i| i.author.as_ref())
    }

    fn author_name(&self) -> String {
        self.author()
            .and_then(|a| a.name.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn date(&self) -> chrono::DateTime<chrono::Utc> {
        self.author()
            .and_then(|a| a.date.as_deref())
            .map(parse_datetime)
            .unwrap_or_else(chrono::Utc::now)
    }

    fn message(&self) -> &str {
        self.commit
            .as_ref()
            .and_then(|i| i.message.as_deref())
            .unwrap_or("")
    }
}

fn parse_datetime(s: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}

/// Split a unified diff into per-file patches, keyed by the new path
fn split_diff(diff: &str) -> HashMap<String, String> {
    let mut patches = HashMap::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in diff.lines() {
        if let Some(header) = line.strip_prefix("diff --git ") {
            if let Some((name, body)) = current.take() {
                patches.insert(name, body.join("\n"));
            }
            let name = header
                .rsplit_once(" b/")
                .map(|(_, b)| b.to_string())
                .unwrap_or_else(|| header.to_string());
            current = Some((name, Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            // Only hunks go into the patch, like the GitHub API returns them
            if line.starts_with("@@") || !body.is_empty() {
                body.push(line);
            }
        }
    }
    if let Some((name, body)) = current {
        patches.insert(name, body.join("\n"));
    }
    patches
}

#[async_trait]
impl Forge for Gitea {
    fn name(&self) -> &str {
        "Gitea"
    }

    async fn resolve(&self, name: &str) -> Result<RepositoryHandle> {
        let (owner, repo) = split_name(name).ok_or_else(|| ArborError::NotFound(name.to_string()))?;
        let url = self.api_url(&format!("/repos/{}/{}", owner, repo));
        let info: GtRepo = self.get_json(&url).await.map_err(|e| match e {
            ArborError::NotFound(_) => ArborError::NotFound(name.to_string()),
            other => other,
        })?;

        let web = info
            .html_url
            .unwrap_or_else(|| format!("https://{}/{}/{}", self.host, owner, repo));
        Ok(RepositoryHandle {
            owner: info
                .owner
                .map(|o| o.login)
                .unwrap_or_else(|| owner.to_string()),
            name: info.name,
            description: info.description.filter(|d| !d.is_empty()),
            clone_url: info.clone_url.unwrap_or_else(|| format!("{}.git", web)),
            url: web,
        })
    }

    async fn readme(&self, repo: &RepositoryHandle) -> Result<Readme> {
        let entries = match self.contents(repo, "", None).await {
            Ok(entries) => entries,
            // Empty repositories have no root tree yet
            Err(ArborError::NotFound(_)) => return Ok(Readme::default()),
            Err(e) => return Err(e),
        };
        let Some(entry) = find_readme(&entries) else {
            return Ok(Readme::default());
        };

        let content = self
            .get_text(&self.repo_url(repo, &format!("/raw/{}", encode_path(&entry.path))))
            .await?;
        Ok(Readme {
            content,
            path: entry.path.clone(),
        })
    }

    async fn head_reference(&self, repo: &RepositoryHandle) -> Result<Reference> {
        let branch = self.default_branch(repo).await?;
        let url = self.repo_url(repo, &format!("/branches/{}", urlencoding::encode(&branch)));
        let head: GtBranch = self.get_json(&url).await?;
        Ok(Reference::branch(&head.name, head.commit.id))
    }

    async fn list_commits(
        &self,
        repo: &RepositoryHandle,
        reference: &Reference,
        page: u32,
    ) -> Result<PagedResult<Commit>> {
        let url = self.repo_url(
            repo,
            &format!(
                "/commits?sha={}&limit={}&page={}&stat=false",
                urlencoding::encode(&reference.target),
                PAGE_SIZE,
                page
            ),
        );
        let response = self.get(&url).await?;
        let total = response
            .headers()
            .get("x-total-count")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let commits: Vec<GtCommit> = response
            .json()
            .await
            .map_err(|e| ArborError::Api(e.to_string()))?;

        let items = commits
            .iter()
            .map(|c| Commit {
                sha: c.sha.clone().unwrap_or_default(),
                message: c.message().lines().next().unwrap_or("").to_string(),
                author: c.author_name(),
                date: c.date(),
            })
            .collect();

        Ok(PagedResult {
            items,
            total_count: total,
        })
    }

    async fn get_commit(&self, repo: &RepositoryHandle, sha: &str) -> Result<CommitDetail> {
        let detail: GtCommit = self
            .get_json(&self.repo_url(repo, &format!("/git/commits/{}", sha)))
            .await?;
        let mut patches = match self
            .get_text(&self.repo_url(repo, &format!("/git/commits/{}.diff", sha)))
            .await
        {
            Ok(diff) => split_diff(&diff),
            Err(e) => {
                tracing::warn!("no diff for {}: {}", sha, e);
                HashMap::new()
            }
        };

        let stats = detail
            .stats
            .as_ref()
            .map(|s| CommitStats {
                additions: s.additions.unwrap_or(0),
                deletions: s.deletions.unwrap_or(0),
                total: s.total.unwrap_or(0),
            })
            .unwrap_or_default();

        let files = detail
            .files
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|f| {
                let filename = f.filename.clone()?;
                Some(CommitFile {
                    patch: patches.remove(&filename),
                    status: f.status.clone().unwrap_or_else(|| "modified".to_string()),
                    additions: f.additions.unwrap_or(0),
                    deletions: f.deletions.unwrap_or(0),
                    filename,
                })
            })
            .collect();

        Ok(CommitDetail {
            sha: detail.sha.clone().unwrap_or_else(|| sha.to_string()),
            message: detail.message().to_string(),
            author: detail.author_name(),
            date: detail.date(),
            stats,
            files,
        })
    }

    async fn list_tree(
        &self,
        repo: &RepositoryHandle,
        reference: &Reference,
        path: &str,
    ) -> Result<Vec<TreeEntry>> {
        self.contents(repo, path, Some(&reference.target)).await
    }

    async fn read_blob(
        &self,
        repo: &RepositoryHandle,
        reference: &Reference,
        path: &str,
    ) -> Result<String> {
        let url = self.repo_url(
            repo,
            &format!(
                "/raw/{}?ref={}",
                encode_path(path),
                urlencoding::encode(&reference.target)
            ),
        );
        self.get_text(&url).await
    }
}
