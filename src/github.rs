use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use octocrab::Octocrab;
use serde_json::Value;

use crate::error::{ArborError, Result};
use crate::forge::{decode_text, encode_path, split_name, Forge, PAGE_SIZE};
use crate::types::{
    Commit, CommitDetail, CommitFile, CommitStats, EntryKind, PagedResult, Readme, Reference,
    RepositoryHandle, TreeEntry,
};

pub struct GitHub {
    client: Octocrab,
}

impl std::fmt::Debug for GitHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHub").finish_non_exhaustive()
    }
}

impl From<octocrab::Error> for ArborError {
    fn from(err: octocrab::Error) -> Self {
        ArborError::Api(err.to_string())
    }
}

impl GitHub {
    pub fn new(token: String) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(|e| ArborError::Auth(e.to_string()))?;

        Ok(Self { client })
    }

    async fn get_json(&self, route: &str, reference: Option<&Reference>) -> Result<Value> {
        let response: std::result::Result<Value, octocrab::Error> = match reference {
            Some(r) => {
                self.client
                    .get(route, Some(&[("ref", r.target.as_str())]))
                    .await
            }
            None => self.client.get(route, None::<&()>).await,
        };
        response.map_err(|e| {
            if is_not_found(&e) {
                ArborError::NotFound(route.to_string())
            } else {
                e.into()
            }
        })
    }
}

fn is_not_found(err: &octocrab::Error) -> bool {
    matches!(err, octocrab::Error::GitHub { source, .. } if source.message == "Not Found")
}

fn contents_route(repo: &RepositoryHandle, path: &str) -> String {
    let path = encode_path(path);
    if path.is_empty() {
        format!("/repos/{}/{}/contents", repo.owner, repo.name)
    } else {
        format!("/repos/{}/{}/contents/{}", repo.owner, repo.name, path)
    }
}

/// Nested string lookup, e.g. `str_at(v, &["commit", "author", "name"])`
fn str_at<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(|v| v.as_str())
}

fn u64_at(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(|v| v.as_u64()).unwrap_or(0)
}

/// Decode the base64 `content` field of a contents API object
fn decode_content(body: &Value) -> Result<String> {
    if str_at(body, &["encoding"]) == Some("none") {
        return Ok("File too large to display.".to_string());
    }
    let encoded: String = str_at(body, &["content"])
        .unwrap_or("")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| ArborError::Api(format!("invalid base64 content: {}", e)))?;
    Ok(decode_text(&bytes))
}

#[async_trait]
impl Forge for GitHub {
    fn name(&self) -> &str {
        "GitHub"
    }

    async fn resolve(&self, name: &str) -> Result<RepositoryHandle> {
        let (owner, repo) = split_name(name).ok_or_else(|| ArborError::NotFound(name.to_string()))?;
        let repository = self.client.repos(owner, repo).get().await.map_err(|e| {
            if is_not_found(&e) {
                ArborError::NotFound(name.to_string())
            } else {
                ArborError::from(e)
            }
        })?;

        let url = repository
            .html_url
            .map(|u| u.to_string())
            .unwrap_or_else(|| format!("https://github.com/{}/{}", owner, repo));
        let clone_url = repository
            .clone_url
            .map(|u| u.to_string())
            .unwrap_or_else(|| format!("{}.git", url));

        Ok(RepositoryHandle {
            owner: repository
                .owner
                .map(|o| o.login)
                .unwrap_or_else(|| owner.to_string()),
            name: repository.name,
            description: repository.description.filter(|d| !d.is_empty()),
            url,
            clone_url,
        })
    }

    async fn readme(&self, repo: &RepositoryHandle) -> Result<Readme> {
        let route = format!("/repos/{}/{}/readme", repo.owner, repo.name);
        match self.get_json(&route, None).await {
            Ok(body) => Ok(Readme {
                content: decode_content(&body)?,
                path: str_at(&body, &["path"]).unwrap_or("README.md").to_string(),
            }),
            Err(ArborError::NotFound(_)) => Ok(Readme::default()),
            Err(e) => Err(e),
        }
    }

    async fn head_reference(&self, repo: &RepositoryHandle) -> Result<Reference> {
        let repository = self.client.repos(&repo.owner, &repo.name).get().await?;
        let branch = repository.default_branch.ok_or_else(|| {
            ArborError::ResolutionFailed(format!("{} has no default branch", repo.full_name()))
        })?;

        let route = format!(
            "/repos/{}/{}/branches/{}",
            repo.owner,
            repo.name,
            urlencoding::encode(&branch)
        );
        let body = self.get_json(&route, None).await?;
        let sha = str_at(&body, &["commit", "sha"]).ok_or_else(|| {
            ArborError::ResolutionFailed(format!("branch {} has no head commit", branch))
        })?;

        Ok(Reference::branch(&branch, sha))
    }

    async fn list_commits(
        &self,
        repo: &RepositoryHandle,
        reference: &Reference,
        page: u32,
    ) -> Result<PagedResult<Commit>> {
        let commits = self
            .client
            .repos(&repo.owner, &repo.name)
            .list_commits()
            .sha(reference.target.clone())
            .per_page(PAGE_SIZE as u8)
            .page(page)
            .send()
            .await?;

        // The commits endpoint has no count; it is only known once the last page lands
        let total = commits.total_count;

        let items = commits
            .items
            .into_iter()
            .map(|c| {
                let message = c.commit.message.lines().next().unwrap_or("").to_string();
                let author = c
                    .author
                    .map(|a| a.login)
                    .or_else(|| c.commit.author.as_ref().map(|a| a.name.clone()))
                    .unwrap_or_else(|| "unknown".to_string());
                let date = c
                    .commit
                    .author
                    .and_then(|a| a.date)
                    .unwrap_or_else(chrono::Utc::now);

                Commit {
                    sha: c.sha,
                    message,
                    author,
                    date,
                }
            })
            .collect();

        Ok(PagedResult {
            items,
            total_count: total,
        })
    }

    async fn get_commit(&self, repo: &RepositoryHandle, sha: &str) -> Result<CommitDetail> {
        let route = format!("/repos/{}/{}/commits/{}", repo.owner, repo.name, sha);
        let response = self.get_json(&route, None).await?;

        let author = str_at(&response, &["author", "login"])
            .or_else(|| str_at(&response, &["commit", "author", "name"]))
            .unwrap_or("unknown")
            .to_string();

        let date = str_at(&response, &["commit", "author", "date"])
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(chrono::Utc::now);

        let stats = response
            .get("stats")
            .map(|s| CommitStats {
                additions: u64_at(s, "additions"),
                deletions: u64_at(s, "deletions"),
                total: u64_at(s, "total"),
            })
            .unwrap_or_default();

        let files = response
            .get("files")
            .and_then(|f| f.as_array())
            .map(|files| {
                files
                    .iter()
                    .filter_map(|f| {
                        Some(CommitFile {
                            filename: str_at(f, &["filename"])?.to_string(),
                            status: str_at(f, &["status"])?.to_string(),
                            additions: u64_at(f, "additions"),
                            deletions: u64_at(f, "deletions"),
                            patch: str_at(f, &["patch"]).map(str::to_string),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(CommitDetail {
            sha: sha.to_string(),
            message: str_at(&response, &["commit", "message"])
                .unwrap_or("")
                .to_string(),
            author,
            date,
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
        let body = self
            .get_json(&contents_route(repo, path), Some(reference))
            .await?;
        let items = body
            .as_array()
            .ok_or_else(|| ArborError::Api(format!("{} is not a directory", path)))?;

        Ok(items
            .iter()
            .filter_map(|item| {
                Some(TreeEntry {
                    name: str_at(item, &["name"])?.to_string(),
                    path: str_at(item, &["path"])?.to_string(),
                    kind: EntryKind::from_api(str_at(item, &["type"])?),
                    size: u64_at(item, "size"),
                })
            })
            .collect())
    }

    async fn read_blob(
        &self,
        repo: &RepositoryHandle,
        reference: &Reference,
        path: &str,
    ) -> Result<String> {
        let body = self
            .get_json(&contents_route(repo, path), Some(reference))
            .await?;
        decode_content(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handle() -> RepositoryHandle {
        RepositoryHandle {
            owner: "acme".to_string(),
            name: "demo".to_string(),
            description: None,
            url: String::new(),
            clone_url: String::new(),
        }
    }

    #[test]
    fn contents_route_root_and_nested() {
        assert_eq!(contents_route(&handle(), ""), "/repos/acme/demo/contents");
        assert_eq!(
            contents_route(&handle(), "src/main file.rs"),
            "/repos/acme/demo/contents/src/main%20file.rs"
        );
    }

    #[test]
    fn decode_content_ignores_line_breaks() {
        // "# Demo\n" split across lines the way the API wraps it
        let body = json!({ "encoding": "base64", "content": "IyBE\nZW1vCg==\n" });
        assert_eq!(decode_content(&body).unwrap(), "# Demo\n");
    }

    #[test]
    fn decode_content_large_file() {
        let body = json!({ "encoding": "none", "content": "" });
        assert_eq!(decode_content(&body).unwrap(), "File too large to display.");
    }

    #[test]
    fn str_at_walks_nested_objects() {
        let body = json!({ "commit": { "author": { "name": "Ada" } } });
        assert_eq!(str_at(&body, &["commit", "author", "name"]), Some("Ada"));
        assert_eq!(str_at(&body, &["commit", "committer", "name"]), None);
    }
}
