use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{ArborError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForgeType {
    GitHub,
    Gitea,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForgeConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub forge_type: ForgeType,
    pub host: String,
    pub token_env: Option<String>,
    pub token_command: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GeneralConfig {
    pub default_forge: Option<String>,
}

/// Row counts of the chrome around the repository body.
///
/// A "frame" is the border/padding below (header, tabs) or around (body)
/// a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub header_height: u16,
    pub header_frame: u16,
    pub tabs_height: u16,
    pub tabs_frame: u16,
    pub status_bar_height: u16,
    pub body_frame: u16,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            header_height: 2,
            header_frame: 1,
            tabs_height: 1,
            tabs_frame: 1,
            status_bar_height: 1,
            body_frame: 0,
        }
    }
}

impl LayoutConfig {
    /// Everything on screen that is not the body of the active view.
    /// Both resizing and rendering go through here.
    pub fn chrome_height(&self) -> u16 {
        self.body_frame
            .saturating_add(self.header_height)
            .saturating_add(self.header_frame)
            .saturating_add(self.status_bar_height)
            .saturating_add(self.tabs_height)
            .saturating_add(self.tabs_frame)
    }

    pub fn body_height(&self, total: u16) -> u16 {
        total.saturating_sub(self.chrome_height())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub forges: Vec<ForgeConfig>,
    #[serde(default)]
    pub layout: LayoutConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            forges: vec![ForgeConfig {
                name: "github".to_string(),
                forge_type: ForgeType::GitHub,
                host: "github.com".to_string(),
                token_env: Some("GITHUB_TOKEN".to_string()),
                token_command: Some("gh auth token".to_string()),
            }],
            layout: LayoutConfig::default(),
        }
    }
}

fn config_path() -> Option<PathBuf> {
    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("arbor").join("config.toml"))
}

impl Config {
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            return Config::default();
        };

        let Ok(content) = std::fs::read_to_string(&path) else {
            return Config::default();
        };

        match Config::parse(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("ignoring {}: {}", path.display(), e);
                Config::default()
            }
        }
    }

    fn parse(content: &str) -> Result<Self> {
        let mut config =
            toml::from_str::<Config>(content).map_err(|e| ArborError::Config(e.to_string()))?;
        if config.forges.is_empty() {
            config.forges = Config::default().forges;
        }
        Ok(config)
    }

    /// Pick the forge by explicit name, then by the origin remote's host,
    /// then `default_forge`, then whatever is listed first.
    pub fn select_forge(&self, name: Option<&str>, remote: Option<&str>) -> Result<&ForgeConfig> {
        if let Some(name) = name {
            return self
                .forges
                .iter()
                .find(|f| f.name == name)
                .ok_or_else(|| ArborError::Config(format!("no forge named '{}'", name)));
        }

        let by_remote = remote
            .and_then(extract_host)
            .and_then(|host| self.forges.iter().find(|f| f.host == host));
        let by_default = self
            .general
            .default_forge
            .as_deref()
            .and_then(|name| self.forges.iter().find(|f| f.name == name));

        by_remote
            .or(by_default)
            .or_else(|| self.forges.first())
            .ok_or_else(|| ArborError::Config("no forges configured".to_string()))
    }
}

/// URL of the current checkout's `origin` remote, if there is one
pub fn origin_url() -> Option<String> {
    let output = std::process::Command::new("git")
        .args(["remote", "get-url", "origin"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!url.is_empty()).then_some(url)
}

/// Extract hostname from SSH (git@host:...) or HTTPS (https://host/...) URLs
fn extract_host(url: &str) -> Option<String> {
    if let Some(rest) = url.strip_prefix("git@") {
        // SSH: git@host:owner/repo.git
        let host = rest.split(':').next()?;
        Some(host.to_string())
    } else if url.starts_with("https://") || url.starts_with("http://") {
        // HTTPS: https://host/owner/repo.git
        let without_scheme = url.split("://").nth(1)?;
        let host = without_scheme.split('/').next()?;
        Some(host.to_string())
    } else if url.starts_with("ssh://") {
        // SSH: ssh://git@host/owner/repo.git
        let without_scheme = url.split("://").nth(1)?;
        let after_at = without_scheme.split('@').next_back()?;
        let host = after_at.split('/').next()?;
        // Strip port if present
        let host = host.split(':').next()?;
        Some(host.to_string())
    } else {
        None
    }
}

/// Extract `owner/repo` from the same URL shapes `extract_host` accepts
pub fn extract_repo_path(url: &str) -> Option<String> {
    let path = if let Some(rest) = url.strip_prefix("git@") {
        rest.split_once(':')?.1
    } else if url.starts_with("https://") || url.starts_with("http://") || url.starts_with("ssh://")
    {
        let without_scheme = url.split("://").nth(1)?;
        without_scheme.split_once('/')?.1
    } else {
        return None;
    };

    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let mut parts = path.rsplitn(2, '/');
    let repo = parts.next().filter(|s| !s.is_empty())?;
    let owner = parts.next().filter(|s| !s.is_empty())?;
    Some(format!("{}/{}", owner, repo))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_config() {
        let toml_str = r#"
[general]
default_forge = "github"

[[forges]]
name = "github"
type = "github"
host = "github.com"
token_env = "GITHUB_TOKEN"
token_command = "gh auth token"

[[forges]]
name = "home"
type = "gitea"
host = "git.example.org"
token_env = "GITEA_TOKEN"
"#;
        let config = Config::parse(toml_str).unwrap();
        assert_eq!(config.forges.len(), 2);
        assert_eq!(config.forges[0].forge_type, ForgeType::GitHub);
        assert_eq!(config.forges[1].forge_type, ForgeType::Gitea);
        assert_eq!(config.forges[1].host, "git.example.org");
        assert_eq!(config.layout, LayoutConfig::default());
    }

    #[test]
    fn parse_partial_layout_keeps_other_defaults() {
        let config = Config::parse("[layout]\nbody_frame = 2\nheader_frame = 0\n").unwrap();
        assert_eq!(config.layout.body_frame, 2);
        assert_eq!(config.layout.header_frame, 0);
        assert_eq!(config.layout.header_height, 2);
        assert_eq!(config.forges[0].forge_type, ForgeType::GitHub);
    }

    #[test]
    fn parse_rejects_unknown_forge_type() {
        let toml_str = r#"
[[forges]]
name = "lab"
type = "gitlab"
host = "gitlab.com"
"#;
        assert!(matches!(
            Config::parse(toml_str),
            Err(ArborError::Config(_))
        ));
    }

    #[test]
    fn chrome_height_sums_every_term() {
        let layout = LayoutConfig {
            header_height: 2,
            header_frame: 1,
            tabs_height: 1,
            tabs_frame: 1,
            status_bar_height: 1,
            body_frame: 2,
        };
        assert_eq!(layout.chrome_height(), 8);
        assert_eq!(layout.body_height(30), 22);
    }

    #[test]
    fn body_height_saturates() {
        let layout = LayoutConfig::default();
        assert_eq!(layout.body_height(3), 0);
        assert_eq!(layout.body_height(0), 0);
    }

    #[test]
    fn extract_host_ssh() {
        assert_eq!(
            extract_host("git@github.com:owner/repo.git"),
            Some("github.com".to_string())
        );
    }

    #[test]
    fn extract_host_https() {
        assert_eq!(
            extract_host("https://github.com/owner/repo.git"),
            Some("github.com".to_string())
        );
    }

    #[test]
    fn extract_host_ssh_scheme_with_port() {
        assert_eq!(
            extract_host("ssh://git@gitea.local:2222/owner/repo.git"),
            Some("gitea.local".to_string())
        );
    }

    #[test]
    fn extract_host_invalid() {
        assert_eq!(extract_host("not-a-url"), None);
    }

    #[test]
    fn extract_repo_path_variants() {
        assert_eq!(
            extract_repo_path("git@github.com:acme/demo.git"),
            Some("acme/demo".to_string())
        );
        assert_eq!(
            extract_repo_path("https://github.com/acme/demo"),
            Some("acme/demo".to_string())
        );
        assert_eq!(
            extract_repo_path("ssh://git@gitea.local:2222/acme/demo.git"),
            Some("acme/demo".to_string())
        );
        assert_eq!(extract_repo_path("https://github.com/acme"), None);
        assert_eq!(extract_repo_path("not-a-url"), None);
    }

    fn two_forges() -> Config {
        Config {
            general: GeneralConfig {
                default_forge: Some("home".to_string()),
            },
            forges: vec![
                ForgeConfig {
                    name: "github".to_string(),
                    forge_type: ForgeType::GitHub,
                    host: "github.com".to_string(),
                    token_env: None,
                    token_command: None,
                },
                ForgeConfig {
                    name: "home".to_string(),
                    forge_type: ForgeType::Gitea,
                    host: "git.example.org".to_string(),
                    token_env: None,
                    token_command: None,
                },
            ],
            layout: LayoutConfig::default(),
        }
    }

    #[test]
    fn select_forge_prefers_explicit_name() {
        let config = two_forges();
        let forge = config
            .select_forge(Some("github"), Some("git@git.example.org:a/b.git"))
            .unwrap();
        assert_eq!(forge.name, "github");
        assert!(config.select_forge(Some("missing"), None).is_err());
    }

    #[test]
    fn select_forge_matches_remote_then_default() {
        let config = two_forges();
        let by_remote = config
            .select_forge(None, Some("git@github.com:acme/demo.git"))
            .unwrap();
        assert_eq!(by_remote.name, "github");

        let by_default = config.select_forge(None, None).unwrap();
        assert_eq!(by_default.name, "home");
    }
}
