use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::ForgeConfig;
use crate::error::{ArborError, Result};

/// Try to run a CLI command and capture stdout as a token
fn try_cli_token(command: &str) -> Option<String> {
    let output = std::process::Command::new("sh")
        .args(["-c", command])
        .output()
        .ok()?;

    if output.status.success() {
        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !token.is_empty() {
            return Some(token);
        }
    }
    None
}

/// ~/.config/arbor/tokens
fn token_dir() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("arbor").join("tokens"))
}

fn load_stored_token(dir: &Path, forge_name: &str) -> Option<String> {
    let token = std::fs::read_to_string(dir.join(forge_name)).ok()?;
    let token = token.trim().to_string();
    (!token.is_empty()).then_some(token)
}

fn save_token(dir: &Path, forge_name: &str, token: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(forge_name), token)
}

/// Find a token for `forge`, trying in order:
/// 1. the forge's env var
/// 2. ~/.config/arbor/tokens/{forge name}
/// 3. the forge's `token_command`, whose output is then stored
pub fn load_token(forge: &ForgeConfig) -> Result<String> {
    load_token_from(forge, token_dir().as_deref())
}

fn load_token_from(forge: &ForgeConfig, dir: Option<&Path>) -> Result<String> {
    if let Some(env_var) = &forge.token_env {
        if let Ok(token) = std::env::var(env_var) {
            if !token.is_empty() {
                debug!(forge = %forge.name, env_var = %env_var, "token from environment");
                return Ok(token);
            }
        }
    }

    if let Some(token) = dir.and_then(|d| load_stored_token(d, &forge.name)) {
        debug!(forge = %forge.name, "stored token");
        return Ok(token);
    }

    if let Some(cmd) = &forge.token_command {
        if let Some(token) = try_cli_token(cmd) {
            if let Some(dir) = dir {
                if let Err(e) = save_token(dir, &forge.name, &token) {
                    warn!("could not store token for {}: {}", forge.name, e);
                }
            }
            return Ok(token);
        }
    }

    Err(ArborError::Auth(format!(
        "No token found for forge '{}'. Set {} or configure a token_command.",
        forge.name,
        forge.token_env.as_deref().unwrap_or("a token env var")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForgeType;

    fn forge(name: &str, env: Option<&str>, command: Option<&str>) -> ForgeConfig {
        ForgeConfig {
            name: name.to_string(),
            forge_type: ForgeType::Gitea,
            host: "git.example.org".to_string(),
            token_env: env.map(str::to_string),
            token_command: command.map(str::to_string),
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("arbor-auth-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn env_var_wins() {
        std::env::set_var("ARBOR_TEST_TOKEN_ENV_WINS", "from-env");
        let dir = scratch_dir("env");
        save_token(&dir, "env", "from-file").unwrap();

        let forge = forge("env", Some("ARBOR_TEST_TOKEN_ENV_WINS"), None);
        assert_eq!(load_token_from(&forge, Some(dir.as_path())).unwrap(), "from-env");
    }

    #[test]
    fn stored_token_is_trimmed() {
        let dir = scratch_dir("stored");
        save_token(&dir, "stored", "  abc123\n").unwrap();

        let forge = forge("stored", Some("ARBOR_TEST_TOKEN_UNSET"), None);
        assert_eq!(load_token_from(&forge, Some(dir.as_path())).unwrap(), "abc123");
    }

    #[test]
    fn command_output_is_stored() {
        let dir = scratch_dir("command");
        let forge = forge("command", None, Some("echo tok-from-cmd"));

        assert_eq!(load_token_from(&forge, Some(dir.as_path())).unwrap(), "tok-from-cmd");
        assert_eq!(
            load_stored_token(&dir, "command").as_deref(),
            Some("tok-from-cmd")
        );
    }

    #[test]
    fn nothing_found_is_auth_error() {
        let forge = forge("none", Some("ARBOR_TEST_TOKEN_UNSET"), Some("false"));
        let err = load_token_from(&forge, None).unwrap_err();
        assert!(matches!(err, ArborError::Auth(_)));
        assert!(err.to_string().contains("ARBOR_TEST_TOKEN_UNSET"));
    }
}
