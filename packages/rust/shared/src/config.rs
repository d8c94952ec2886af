//! Application configuration for contentpub.
//!
//! Server config lives at `~/.contentpub/contentpub.toml` unless a path is
//! given explicitly. The file never holds secrets: it names the environment
//! variables that do, and the runtime settings below read them at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PublishError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "contentpub.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".contentpub";

/// Shortest session lifetime the login endpoint will issue.
pub const MIN_SESSION_TTL_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Config structs (matching contentpub.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote content store (GitHub contents API).
    #[serde(default)]
    pub github: GitHubConfig,

    /// Repository layout.
    #[serde(default)]
    pub content: ContentConfig,

    /// Caller authentication and login.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Value echoed in `Access-Control-Allow-Origin`.
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_origin: default_allowed_origin(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".into()
}
fn default_allowed_origin() -> String {
    "*".into()
}

/// `[github]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Target repository as `owner/repo`.
    #[serde(default)]
    pub repo: String,

    /// Branch every commit lands on.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// API root, overridable for GitHub Enterprise or tests.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Env var holding a write token directly.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Env var holding the name of a Secrets Manager secret with the token.
    #[serde(default = "default_token_secret_name_env")]
    pub token_secret_name_env: String,

    /// Per-request timeout for store calls.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            repo: String::new(),
            branch: default_branch(),
            api_base: default_api_base(),
            token_env: default_token_env(),
            token_secret_name_env: default_token_secret_name_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_branch() -> String {
    "main".into()
}
fn default_api_base() -> String {
    "https://api.github.com".into()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_token_secret_name_env() -> String {
    "GITHUB_TOKEN_SECRET_NAME".into()
}
fn default_timeout_secs() -> u64 {
    10
}

/// `[content]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Repository directory holding one subdirectory per section.
    #[serde(default = "default_content_root")]
    pub root: String,

    /// URL prefix under which the site serves the content root.
    #[serde(default = "default_public_prefix")]
    pub public_prefix: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            root: default_content_root(),
            public_prefix: default_public_prefix(),
        }
    }
}

fn default_content_root() -> String {
    "public/content".into()
}
fn default_public_prefix() -> String {
    "content".into()
}

/// `[auth]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Env var holding the HMAC key for session tokens.
    #[serde(default = "default_session_secret_env")]
    pub session_secret_env: String,

    /// Env var holding the static integration secret.
    #[serde(default = "default_shared_secret_env")]
    pub shared_secret_env: String,

    /// Request header carrying the static secret.
    #[serde(default = "default_shared_secret_header")]
    pub shared_secret_header: String,

    /// Lifetime of issued session tokens.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Env var holding the wizard login name.
    #[serde(default = "default_login_username_env")]
    pub login_username_env: String,

    /// Env var holding the wizard login password.
    #[serde(default = "default_login_password_env")]
    pub login_password_env: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret_env: default_session_secret_env(),
            shared_secret_env: default_shared_secret_env(),
            shared_secret_header: default_shared_secret_header(),
            session_ttl_secs: default_session_ttl_secs(),
            login_username_env: default_login_username_env(),
            login_password_env: default_login_password_env(),
        }
    }
}

fn default_session_secret_env() -> String {
    "SESSION_SECRET".into()
}
fn default_shared_secret_env() -> String {
    "PUBLISHER_SHARED_SECRET".into()
}
fn default_shared_secret_header() -> String {
    "x-api-token".into()
}
fn default_session_ttl_secs() -> u64 {
    3600
}
fn default_login_username_env() -> String {
    "LOGIN_USERNAME".into()
}
fn default_login_password_env() -> String {
    "LOGIN_PASSWORD".into()
}

// ---------------------------------------------------------------------------
// Runtime settings (config file + environment)
// ---------------------------------------------------------------------------

/// Secrets the authenticator verifies callers against.
#[derive(Clone, Default)]
pub struct AuthSettings {
    pub session_secret: Option<String>,
    pub shared_secret: Option<String>,
    /// Lowercase header name carrying the static secret.
    pub shared_secret_header: String,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("session_secret", &self.session_secret.as_ref().map(|_| "<set>"))
            .field("shared_secret", &self.shared_secret.as_ref().map(|_| "<set>"))
            .field("shared_secret_header", &self.shared_secret_header)
            .finish()
    }
}

impl AuthSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            session_secret: env_secret(&config.auth.session_secret_env),
            shared_secret: env_secret(&config.auth.shared_secret_env),
            shared_secret_header: config.auth.shared_secret_header.to_ascii_lowercase(),
        }
    }
}

/// Credentials and signing key for session-token issuance.
#[derive(Clone, Default)]
pub struct LoginSettings {
    pub username: Option<String>,
    pub password: Option<String>,
    pub session_secret: Option<String>,
    pub ttl_secs: u64,
}

impl std::fmt::Debug for LoginSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginSettings")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<set>"))
            .field("session_secret", &self.session_secret.as_ref().map(|_| "<set>"))
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl LoginSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            username: env_secret(&config.auth.login_username_env),
            // Passwords are compared verbatim, surrounding whitespace included.
            password: std::env::var(&config.auth.login_password_env)
                .ok()
                .filter(|v| !v.is_empty()),
            session_secret: env_secret(&config.auth.session_secret_env),
            ttl_secs: config.auth.session_ttl_secs,
        }
    }

    /// Configured lifetime, floored at [`MIN_SESSION_TTL_SECS`].
    pub fn effective_ttl_secs(&self) -> u64 {
        self.ttl_secs.max(MIN_SESSION_TTL_SECS)
    }
}

/// Resolved connection details for the GitHub contents API.
#[derive(Debug, Clone)]
pub struct GitHubSettings {
    pub api_base: Url,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub timeout: Duration,
    /// Token read directly from the environment, if any.
    pub token: Option<String>,
    /// Secrets Manager secret to fetch the token from, if any.
    pub token_secret_name: Option<String>,
}

impl GitHubSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let gh = &config.github;
        let (owner, repo) = gh
            .repo
            .split_once('/')
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty())
            .ok_or_else(|| {
                PublishError::configuration("github.repo must be set to 'owner/repo'")
            })?;

        let api_base = Url::parse(&gh.api_base).map_err(|e| {
            PublishError::configuration(format!("invalid github.api_base '{}': {e}", gh.api_base))
        })?;

        Ok(Self {
            api_base,
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: gh.branch.clone(),
            timeout: Duration::from_secs(gh.timeout_secs),
            token: env_secret(&gh.token_env),
            token_secret_name: env_secret(&gh.token_secret_name_env),
        })
    }
}

/// Read an env var, trimmed, treating empty as unset.
pub fn env_secret(var_name: &str) -> Option<String> {
    std::env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.contentpub/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PublishError::configuration("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.contentpub/contentpub.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PublishError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        PublishError::configuration(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = config_dir()?.join(CONFIG_FILE_NAME);
    init_config_at(&path)?;
    Ok(path)
}

/// Write a default config file to `path`, creating parent directories.
pub fn init_config_at(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| PublishError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| PublishError::configuration(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| PublishError::io(path, e))?;
    tracing::info!(?path, "created default config file");
    Ok(())
}
