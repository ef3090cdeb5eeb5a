//! Environment-driven configuration.
//!
//! All settings live under the `TOOLGATE_` prefix and are resolved once at
//! startup; components receive the values they need by injection rather than
//! reading the environment themselves.

use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Gateway configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address for the HTTP server, e.g. `127.0.0.1:8085`.
    pub bind: String,
    /// SQLite database file backing content and analytics.
    pub db_path: PathBuf,
    /// Directory for the durable search-cache tier.
    pub cache_dir: PathBuf,
    /// Search cache TTL in seconds.
    pub cache_ttl_secs: u64,
    /// Jail root for all filesystem tools.
    pub fs_root: PathBuf,
    /// Byte ceiling for `fs.write` payloads.
    pub fs_max_write_bytes: usize,
    /// Remote execution settings.
    pub ssh: SshConfig,
    /// Gate for `db.query_readonly` and `db.explain`.
    pub sql_readonly_enabled: bool,
    /// Log files `logs.tail` may read.
    pub log_files: Vec<PathBuf>,
    /// Shared API key; `None` disables the bearer check.
    pub api_key: Option<String>,
    /// Results scoring below this are dropped from search output.
    pub search_min_relevance: f64,
    /// Timeout applied to the outbound HTTP client.
    pub http_timeout_secs: u64,
    /// GitHub proxy settings.
    pub github: GithubConfig,
}

/// Remote execution settings for `ssh.exec_allowlist`.
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub enabled: bool,
    /// Exact-match command allow-list (pipe-delimited in the environment).
    pub allowed_commands: Vec<String>,
    /// Remote host; unset means commands run locally, which tests rely on.
    pub host: Option<String>,
    pub user: Option<String>,
    pub key_path: Option<PathBuf>,
}

/// GitHub API proxy settings.
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub api_base: String,
    pub token: Option<String>,
}

const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const MAX_CACHE_TTL_SECS: u64 = 86_400;
const DEFAULT_MAX_WRITE_BYTES: usize = 200_000;

impl Config {
    /// Load configuration from the environment with defaults suitable for
    /// local development.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind: env_string("TOOLGATE_BIND", "127.0.0.1:8085"),
            db_path: env_path("TOOLGATE_DB_PATH")
                .unwrap_or_else(crate::default_db_path),
            cache_dir: env_path("TOOLGATE_CACHE_DIR")
                .unwrap_or_else(crate::default_cache_dir),
            cache_ttl_secs: env_parse("TOOLGATE_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?
                .clamp(1, MAX_CACHE_TTL_SECS),
            fs_root: env_path("TOOLGATE_FS_ROOT").unwrap_or_else(|| PathBuf::from(".")),
            fs_max_write_bytes: env_parse("TOOLGATE_FS_MAX_WRITE_BYTES", DEFAULT_MAX_WRITE_BYTES)?,
            ssh: SshConfig {
                enabled: env_bool("TOOLGATE_SSH_ENABLED", false)?,
                allowed_commands: parse_delimited(
                    &env::var("TOOLGATE_SSH_ALLOWED_COMMANDS").unwrap_or_default(),
                ),
                host: env_optional("TOOLGATE_SSH_HOST"),
                user: env_optional("TOOLGATE_SSH_USER"),
                key_path: env_path("TOOLGATE_SSH_KEY_PATH"),
            },
            sql_readonly_enabled: env_bool("TOOLGATE_SQL_READONLY_ENABLED", true)?,
            log_files: parse_delimited(&env::var("TOOLGATE_LOG_FILES").unwrap_or_default())
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            api_key: env_optional("TOOLGATE_API_KEY"),
            search_min_relevance: env_parse("TOOLGATE_SEARCH_MIN_RELEVANCE", 0.05_f64)?,
            http_timeout_secs: env_parse("TOOLGATE_HTTP_TIMEOUT_SECS", 30_u64)?,
            github: GithubConfig {
                api_base: env_string("TOOLGATE_GITHUB_API_BASE", "https://api.github.com"),
                token: env_optional("TOOLGATE_GITHUB_TOKEN"),
            },
        })
    }
}

fn env_string(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

fn env_optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_path(name: &str) -> Option<PathBuf> {
    env_optional(name).map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env_optional(name) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| Error::Config(format!("{} has an unparseable value '{}'", name, raw))),
        None => Ok(default),
    }
}

fn env_bool(name: &str, default: bool) -> Result<bool> {
    match env_optional(name) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::Config(format!(
                "{} must be a boolean, got '{}'",
                name, raw
            ))),
        },
    }
}

/// Split a pipe-delimited allow-list into trimmed, non-empty entries.
pub fn parse_delimited(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
