//! Tool handlers behind the registry

mod db;
mod fs;
mod github;
mod logs;
mod search;
mod ssh;
mod system;

use crate::config::{Config, GithubConfig};
use crate::error::{Error, Result};
use crate::registry::{ToolKind, ToolSpec};
use crate::sandbox::{CommandPolicy, CommandRunner, PathJail, StatementPolicy};
use crate::search::SearchEngine;
use crate::store::Store;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Executes registered tools against the sandboxed resources
pub struct ToolExecutor {
    jail: PathJail,
    commands: CommandPolicy,
    statements: StatementPolicy,
    runner: CommandRunner,
    store: Arc<Store>,
    search: SearchEngine,
    http: reqwest::Client,
    github: GithubConfig,
    log_files: Vec<PathBuf>,
    started: Instant,
}

impl ToolExecutor {
    pub fn new(config: &Config, store: Arc<Store>, search: SearchEngine) -> Result<Self> {
        let jail = PathJail::new(&config.fs_root, config.fs_max_write_bytes)?;
        let commands = CommandPolicy::new(config.ssh.enabled, config.ssh.allowed_commands.clone());
        let statements = StatementPolicy::new(config.sql_readonly_enabled);
        let runner = CommandRunner::new(config.ssh.clone());
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .user_agent(concat!("toolgate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            jail,
            commands,
            statements,
            runner,
            store,
            search,
            http,
            github: config.github.clone(),
            log_files: config.log_files.clone(),
            started: Instant::now(),
        })
    }

    /// Run one tool. Arguments have already passed schema validation;
    /// handlers still re-check presence through the shared helpers.
    pub async fn execute(&self, spec: &ToolSpec, args: &Value) -> Result<Value> {
        match spec.kind {
            ToolKind::DbQuery => db::query_readonly(&self.store, &self.statements, args),
            ToolKind::DbStats => db::stats(&self.store),
            ToolKind::DbExplain => db::explain(&self.store, &self.statements, args),
            ToolKind::FsList => fs::list(&self.jail, args),
            ToolKind::FsRead => fs::read(&self.jail, args),
            ToolKind::FsWrite => fs::write(&self.jail, args),
            ToolKind::FsInfo => fs::info(&self.jail, args),
            ToolKind::SshExec => {
                ssh::exec(
                    &self.commands,
                    &self.runner,
                    args,
                    spec.policy.timeout_seconds,
                )
                .await
            }
            ToolKind::SystemHealth => system::health(&self.store, &self.search, self.started),
            ToolKind::LogsTail => logs::tail(&self.log_files, args),
            ToolKind::KnowledgeSearch => search::knowledge_search(&self.search, args),
            ToolKind::FindCode => search::find_code(&self.search, args),
            ToolKind::GithubRepo => github::repo_info(&self.http, &self.github, args).await,
            ToolKind::GithubIssues => github::issues_list(&self.http, &self.github, args).await,
        }
    }
}

pub(crate) fn require_str<'a>(args: &'a Value, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::InvalidArgument(format!("Missing '{}' parameter", name)))
}

pub(crate) fn optional_str<'a>(args: &'a Value, name: &str) -> Option<&'a str> {
    args.get(name).and_then(|v| v.as_str())
}

pub(crate) fn optional_u64(args: &Value, name: &str) -> Option<u64> {
    args.get(name).and_then(|v| v.as_u64())
}

pub(crate) fn optional_bool(args: &Value, name: &str) -> Option<bool> {
    args.get(name).and_then(|v| v.as_bool())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_require_str() {
        let args = json!({"path": "docs", "limit": 5});

        assert_eq!(require_str(&args, "path").unwrap(), "docs");

        let err = require_str(&args, "missing").unwrap_err();
        assert_eq!(err.status(), 400);

        // Wrong type reads as missing
        assert!(require_str(&args, "limit").is_err());
    }

    #[test]
    fn test_optional_helpers() {
        let args = json!({"recursive": true, "limit": 7, "pattern": "*.md"});

        assert_eq!(optional_bool(&args, "recursive"), Some(true));
        assert_eq!(optional_u64(&args, "limit"), Some(7));
        assert_eq!(optional_str(&args, "pattern"), Some("*.md"));
        assert_eq!(optional_str(&args, "nope"), None);
    }
}
