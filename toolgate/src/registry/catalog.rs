//! Built-in tool catalog

use super::{ParamField, ParamSchema, SafetyPolicy, ToolKind, ToolRegistry, ToolSpec};
use crate::config::Config;
use crate::error::Result;
use crate::search::{DEFAULT_LIMIT, MAX_LIMIT};
use serde_json::json;

/// Build the full tool registry from the gateway configuration.
///
/// `logs.tail` is only registered when log files are configured, since its
/// file parameter is an enum over the configured paths.
pub fn build_registry(config: &Config) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    registry.register(ToolSpec {
        name: "db.query_readonly".to_string(),
        description: "Run a read-only SQL statement against the gateway database. Only select, show, describe and explain statements are accepted.".to_string(),
        category: "database".to_string(),
        params: ParamSchema::new(vec![
            ParamField::string("sql", "SQL statement to execute")
                .required()
                .length(3, 10_000),
            ParamField::integer("maxRows", "Maximum rows to return", 1, 500)
                .with_default(json!(100)),
        ]),
        policy: SafetyPolicy {
            timeout_seconds: 10,
            rate_limit_per_minute: 30,
        },
        kind: ToolKind::DbQuery,
    })?;

    registry.register(ToolSpec {
        name: "db.stats".to_string(),
        description: "Row counts per table, schema version and database file size.".to_string(),
        category: "database".to_string(),
        params: ParamSchema::empty(),
        policy: SafetyPolicy {
            timeout_seconds: 5,
            rate_limit_per_minute: 60,
        },
        kind: ToolKind::DbStats,
    })?;

    registry.register(ToolSpec {
        name: "db.explain".to_string(),
        description: "Show the query plan for a read-only SQL statement without executing it fully.".to_string(),
        category: "database".to_string(),
        params: ParamSchema::new(vec![ParamField::string("sql", "SQL statement to explain")
            .required()
            .length(3, 10_000)]),
        policy: SafetyPolicy {
            timeout_seconds: 10,
            rate_limit_per_minute: 30,
        },
        kind: ToolKind::DbExplain,
    })?;

    registry.register(ToolSpec {
        name: "fs.list".to_string(),
        description: "List directory entries under the sandboxed root, optionally recursive and filtered by glob pattern.".to_string(),
        category: "filesystem".to_string(),
        params: ParamSchema::new(vec![
            ParamField::string("path", "Directory path relative to the sandbox root")
                .required()
                .length(1, 500),
            ParamField::string("pattern", "Glob pattern applied to entry names").length(1, 200),
            ParamField::boolean("recursive", "Descend into subdirectories")
                .with_default(json!(false)),
            ParamField::integer("maxEntries", "Maximum entries to return", 1, 1000)
                .with_default(json!(200)),
        ]),
        policy: SafetyPolicy {
            timeout_seconds: 10,
            rate_limit_per_minute: 120,
        },
        kind: ToolKind::FsList,
    })?;

    registry.register(ToolSpec {
        name: "fs.read".to_string(),
        description: "Read a file under the sandboxed root, up to a byte limit.".to_string(),
        category: "filesystem".to_string(),
        params: ParamSchema::new(vec![
            ParamField::string("path", "File path relative to the sandbox root")
                .required()
                .length(1, 500),
            ParamField::integer("maxBytes", "Maximum bytes to return", 1, 1_000_000)
                .with_default(json!(65_536)),
        ]),
        policy: SafetyPolicy {
            timeout_seconds: 10,
            rate_limit_per_minute: 120,
        },
        kind: ToolKind::FsRead,
    })?;

    registry.register(ToolSpec {
        name: "fs.write".to_string(),
        description: "Write or append to a file under the sandboxed root, subject to the configured size ceiling.".to_string(),
        category: "filesystem".to_string(),
        params: ParamSchema::new(vec![
            ParamField::string("path", "File path relative to the sandbox root")
                .required()
                .length(1, 500),
            ParamField::string("content", "Content to write").required().length(0, 1_000_000),
            ParamField::boolean("append", "Append instead of overwrite")
                .with_default(json!(false)),
        ]),
        policy: SafetyPolicy {
            timeout_seconds: 10,
            rate_limit_per_minute: 30,
        },
        kind: ToolKind::FsWrite,
    })?;

    registry.register(ToolSpec {
        name: "fs.info".to_string(),
        description: "Metadata for a path under the sandboxed root: size, kind, mime type and modification time.".to_string(),
        category: "filesystem".to_string(),
        params: ParamSchema::new(vec![ParamField::string(
            "path",
            "Path relative to the sandbox root",
        )
        .required()
        .length(1, 500)]),
        policy: SafetyPolicy {
            timeout_seconds: 5,
            rate_limit_per_minute: 120,
        },
        kind: ToolKind::FsInfo,
    })?;

    registry.register(ToolSpec {
        name: "ssh.exec_allowlist".to_string(),
        description: "Run one of the allow-listed commands on the configured host, capturing stdout and stderr.".to_string(),
        category: "remote".to_string(),
        params: ParamSchema::new(vec![ParamField::string("command", "Command to execute")
            .required()
            .length(1, 500)]),
        policy: SafetyPolicy {
            timeout_seconds: 20,
            rate_limit_per_minute: 10,
        },
        kind: ToolKind::SshExec,
    })?;

    registry.register(ToolSpec {
        name: "system.health".to_string(),
        description: "Gateway health snapshot: version, uptime, database size and cache entry counts.".to_string(),
        category: "system".to_string(),
        params: ParamSchema::empty(),
        policy: SafetyPolicy {
            timeout_seconds: 5,
            rate_limit_per_minute: 60,
        },
        kind: ToolKind::SystemHealth,
    })?;

    if !config.log_files.is_empty() {
        let files: Vec<String> = config
            .log_files
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        let file_refs: Vec<&str> = files.iter().map(|s| s.as_str()).collect();

        registry.register(ToolSpec {
            name: "logs.tail".to_string(),
            description: "Tail one of the configured log files.".to_string(),
            category: "system".to_string(),
            params: ParamSchema::new(vec![
                ParamField::enumeration("file", "Log file to tail", &file_refs).required(),
                ParamField::integer("lines", "Number of trailing lines", 1, 1000)
                    .with_default(json!(100)),
            ]),
            policy: SafetyPolicy {
                timeout_seconds: 5,
                rate_limit_per_minute: 30,
            },
            kind: ToolKind::LogsTail,
        })?;
    }

    registry.register(ToolSpec {
        name: "knowledge.search".to_string(),
        description: "Search indexed knowledge content with synonym expansion and weighted relevance ranking.".to_string(),
        category: "search".to_string(),
        params: ParamSchema::new(vec![
            ParamField::string("query", "Search query").required().length(2, 200),
            ParamField::string("collection", "Restrict to one collection").length(1, 100),
            ParamField::string("category", "Restrict to one category").length(1, 100),
            ParamField::string("fileType", "Restrict to one file type").length(1, 20),
            ParamField::integer("limit", "Maximum results", 1, MAX_LIMIT as i64)
                .with_default(json!(DEFAULT_LIMIT)),
        ]),
        policy: SafetyPolicy {
            timeout_seconds: 10,
            rate_limit_per_minute: 60,
        },
        kind: ToolKind::KnowledgeSearch,
    })?;

    registry.register(ToolSpec {
        name: "find_code".to_string(),
        description: "Search indexed code content, optionally narrowed to one language.".to_string(),
        category: "search".to_string(),
        params: ParamSchema::new(vec![
            ParamField::string("query", "Search query").required().length(2, 200),
            ParamField::string("language", "File extension to restrict to, e.g. rs or py")
                .length(1, 30),
            ParamField::integer("limit", "Maximum results", 1, MAX_LIMIT as i64)
                .with_default(json!(DEFAULT_LIMIT)),
        ]),
        policy: SafetyPolicy {
            timeout_seconds: 10,
            rate_limit_per_minute: 60,
        },
        kind: ToolKind::FindCode,
    })?;

    registry.register(ToolSpec {
        name: "github.repo_info".to_string(),
        description: "Fetch repository metadata from the GitHub API.".to_string(),
        category: "external".to_string(),
        params: ParamSchema::new(vec![
            ParamField::string("owner", "Repository owner").required().length(1, 100),
            ParamField::string("repo", "Repository name").required().length(1, 100),
        ]),
        policy: SafetyPolicy {
            timeout_seconds: 15,
            rate_limit_per_minute: 30,
        },
        kind: ToolKind::GithubRepo,
    })?;

    registry.register(ToolSpec {
        name: "github.issues_list".to_string(),
        description: "List issues for a repository from the GitHub API.".to_string(),
        category: "external".to_string(),
        params: ParamSchema::new(vec![
            ParamField::string("owner", "Repository owner").required().length(1, 100),
            ParamField::string("repo", "Repository name").required().length(1, 100),
            ParamField::enumeration("state", "Issue state filter", &["open", "closed", "all"])
                .with_default(json!("open")),
            ParamField::integer("limit", "Maximum issues to return", 1, 100)
                .with_default(json!(20)),
        ]),
        policy: SafetyPolicy {
            timeout_seconds: 15,
            rate_limit_per_minute: 30,
        },
        kind: ToolKind::GithubIssues,
    })?;

    Ok(registry)
}
