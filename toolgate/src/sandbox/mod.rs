//! Security sandbox: the three guards every privileged tool goes through.
//!
//! Each guard is independent and pure over its input plus configuration:
//! [`PathJail`] confines filesystem access to a root directory,
//! [`CommandPolicy`] gates remote execution behind an exact-match allow-list,
//! and [`StatementPolicy`] restricts database statements to read verbs.

mod exec;

pub use exec::{CommandRunner, ExecResult};

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Filesystem jail rooted at a canonical directory.
///
/// All file tools resolve caller paths through this type; nothing else in the
/// crate touches caller-supplied paths directly.
#[derive(Debug, Clone)]
pub struct PathJail {
    root: PathBuf,
    max_write_bytes: usize,
}

impl PathJail {
    /// Create a jail over an existing directory.
    pub fn new(root: &Path, max_write_bytes: usize) -> Result<Self> {
        let root = root.canonicalize()?;
        Ok(Self {
            root,
            max_write_bytes,
        })
    }

    /// Canonical jail root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Byte ceiling for write payloads.
    pub fn max_write_bytes(&self) -> usize {
        self.max_write_bytes
    }

    /// Resolve a caller path that must already exist.
    ///
    /// Canonicalizes the joined path, so symlinks pointing outside the root
    /// are caught as escapes.
    pub fn resolve_existing(&self, relative: &str) -> Result<PathBuf> {
        let target = self.lexical_join(relative)?;
        let canonical = target.canonicalize()?;
        if !canonical.starts_with(&self.root) {
            return Err(Error::PathEscape(relative.to_string()));
        }
        Ok(canonical)
    }

    /// Resolve a caller path for a write, where the target may not exist yet.
    ///
    /// An existing target (including a symlink, which a write would follow)
    /// is canonicalized and checked like a read target; otherwise the nearest
    /// existing ancestor is canonicalized and checked instead.
    pub fn resolve_for_write(&self, relative: &str) -> Result<PathBuf> {
        let target = self.lexical_join(relative)?;
        if target.symlink_metadata().is_ok() {
            let canonical = target.canonicalize()?;
            if !canonical.starts_with(&self.root) {
                return Err(Error::PathEscape(relative.to_string()));
            }
            return Ok(canonical);
        }
        let mut ancestor = target.parent();
        while let Some(dir) = ancestor {
            if dir.exists() {
                let canonical = dir.canonicalize()?;
                if !canonical.starts_with(&self.root) {
                    return Err(Error::PathEscape(relative.to_string()));
                }
                break;
            }
            ancestor = dir.parent();
        }
        Ok(target)
    }

    /// Reject payloads over the configured ceiling before any IO happens.
    pub fn ensure_write_size(&self, bytes: usize) -> Result<()> {
        if bytes > self.max_write_bytes {
            return Err(Error::PayloadTooLarge {
                size: bytes,
                limit: self.max_write_bytes,
            });
        }
        Ok(())
    }

    /// Join a relative path onto the root, folding `.` and `..` without
    /// touching the filesystem. Absolute paths and traversal past the root
    /// are escapes.
    fn lexical_join(&self, relative: &str) -> Result<PathBuf> {
        let supplied = Path::new(relative);
        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in supplied.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(Error::PathEscape(relative.to_string()));
                    }
                    resolved.pop();
                    depth -= 1;
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::PathEscape(relative.to_string()));
                }
            }
        }
        Ok(resolved)
    }
}

/// Exact-match allow-list for remote command execution.
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    enabled: bool,
    allowed: Vec<String>,
}

impl CommandPolicy {
    pub fn new(enabled: bool, allowed: Vec<String>) -> Self {
        Self { enabled, allowed }
    }

    /// Allow-listed commands, echoed back on rejection.
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// Authorize a command string. No partial matches, no argument
    /// substitution: the string must equal one allow-list entry.
    pub fn authorize(&self, command: &str) -> Result<()> {
        if !self.enabled {
            return Err(Error::ExecDisabled);
        }
        if self.allowed.iter().any(|entry| entry == command) {
            Ok(())
        } else {
            Err(Error::CommandNotAllowed {
                command: command.to_string(),
                allowed: self.allowed.clone(),
            })
        }
    }
}

/// Read verbs accepted by [`StatementPolicy`].
pub const ALLOWED_STATEMENT_VERBS: [&str; 4] = ["select", "show", "describe", "explain"];

/// Leading-verb allow-list for read-only database statements.
#[derive(Debug, Clone)]
pub struct StatementPolicy {
    enabled: bool,
}

impl StatementPolicy {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Check a statement before it reaches the connection.
    ///
    /// `WITH` is deliberately not accepted: CTEs can prefix writes.
    pub fn check(&self, sql: &str) -> Result<()> {
        if !self.enabled {
            return Err(Error::ReadOnlySqlDisabled);
        }
        let verb = sql
            .trim_start()
            .trim_start_matches('(')
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        if verb.is_empty() {
            return Err(Error::StatementRejected("(empty)".to_string()));
        }
        if ALLOWED_STATEMENT_VERBS.contains(&verb.as_str()) {
            Ok(())
        } else {
            Err(Error::StatementRejected(verb))
        }
    }
}
