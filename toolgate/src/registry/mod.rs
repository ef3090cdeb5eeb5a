//! Declarative tool registry: schemas, categories and safety policies

mod catalog;
mod params;

pub use catalog::build_registry;
pub use params::{ParamField, ParamKind, ParamSchema};

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::{json, Value};

/// Declared execution limits for one tool.
///
/// The timeout is enforced by the dispatcher; the rate limit is published
/// to callers so client schedulers can pace themselves.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyPolicy {
    pub timeout_seconds: u64,
    pub rate_limit_per_minute: u32,
}

/// Which handler executes a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    DbQuery,
    DbStats,
    DbExplain,
    FsList,
    FsRead,
    FsWrite,
    FsInfo,
    SshExec,
    SystemHealth,
    LogsTail,
    KnowledgeSearch,
    FindCode,
    GithubRepo,
    GithubIssues,
}

/// One registered tool
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub category: String,
    pub params: ParamSchema,
    pub policy: SafetyPolicy,
    pub kind: ToolKind,
}

impl ToolSpec {
    /// Catalog entry as published by tools/list
    pub fn catalog_entry(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "category": self.category,
            "parameterSchema": self.params.to_json_schema(),
            "safetyPolicy": self.policy,
        })
    }
}

/// Registry of all tools exposed by the gateway
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool; duplicate names are a wiring error
    pub fn register(&mut self, spec: ToolSpec) -> Result<()> {
        if self.tools.iter().any(|t| t.name == spec.name) {
            return Err(Error::Config(format!(
                "Duplicate tool registration: {}",
                spec.name
            )));
        }
        self.tools.push(spec);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Catalog entries in registration order
    pub fn catalog(&self) -> Vec<Value> {
        self.tools.iter().map(|t| t.catalog_entry()).collect()
    }
}
