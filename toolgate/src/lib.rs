//! # Toolgate
//!
//! A sandboxed tool-execution gateway for AI agents.
//!
//! Toolgate exposes a catalog of named tools (read-only database queries,
//! jailed filesystem access, allow-listed remote commands, relevance-ranked
//! knowledge search, external API proxies) through a single JSON-RPC 2.0
//! endpoint:
//! - **Dispatcher** ([`gateway`]) parses and authenticates requests, routes
//!   methods, and wraps every outcome in a uniform result envelope.
//! - **Registry** ([`registry`]) validates arguments against per-tool schemas
//!   and bounds each call by its declared timeout.
//! - **Sandbox** ([`sandbox`]) jails filesystem paths, allow-lists commands
//!   and read-only SQL verbs.
//! - **Search** ([`search`]) expands queries through a synonym map, scores
//!   candidates over weighted signals, and caches results in two tiers.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use toolgate::{build_registry, AnalyticsRecorder, Caller, Config, Dispatcher,
//!     SearchEngine, Store, TieredCache, ToolExecutor};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = Config::from_env()?;
//! let store = Arc::new(Store::open(&config.db_path)?);
//! let cache = TieredCache::new(config.cache_dir.clone(), Duration::from_secs(config.cache_ttl_secs));
//! let search = SearchEngine::new(store.clone(), cache, config.search_min_relevance);
//!
//! let dispatcher = Dispatcher::new(
//!     build_registry(&config)?,
//!     ToolExecutor::new(&config, store.clone(), search)?,
//!     AnalyticsRecorder::new(store),
//!     config.api_key.clone(),
//! );
//!
//! let caller = Caller::new("10.0.0.1", "curl/8.0");
//! let reply = dispatcher
//!     .handle(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#, None, &caller)
//!     .await;
//! ```

pub mod analytics;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod sandbox;
pub mod search;
pub mod store;
pub mod tools;

// Re-exports for convenience
pub use analytics::AnalyticsRecorder;
pub use cache::TieredCache;
pub use config::Config;
pub use error::{Error, Result};
pub use gateway::{Caller, Dispatcher, JsonRpcResponse, ToolCallResult};
pub use registry::{build_registry, ToolRegistry};
pub use search::{SearchEngine, SearchFilters};
pub use store::Store;
pub use tools::ToolExecutor;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default database path
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("toolgate")
        .join("gateway.sqlite")
}

/// Default directory for the durable search-cache tier
pub fn default_cache_dir() -> std::path::PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("toolgate")
        .join("search")
}

/// Hex-encoded SHA-256 digest of the input bytes
pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        // sha256 of the empty string
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_hex_distinct_inputs() {
        assert_ne!(sha256_hex(b"refund"), sha256_hex(b"reimbursement"));
        assert_eq!(sha256_hex(b"refund").len(), 64);
    }

    #[test]
    fn test_default_paths_end_under_toolgate() {
        assert!(default_db_path().to_string_lossy().contains("toolgate"));
        assert!(default_cache_dir().to_string_lossy().contains("toolgate"));
    }
}
