//! Error types for the gateway

use thiserror::Error;

/// Gateway error type
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Outbound HTTP request failed before yielding a response
    #[error("Upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream service answered with a non-success status
    #[error("Upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Argument failed schema validation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No tool registered under this name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Resolved path falls outside the jail root
    #[error("Path '{0}' is outside the allowed root")]
    PathEscape(String),

    /// Command is not an exact allow-list entry
    #[error("Command not allowed: '{command}'")]
    CommandNotAllowed { command: String, allowed: Vec<String> },

    /// Remote execution is switched off by configuration
    #[error("Remote command execution is disabled")]
    ExecDisabled,

    /// Read-only statement access is switched off by configuration
    #[error("Read-only database access is disabled")]
    ReadOnlySqlDisabled,

    /// Statement does not start with an allowed read verb
    #[error("Statement verb '{0}' is not allowed for read-only access")]
    StatementRejected(String),

    /// Requested log file is not on the allow-list
    #[error("Log file not allowed: {0}")]
    LogNotAllowed(String),

    /// Write payload exceeds the configured ceiling
    #[error("Payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Handler exceeded its declared timeout
    #[error("Tool timed out after {0}s")]
    Timeout(u64),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP-style status code carried in the tool result envelope.
    pub fn status(&self) -> u16 {
        match self {
            Error::InvalidArgument(_) => 400,
            Error::UnknownTool(_) => 404,
            Error::PathEscape(_)
            | Error::CommandNotAllowed { .. }
            | Error::ExecDisabled
            | Error::ReadOnlySqlDisabled
            | Error::StatementRejected(_)
            | Error::LogNotAllowed(_) => 403,
            Error::PayloadTooLarge { .. } => 413,
            Error::Database(_) | Error::Http(_) | Error::Upstream { .. } => 502,
            Error::Timeout(_) => 504,
            Error::Io(err) if err.kind() == std::io::ErrorKind::NotFound => 404,
            _ => 500,
        }
    }

    /// Structured fields merged into the failure envelope alongside `error`.
    pub fn extra(&self) -> Option<serde_json::Value> {
        match self {
            Error::CommandNotAllowed { allowed, .. } => {
                Some(serde_json::json!({ "allowedCommands": allowed }))
            }
            Error::PayloadTooLarge { size, limit } => {
                Some(serde_json::json!({ "sizeBytes": size, "limitBytes": limit }))
            }
            Error::Upstream { status, .. } => {
                Some(serde_json::json!({ "upstreamStatus": status }))
            }
            Error::Timeout(seconds) => Some(serde_json::json!({ "timeoutSeconds": seconds })),
            _ => None,
        }
    }
}

impl From<glob::PatternError> for Error {
    fn from(err: glob::PatternError) -> Self {
        Error::InvalidArgument(format!("Invalid glob pattern: {}", err))
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        match err.io_error() {
            Some(_) => Error::Io(err.into()),
            None => Error::Other(err.to_string()),
        }
    }
}
