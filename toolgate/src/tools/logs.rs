//! Log tail tool over the configured file set

use super::{optional_u64, require_str};
use crate::error::{Error, Result};
use serde_json::{json, Value};
use std::path::PathBuf;

const DEFAULT_LINES: u64 = 100;

pub(super) fn tail(log_files: &[PathBuf], args: &Value) -> Result<Value> {
    let file = require_str(args, "file")?;
    let lines = optional_u64(args, "lines").unwrap_or(DEFAULT_LINES) as usize;

    // The schema enum already restricts the value, but the file must still
    // be re-checked against configuration before any read
    let path = log_files
        .iter()
        .find(|p| p.display().to_string() == file)
        .ok_or_else(|| Error::LogNotAllowed(file.to_string()))?;

    let content = std::fs::read_to_string(path)?;
    let all: Vec<&str> = content.lines().collect();
    let start = all.len().saturating_sub(lines);

    Ok(json!({
        "file": file,
        "lines": all[start..].to_vec(),
        "lineCount": all.len() - start,
        "totalLines": all.len(),
    }))
}
