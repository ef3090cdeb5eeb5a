//! Filesystem tools, confined to the sandbox root

use super::{optional_bool, optional_str, optional_u64, require_str};
use crate::error::{Error, Result};
use crate::sandbox::PathJail;
use serde_json::{json, Value};
use std::io::Write as _;
use walkdir::WalkDir;

const DEFAULT_READ_BYTES: u64 = 65_536;
const DEFAULT_MAX_ENTRIES: u64 = 200;

pub(super) fn list(jail: &PathJail, args: &Value) -> Result<Value> {
    let path = require_str(args, "path")?;
    let pattern = optional_str(args, "pattern")
        .map(glob::Pattern::new)
        .transpose()?;
    let recursive = optional_bool(args, "recursive").unwrap_or(false);
    let max_entries = optional_u64(args, "maxEntries").unwrap_or(DEFAULT_MAX_ENTRIES) as usize;

    let dir = jail.resolve_existing(path)?;
    if !dir.is_dir() {
        return Err(Error::InvalidArgument(format!("Not a directory: {}", path)));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut entries: Vec<Value> = Vec::new();
    let mut truncated = false;

    for entry in WalkDir::new(&dir).min_depth(1).max_depth(max_depth) {
        let entry = entry?;

        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(pattern) = &pattern {
            if !pattern.matches(&name) {
                continue;
            }
        }

        if entries.len() >= max_entries {
            truncated = true;
            break;
        }

        let metadata = entry.metadata()?;
        let relative = entry
            .path()
            .strip_prefix(jail.root())
            .unwrap_or(entry.path())
            .to_string_lossy()
            .to_string();
        let modified: chrono::DateTime<chrono::Utc> = metadata.modified()?.into();

        entries.push(json!({
            "name": name,
            "path": relative,
            "kind": if metadata.is_dir() { "dir" } else { "file" },
            "sizeBytes": if metadata.is_dir() { Value::Null } else { json!(metadata.len()) },
            "modified": modified.to_rfc3339(),
        }));
    }

    entries.sort_by(|a, b| {
        a["path"]
            .as_str()
            .unwrap_or("")
            .cmp(b["path"].as_str().unwrap_or(""))
    });

    Ok(json!({
        "path": path,
        "entries": entries,
        "count": entries.len(),
        "truncated": truncated,
    }))
}

pub(super) fn read(jail: &PathJail, args: &Value) -> Result<Value> {
    let path = require_str(args, "path")?;
    let max_bytes = optional_u64(args, "maxBytes").unwrap_or(DEFAULT_READ_BYTES) as usize;

    let resolved = jail.resolve_existing(path)?;
    if resolved.is_dir() {
        return Err(Error::InvalidArgument(format!("Is a directory: {}", path)));
    }

    let data = std::fs::read(&resolved)?;
    let kept = max_bytes.min(data.len());
    let content = String::from_utf8_lossy(&data[..kept]).into_owned();

    Ok(json!({
        "path": path,
        "content": content,
        "sizeBytes": data.len(),
        "returnedBytes": kept,
        "truncated": kept < data.len(),
    }))
}

pub(super) fn write(jail: &PathJail, args: &Value) -> Result<Value> {
    let path = require_str(args, "path")?;
    let content = require_str(args, "content")?;
    let append = optional_bool(args, "append").unwrap_or(false);

    // Size ceiling is checked before touching the filesystem at all
    jail.ensure_write_size(content.len())?;
    let resolved = jail.resolve_for_write(path)?;

    if let Some(parent) = resolved.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if append {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&resolved)?;
        file.write_all(content.as_bytes())?;
    } else {
        std::fs::write(&resolved, content)?;
    }

    Ok(json!({
        "path": path,
        "bytesWritten": content.len(),
        "append": append,
    }))
}

pub(super) fn info(jail: &PathJail, args: &Value) -> Result<Value> {
    let path = require_str(args, "path")?;

    let resolved = jail.resolve_existing(path)?;
    let metadata = std::fs::metadata(&resolved)?;
    let modified: chrono::DateTime<chrono::Utc> = metadata.modified()?.into();

    let mime = if metadata.is_file() {
        json!(mime_guess::from_path(&resolved).first_or_octet_stream().to_string())
    } else {
        Value::Null
    };

    Ok(json!({
        "path": path,
        "kind": if metadata.is_dir() { "dir" } else { "file" },
        "sizeBytes": metadata.len(),
        "mimeType": mime,
        "modified": modified.to_rfc3339(),
        "readonly": metadata.permissions().readonly(),
    }))
}
