use std::path::{Path, PathBuf};

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::domain::LlmResponse;

/// Name used when sanitizing leaves nothing behind
pub const PLACEHOLDER_NAME: &str = "unnamed";

/// Identifier length used by `save_records`
pub const DEFAULT_MAX_NAME_LEN: usize = 50;

static INVALID_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]").unwrap());
static REPEATED_UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").unwrap());

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize records: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Make `input` safe to embed in a file name.
///
/// `max_len` is raised to the placeholder length when smaller, which keeps
/// `sanitize_filename(sanitize_filename(x, n), n) == sanitize_filename(x, n)`.
pub fn sanitize_filename(input: &str, max_len: usize) -> String {
    let max_len = max_len.max(PLACEHOLDER_NAME.len());

    let replaced = INVALID_CHARS.replace_all(input, "_");
    let collapsed = REPEATED_UNDERSCORES.replace_all(&replaced, "_");
    let truncated: String = collapsed.trim_matches('_').chars().take(max_len).collect();
    let cleaned = truncated.trim_end_matches('_');

    if cleaned.is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// `{source}_{identifier}_{timestamp}.json`, identifier omitted when absent
pub fn record_file_name(source: &str, identifier: Option<&str>, timestamp: &str) -> String {
    match identifier {
        Some(id) => format!(
            "{}_{}_{}.json",
            source,
            sanitize_filename(id, DEFAULT_MAX_NAME_LEN),
            timestamp
        ),
        None => format!("{}_{}.json", source, timestamp),
    }
}

/// Write `records` to `dir` inside the `{source, metadata, data}` envelope.
///
/// `metadata` is extended with `collected_at` and `count`.
pub async fn save_records<T: Serialize>(
    dir: &Path,
    records: &[T],
    metadata: serde_json::Map<String, serde_json::Value>,
    source: &str,
    identifier: Option<&str>,
) -> Result<PathBuf, PersistenceError> {
    let now = Utc::now();
    let path = dir.join(record_file_name(
        source,
        identifier,
        &now.format("%Y%m%d_%H%M%S").to_string(),
    ));

    let mut metadata = metadata;
    metadata.insert("collected_at".to_string(), serde_json::json!(now.to_rfc3339()));
    metadata.insert("count".to_string(), serde_json::json!(records.len()));

    let data = serde_json::to_value(records)?;
    let envelope = serde_json::json!({
        "source": source,
        "metadata": metadata,
        "data": data,
    });
    let bytes = serde_json::to_vec_pretty(&envelope)?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| PersistenceError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|source| PersistenceError::Io {
            path: path.clone(),
            source,
        })?;

    info!(path = %path.display(), count = records.len(), "Saved records");

    Ok(path)
}

/// Persist completion responses, e.g. a session transcript
pub async fn save_responses(
    dir: &Path,
    responses: &[LlmResponse],
    source: &str,
    identifier: Option<&str>,
) -> Result<PathBuf, PersistenceError> {
    let mut metadata = serde_json::Map::new();

    if let Some(first) = responses.first() {
        metadata.insert("model".to_string(), serde_json::json!(first.model));
    }

    let total_tokens: u64 = responses.iter().map(|r| r.usage.total_tokens as u64).sum();
    metadata.insert("total_tokens".to_string(), serde_json::json!(total_tokens));

    save_records(dir, responses, metadata, source, identifier).await
}
