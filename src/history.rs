//! Session-history log reader.
//!
//! The log is newline-delimited JSON, one record per prompt. It is read
//! wholesale on each search and scored with the fallback heuristic since it
//! has no index of its own.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

use crate::models::{ResultCategory, SearchHit};
use crate::rank::Relevance;
use crate::score::fallback_score;

/// One line of the history log. Every field is optional, and a field of
/// the wrong JSON type reads as absent instead of rejecting the line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub display: Option<String>,
    #[serde(default)]
    pub pasted_contents: Option<Value>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub project: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub session_id: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Millisecond timestamps may be written as floats (`1.7e12`); they are truncated.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    })
}

impl HistoryEntry {
    /// Result id: the session id, else a timestamp-derived key.
    pub fn result_id(&self) -> String {
        match (&self.session_id, self.timestamp) {
            (Some(id), _) if !id.is_empty() => id.clone(),
            (_, Some(ts)) => format!("history:{}", ts),
            _ => "history:unknown".to_string(),
        }
    }
}

/// Parse history records from raw file contents, skipping blank and malformed lines.
pub fn parse_history(raw: &str) -> Vec<HistoryEntry> {
    let mut entries = Vec::new();
    let mut malformed = 0usize;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<HistoryEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(_) => malformed += 1,
        }
    }

    if malformed > 0 {
        debug!(malformed, "skipped malformed history lines");
    }
    entries
}

/// Read the history log. A missing or unreadable file yields no records.
pub async fn read_history(path: &Path) -> Vec<HistoryEntry> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => parse_history(&raw),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read history log");
            Vec::new()
        }
    }
}

/// Score history entries against `query` with the fallback heuristic.
pub fn score_history(entries: &[HistoryEntry], query: &str) -> Vec<SearchHit> {
    entries
        .iter()
        .filter_map(|entry| {
            let text = entry.display.as_deref().unwrap_or("");
            if text.is_empty() {
                return None;
            }
            let score = Relevance::Heuristic(fallback_score(text, query)).score();
            (score > 0.0).then(|| SearchHit {
                id: entry.result_id(),
                text: text.to_string(),
                category: ResultCategory::Other,
                score,
                timestamp: entry.timestamp.unwrap_or(0),
            })
        })
        .collect()
}
