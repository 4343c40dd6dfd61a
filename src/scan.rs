//! Knowledge-root scanner.
//!
//! Walks the knowledge root recursively and returns metadata for every file
//! matching the include globs (and none of the exclude globs). Entries that
//! cannot be read are counted instead of failing the walk, so a caller can
//! tell a partial scan from a complete one.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::KnowledgeConfig;
use crate::models::DocumentMeta;

const DEFAULT_EXCLUDES: [&str; 2] = ["**/.git/**", "**/node_modules/**"];

/// Compiled include/exclude globs for the knowledge corpus.
#[derive(Debug, Clone)]
pub struct CorpusFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl CorpusFilter {
    pub fn new(include_globs: &[String], exclude_globs: &[String]) -> Result<Self> {
        let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
        excludes.extend(exclude_globs.iter().cloned());

        Ok(Self {
            include: build_globset(include_globs)?,
            exclude: build_globset(&excludes)?,
        })
    }

    pub fn from_config(config: &KnowledgeConfig) -> Result<Self> {
        Self::new(&config.include_globs, &config.exclude_globs)
    }

    pub fn matches(&self, relative_path: &str) -> bool {
        self.include.is_match(relative_path) && !self.exclude.is_match(relative_path)
    }
}

/// Result of a scan: the eligible files plus how many entries were unreadable.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub files: Vec<DocumentMeta>,
    pub skipped: usize,
    /// Relative paths the walk could not descend into or stat. An empty
    /// string stands for the whole root.
    pub unreadable: Vec<String>,
}

impl ScanReport {
    /// Whether the scan saw everything that could live at `relative_path`.
    /// A path at or below an unreadable entry is not covered, so its absence
    /// from `files` says nothing about the disk.
    pub fn covers(&self, relative_path: &str) -> bool {
        !self.unreadable.iter().any(|prefix| {
            prefix.is_empty()
                || relative_path == prefix
                || relative_path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// Enumerate eligible documents under `root`, sorted by relative path.
///
/// A missing root is not an error: it simply holds no documents yet.
pub fn scan_corpus(root: &Path, filter: &CorpusFilter) -> ScanReport {
    let mut report = ScanReport::default();

    if !root.is_dir() {
        debug!(root = %root.display(), "knowledge root missing, nothing to scan");
        return report;
    }

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry under knowledge root");
                report.skipped += 1;
                let relative = e
                    .path()
                    .and_then(|p| p.strip_prefix(root).ok())
                    .map(|p| normalize_separators(&p.to_string_lossy()))
                    .unwrap_or_default();
                report.unreadable.push(relative);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = normalize_separators(&relative.to_string_lossy());

        if !filter.matches(&rel_str) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %rel_str, error = %e, "skipping file with unreadable metadata");
                report.skipped += 1;
                report.unreadable.push(rel_str);
                continue;
            }
        };

        let mtime = metadata
            .modified()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp_millis())
            .unwrap_or(0);

        report.files.push(DocumentMeta {
            relative_path: rel_str,
            absolute_path: path.to_path_buf(),
            mtime,
            size: metadata.len() as i64,
        });
    }

    // Sort for deterministic ordering
    report
        .files
        .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    report
}

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
