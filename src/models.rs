//! Core data models shared by the indexing and retrieval pipeline.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ValidationError;

/// Category of a user-authored memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Preference,
    Fact,
    Decision,
    Entity,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Preference,
        Category::Fact,
        Category::Decision,
        Category::Entity,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Preference => "preference",
            Category::Fact => "fact",
            Category::Decision => "decision",
            Category::Entity => "entity",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| ValidationError::UnknownCategory {
                value: s.to_string(),
            })
    }
}

/// Tag attached to a search result: a memory category, or the document corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultCategory {
    Preference,
    Fact,
    Decision,
    Entity,
    Other,
    Knowledge,
}

impl ResultCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultCategory::Knowledge => "knowledge",
            ResultCategory::Preference => "preference",
            ResultCategory::Fact => "fact",
            ResultCategory::Decision => "decision",
            ResultCategory::Entity => "entity",
            ResultCategory::Other => "other",
        }
    }
}

impl From<Category> for ResultCategory {
    fn from(c: Category) -> Self {
        match c {
            Category::Preference => ResultCategory::Preference,
            Category::Fact => ResultCategory::Fact,
            Category::Decision => ResultCategory::Decision,
            Category::Entity => ResultCategory::Entity,
            Category::Other => ResultCategory::Other,
        }
    }
}

/// A stored memory note.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    pub id: String,
    pub text: String,
    pub category: Category,
    pub created_at: i64,
    pub hash: String,
}

/// A document discovered under the knowledge root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMeta {
    /// Path relative to the root, always `/`-separated.
    pub relative_path: String,
    pub absolute_path: PathBuf,
    /// Modification time, milliseconds since the Unix epoch.
    pub mtime: i64,
    pub size: i64,
}

/// Persisted snapshot of a document as of its last index pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: String,
    pub hash: String,
    pub mtime: i64,
    pub size: i64,
}

/// A stored line-range slice of a knowledge document.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub file_path: String,
    pub text: String,
    pub start_line: i64,
    pub end_line: i64,
    pub hash: String,
    pub updated_at: i64,
}

/// A single ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub category: ResultCategory,
    pub score: f64,
    /// Creation/update time used as the tie-break; not part of the response.
    #[serde(skip)]
    pub timestamp: i64,
}
