//! SQLite FTS5 projection over memory entries and knowledge chunks.
//!
//! The FTS tables are append/delete only: an update is always a delete
//! followed by an insert. Write helpers take a `&mut SqliteConnection` so
//! the caller decides which transaction they belong to; the primary-table
//! write and its mirror here must share one.
//!
//! Queries are built by [`build_match_query`]: every token becomes a
//! quoted prefix term and terms are OR-ed, so a row matches when any token
//! prefix-matches. Results are ranked by `bm25()`.

use anyhow::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::models::{Category, Chunk, MemoryEntry};
use crate::rank::Relevance;

/// A knowledge chunk returned by the index.
#[derive(Debug, Clone)]
pub struct ChunkMatch {
    pub chunk: Chunk,
    pub relevance: Relevance,
}

/// A memory entry returned by the index.
#[derive(Debug, Clone)]
pub struct MemoryMatch {
    pub entry: MemoryEntry,
    pub relevance: Relevance,
}

/// Turn free text into an FTS5 `MATCH` expression.
///
/// Punctuation becomes whitespace, tokens without any alphanumeric
/// character are dropped, and each remaining token is emitted as
/// `"token"*`. Returns `None` when no token survives.
pub fn build_match_query(query: &str) -> Option<String> {
    let cleaned: String = query
        .chars()
        .map(|c| if is_query_punctuation(c) { ' ' } else { c })
        .collect();

    let terms: Vec<String> = cleaned
        .split_whitespace()
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(|t| format!("\"{}\"*", t))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

fn is_query_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || matches!(c, '\u{201C}' | '\u{201D}' | '\u{2018}' | '\u{2019}')
}

// ============ Memory entries ============

pub async fn index_memory(conn: &mut SqliteConnection, entry: &MemoryEntry) -> Result<()> {
    sqlx::query("INSERT INTO memories_fts (text, id, category) VALUES (?, ?, ?)")
        .bind(&entry.text)
        .bind(&entry.id)
        .bind(entry.category.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn remove_memory(conn: &mut SqliteConnection, id: &str) -> Result<()> {
    sqlx::query("DELETE FROM memories_fts WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Rank memory entries for `query`, best first. At most `limit` rows.
pub async fn search_memories(
    pool: &SqlitePool,
    query: &str,
    limit: i64,
) -> Result<Vec<MemoryMatch>> {
    let Some(match_query) = build_match_query(query) else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query(
        r#"
        SELECT m.id, m.text, m.category, m.created_at, m.hash,
               bm25(memories_fts) AS rank
        FROM memories_fts
        JOIN memories m ON m.id = memories_fts.id
        WHERE memories_fts MATCH ?
        ORDER BY rank
        LIMIT ?
        "#,
    )
    .bind(&match_query)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let matches = rows
        .iter()
        .map(|row| {
            let category: String = row.get("category");
            MemoryMatch {
                entry: MemoryEntry {
                    id: row.get("id"),
                    text: row.get("text"),
                    category: category.parse::<Category>().unwrap_or_default(),
                    created_at: row.get("created_at"),
                    hash: row.get("hash"),
                },
                relevance: Relevance::Bm25Rank(row.get("rank")),
            }
        })
        .collect();

    Ok(matches)
}

// ============ Knowledge chunks ============

pub async fn index_chunk(conn: &mut SqliteConnection, chunk: &Chunk) -> Result<()> {
    sqlx::query("INSERT INTO knowledge_chunks_fts (text, id, file_path) VALUES (?, ?, ?)")
        .bind(&chunk.text)
        .bind(&chunk.id)
        .bind(&chunk.file_path)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Remove every indexed chunk of one document.
pub async fn remove_file_chunks(conn: &mut SqliteConnection, file_path: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM knowledge_chunks_fts WHERE file_path = ?")
        .bind(file_path)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Rank knowledge chunks for `query`, best first. At most `limit` rows.
pub async fn search_chunks(pool: &SqlitePool, query: &str, limit: i64) -> Result<Vec<ChunkMatch>> {
    let Some(match_query) = build_match_query(query) else {
        return Ok(Vec::new());
    };

    let rows = sqlx::query(
        r#"
        SELECT c.id, c.file_path, c.text, c.start_line, c.end_line, c.hash, c.updated_at,
               bm25(knowledge_chunks_fts) AS rank
        FROM knowledge_chunks_fts
        JOIN knowledge_chunks c ON c.id = knowledge_chunks_fts.id
        WHERE knowledge_chunks_fts MATCH ?
        ORDER BY rank
        LIMIT ?
        "#,
    )
    .bind(&match_query)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let matches = rows
        .iter()
        .map(|row| ChunkMatch {
            chunk: Chunk {
                id: row.get("id"),
                file_path: row.get("file_path"),
                text: row.get("text"),
                start_line: row.get("start_line"),
                end_line: row.get("end_line"),
                hash: row.get("hash"),
                updated_at: row.get("updated_at"),
            },
            relevance: Relevance::Bm25Rank(row.get("rank")),
        })
        .collect();

    Ok(matches)
}
