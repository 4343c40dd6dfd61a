//! Memory-entry persistence and retrieval.
//!
//! Each write touches the `memories` row and its `memories_fts` mirror in
//! one transaction. Entries are deduplicated on their `(text, category)`
//! fingerprint: a repeated store resolves to the existing row.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::fts;
use crate::hash::entry_fingerprint;
use crate::models::{Category, MemoryEntry, SearchHit};
use crate::rank::Relevance;
use crate::score::fallback_score;

/// Outcome of [`store_memory`].
#[derive(Debug, Clone)]
pub struct StoredMemory {
    pub entry: MemoryEntry,
    /// `true` when an identical entry already existed and was returned instead.
    pub deduplicated: bool,
}

/// Insert a memory entry, or return the existing one with the same fingerprint.
///
/// `text` is stored as given; callers trim and validate it first.
pub async fn store_memory(pool: &SqlitePool, text: &str, category: Category) -> Result<StoredMemory> {
    let entry = MemoryEntry {
        id: Uuid::new_v4().to_string(),
        text: text.to_string(),
        category,
        created_at: chrono::Utc::now().timestamp_millis(),
        hash: entry_fingerprint(text, category),
    };

    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO memories (id, text, category, created_at, hash)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(hash) DO NOTHING
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.text)
    .bind(entry.category.as_str())
    .bind(entry.created_at)
    .bind(&entry.hash)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted == 0 {
        let row = sqlx::query(
            "SELECT id, text, category, created_at, hash FROM memories WHERE hash = ?",
        )
        .bind(&entry.hash)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        let existing = entry_from_row(&row);
        debug!(id = %existing.id, "memory already stored, returning existing entry");
        return Ok(StoredMemory {
            entry: existing,
            deduplicated: true,
        });
    }

    fts::index_memory(&mut *tx, &entry).await?;
    tx.commit().await?;

    debug!(id = %entry.id, category = %entry.category, "stored memory");
    Ok(StoredMemory {
        entry,
        deduplicated: false,
    })
}

/// Delete a memory entry and its index row. Returns whether a row existed.
pub async fn forget_memory(pool: &SqlitePool, id: &str) -> Result<bool> {
    let mut tx = pool.begin().await?;

    fts::remove_memory(&mut *tx, id).await?;
    let deleted = sqlx::query("DELETE FROM memories WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;
    Ok(deleted > 0)
}

pub async fn get_memory(pool: &SqlitePool, id: &str) -> Result<Option<MemoryEntry>> {
    let row = sqlx::query("SELECT id, text, category, created_at, hash FROM memories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(entry_from_row))
}

/// Search the memory corpus, at most `fetch_limit` hits.
///
/// The full-text index is tried first. If it fails or finds nothing, every
/// entry is scored with the substring heuristic instead.
pub async fn search_memory_corpus(
    pool: &SqlitePool,
    query: &str,
    fetch_limit: i64,
) -> Result<Vec<SearchHit>> {
    let indexed = match fts::search_memories(pool, query, fetch_limit).await {
        Ok(matches) => matches,
        Err(e) => {
            warn!(error = %e, "memory index query failed, falling back to substring scan");
            Vec::new()
        }
    };

    if !indexed.is_empty() {
        return Ok(indexed
            .into_iter()
            .map(|m| to_hit(m.entry, m.relevance))
            .collect());
    }

    let rows = sqlx::query("SELECT id, text, category, created_at, hash FROM memories")
        .fetch_all(pool)
        .await?;

    let mut hits: Vec<SearchHit> = rows
        .iter()
        .map(entry_from_row)
        .filter_map(|entry| {
            let relevance = Relevance::Heuristic(fallback_score(&entry.text, query));
            (relevance.score() > 0.0).then(|| to_hit(entry, relevance))
        })
        .collect();

    hits.sort_by(crate::rank::compare_hits);
    hits.truncate(fetch_limit.max(0) as usize);
    Ok(hits)
}

pub async fn count_memories(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memories")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn to_hit(entry: MemoryEntry, relevance: Relevance) -> SearchHit {
    SearchHit {
        id: entry.id,
        text: entry.text,
        category: entry.category.into(),
        score: relevance.score(),
        timestamp: entry.created_at,
    }
}

fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> MemoryEntry {
    let category: String = row.get("category");
    MemoryEntry {
        id: row.get("id"),
        text: row.get("text"),
        category: category.parse().unwrap_or_default(),
        created_at: row.get("created_at"),
        hash: row.get("hash"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_path;
    use crate::migrate::run_migrations;
    use crate::models::ResultCategory;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, SqlitePool) {
        let tmp = TempDir::new().unwrap();
        let pool = connect_path(&tmp.path().join("db.sqlite")).await.unwrap();
        run_migrations(&pool).await.unwrap();
        (tmp, pool)
    }

    #[tokio::test]
    async fn test_store_dedups_identical_entry() {
        let (_tmp, pool) = setup().await;

        let first = store_memory(&pool, "buy milk", Category::Fact).await.unwrap();
        let second = store_memory(&pool, "buy milk", Category::Fact).await.unwrap();

        assert!(!first.deduplicated);
        assert!(second.deduplicated);
        assert_eq!(first.entry.id, second.entry.id);
        assert_eq!(first.entry.created_at, second.entry.created_at);
        assert_eq!(count_memories(&pool).await.unwrap(), 1);

        let fts_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM memories_fts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(fts_rows, 1);
    }

    #[tokio::test]
    async fn test_same_text_different_category_is_distinct() {
        let (_tmp, pool) = setup().await;
        let a = store_memory(&pool, "buy milk", Category::Fact).await.unwrap();
        let b = store_memory(&pool, "buy milk", Category::Decision).await.unwrap();
        assert_ne!(a.entry.id, b.entry.id);
        assert_eq!(count_memories(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_forget_removes_entry_and_index_row() {
        let (_tmp, pool) = setup().await;
        let stored = store_memory(&pool, "ship on fridays", Category::Decision)
            .await
            .unwrap();

        assert!(forget_memory(&pool, &stored.entry.id).await.unwrap());
        assert!(get_memory(&pool, &stored.entry.id).await.unwrap().is_none());
        assert!(search_memory_corpus(&pool, "fridays", 15)
            .await
            .unwrap()
            .is_empty());
        assert!(!forget_memory(&pool, &stored.entry.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_index_ranks_closer_match_first() {
        let (_tmp, pool) = setup().await;
        store_memory(&pool, "I prefer dark mode", Category::Preference)
            .await
            .unwrap();
        store_memory(&pool, "dark chocolate is great", Category::Other)
            .await
            .unwrap();

        let hits = search_memory_corpus(&pool, "dark mode", 15).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "I prefer dark mode");
        assert_eq!(hits[0].category, ResultCategory::Preference);
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_substring_fallback_when_index_finds_nothing() {
        let (_tmp, pool) = setup().await;
        store_memory(&pool, "buy milk", Category::Fact).await.unwrap();

        // "ilk" is not a token prefix, so only the substring scan matches.
        assert!(fts::search_memories(&pool, "ilk", 15).await.unwrap().is_empty());
        let hits = search_memory_corpus(&pool, "ilk", 15).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "buy milk");
        assert!(hits[0].score > 0.0);
    }

    #[tokio::test]
    async fn test_punctuation_only_query_is_empty() {
        let (_tmp, pool) = setup().await;
        store_memory(&pool, "buy milk", Category::Fact).await.unwrap();
        assert!(search_memory_corpus(&pool, "???", 15).await.unwrap().is_empty());
    }
}
