//! Incremental reconciliation of the knowledge root with the chunk index.
//!
//! A pass compares what is on disk with the stored [`FileRecord`]s:
//!
//! 1. **Scan**: enumerate eligible documents under the root.
//! 2. **Read**: load each document and fingerprint it (outside any
//!    transaction; a read failure leaves that document untouched).
//! 3. **Apply**: in a single transaction, replace the chunks of every
//!    changed document, refresh metadata of documents whose content did not
//!    change, and drop documents that disappeared.
//!
//! [`SyncEngine::sync_if_needed`] fronts the pass with a cheap metadata
//! check rate-limited by a cooldown, so it can run before every search.

use anyhow::Result;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chunk::chunk_document;
use crate::config::{ChunkingConfig, KnowledgeConfig};
use crate::fts;
use crate::hash::fingerprint;
use crate::models::{Chunk, DocumentMeta, FileRecord};
use crate::scan::{scan_corpus, CorpusFilter};

/// Monotonic time source for the cooldown.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Counters describing one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncReport {
    pub scanned: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub chunks_inserted: usize,
    pub chunks_deleted: usize,
}

/// What [`SyncEngine::sync_if_needed`] decided to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No knowledge root is configured.
    Disabled,
    /// The previous check is younger than the cooldown.
    Cooldown,
    /// The metadata check found nothing to do.
    Unchanged,
    Synced(SyncReport),
}

/// A document whose content differs from its stored record.
struct ChangedDocument {
    meta: DocumentMeta,
    hash: String,
    chunks: Vec<Chunk>,
}

pub struct SyncEngine {
    pool: SqlitePool,
    knowledge: KnowledgeConfig,
    chunking: ChunkingConfig,
    filter: CorpusFilter,
    clock: Arc<dyn Clock>,
    last_check: Mutex<Option<Instant>>,
}

impl SyncEngine {
    pub fn new(
        pool: SqlitePool,
        knowledge: KnowledgeConfig,
        chunking: ChunkingConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let filter = CorpusFilter::from_config(&knowledge)?;
        Ok(Self {
            pool,
            knowledge,
            chunking,
            filter,
            clock,
            last_check: Mutex::new(None),
        })
    }

    pub fn root(&self) -> Option<&Path> {
        self.knowledge.root()
    }

    /// Run a pass only if the cooldown has elapsed and the corpus looks changed.
    ///
    /// The check time is recorded before the metadata check runs, so a
    /// failing check still consumes the cooldown.
    pub async fn sync_if_needed(&self) -> Result<SyncOutcome> {
        if self.root().is_none() {
            return Ok(SyncOutcome::Disabled);
        }

        let now = self.clock.now();
        let cooldown = Duration::from_millis(self.knowledge.sync_cooldown_ms);
        {
            let mut last = self.last_check.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(prev) = *last {
                if now.saturating_duration_since(prev) < cooldown {
                    return Ok(SyncOutcome::Cooldown);
                }
            }
            *last = Some(now);
        }

        if !self.has_changes().await? {
            debug!("knowledge corpus unchanged");
            return Ok(SyncOutcome::Unchanged);
        }

        let report = self.sync().await?;
        Ok(SyncOutcome::Synced(report))
    }

    /// Cheap metadata comparison between disk and the stored records.
    pub async fn has_changes(&self) -> Result<bool> {
        let Some(root) = self.root() else {
            return Ok(false);
        };

        let scan = scan_corpus(root, &self.filter);
        let records = load_file_records(&self.pool).await?;

        if scan.skipped > 0 || scan.files.len() != records.len() {
            return Ok(true);
        }

        Ok(scan.files.iter().any(|doc| {
            records
                .get(&doc.relative_path)
                .map_or(true, |rec| rec.mtime != doc.mtime)
        }))
    }

    /// Full reconciliation pass.
    pub async fn sync(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let Some(root) = self.root() else {
            return Ok(report);
        };

        let scan = scan_corpus(root, &self.filter);
        report.scanned = scan.files.len();
        report.skipped = scan.skipped;

        let records = load_file_records(&self.pool).await?;
        let updated_at = chrono::Utc::now().timestamp_millis();

        let on_disk: HashSet<&str> = scan
            .files
            .iter()
            .map(|d| d.relative_path.as_str())
            .collect();

        let mut changed: Vec<ChangedDocument> = Vec::new();
        let mut touched: Vec<&DocumentMeta> = Vec::new();

        for doc in &scan.files {
            let content = match tokio::fs::read_to_string(&doc.absolute_path).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(path = %doc.relative_path, error = %e, "failed to read document, keeping previous index");
                    report.failed += 1;
                    continue;
                }
            };

            let hash = fingerprint(&content);
            match records.get(&doc.relative_path) {
                Some(rec) if rec.hash == hash => {
                    report.unchanged += 1;
                    if rec.mtime != doc.mtime || rec.size != doc.size {
                        touched.push(doc);
                    }
                }
                _ => {
                    let chunks = chunk_document(&content, &self.chunking)
                        .into_iter()
                        .map(|c| Chunk {
                            id: Uuid::new_v4().to_string(),
                            file_path: doc.relative_path.clone(),
                            text: c.text,
                            start_line: c.start_line,
                            end_line: c.end_line,
                            hash: c.hash,
                            updated_at,
                        })
                        .collect();
                    changed.push(ChangedDocument {
                        meta: doc.clone(),
                        hash,
                        chunks,
                    });
                }
            }
        }

        // Records under an unreadable subtree stay until a scan can see them.
        let removed: Vec<&str> = records
            .keys()
            .map(String::as_str)
            .filter(|path| !on_disk.contains(path) && scan.covers(path))
            .collect();

        let mut tx = self.pool.begin().await?;

        for doc in &changed {
            report.chunks_deleted += delete_file_chunks(&mut *tx, &doc.meta.relative_path).await?;
            for chunk in &doc.chunks {
                insert_chunk(&mut *tx, chunk).await?;
            }
            upsert_file_record(&mut *tx, &doc.meta, &doc.hash).await?;
            report.chunks_inserted += doc.chunks.len();
            report.updated += 1;
            debug!(path = %doc.meta.relative_path, chunks = doc.chunks.len(), "reindexed document");
        }

        for doc in touched {
            sqlx::query("UPDATE knowledge_files SET mtime = ?, size = ? WHERE path = ?")
                .bind(doc.mtime)
                .bind(doc.size)
                .bind(&doc.relative_path)
                .execute(&mut *tx)
                .await?;
        }

        for path in &removed {
            report.chunks_deleted += delete_file_chunks(&mut *tx, path).await?;
            sqlx::query("DELETE FROM knowledge_files WHERE path = ?")
                .bind(*path)
                .execute(&mut *tx)
                .await?;
            report.removed += 1;
            debug!(path = %path, "dropped deleted document");
        }

        tx.commit().await?;

        {
            let mut last = self.last_check.lock().unwrap_or_else(|e| e.into_inner());
            *last = Some(self.clock.now());
        }

        info!(
            scanned = report.scanned,
            updated = report.updated,
            removed = report.removed,
            failed = report.failed,
            chunks = report.chunks_inserted,
            "knowledge sync complete"
        );
        Ok(report)
    }
}

async fn load_file_records(pool: &SqlitePool) -> Result<HashMap<String, FileRecord>> {
    let rows = sqlx::query("SELECT path, hash, mtime, size FROM knowledge_files")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let rec = FileRecord {
                path: row.get("path"),
                hash: row.get("hash"),
                mtime: row.get("mtime"),
                size: row.get("size"),
            };
            (rec.path.clone(), rec)
        })
        .collect())
}

/// Delete a document's chunks from both tables, returning the primary-table count.
async fn delete_file_chunks(conn: &mut SqliteConnection, file_path: &str) -> Result<usize> {
    fts::remove_file_chunks(&mut *conn, file_path).await?;
    let result = sqlx::query("DELETE FROM knowledge_chunks WHERE file_path = ?")
        .bind(file_path)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() as usize)
}

async fn insert_chunk(conn: &mut SqliteConnection, chunk: &Chunk) -> Result<()> {
    sqlx::query(
        "INSERT INTO knowledge_chunks (id, file_path, text, start_line, end_line, hash, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&chunk.id)
    .bind(&chunk.file_path)
    .bind(&chunk.text)
    .bind(chunk.start_line)
    .bind(chunk.end_line)
    .bind(&chunk.hash)
    .bind(chunk.updated_at)
    .execute(&mut *conn)
    .await?;

    fts::index_chunk(&mut *conn, chunk).await
}

async fn upsert_file_record(conn: &mut SqliteConnection, doc: &DocumentMeta, hash: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO knowledge_files (path, hash, mtime, size) VALUES (?, ?, ?, ?)
        ON CONFLICT(path) DO UPDATE SET
            hash = excluded.hash,
            mtime = excluded.mtime,
            size = excluded.size
        "#,
    )
    .bind(&doc.relative_path)
    .bind(hash)
    .bind(doc.mtime)
    .bind(doc.size)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
