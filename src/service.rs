//! The memory service: the three boundary operations plus maintenance.
//!
//! [`MemoryService`] owns the pool, the sync engine and the writer lock.
//! Every mutation (store, forget, a sync pass, and the sync-if-needed step
//! that precedes a search) runs under that lock, so a sync never interleaves
//! with another write. The corpus queries themselves run without it; WAL
//! mode lets them read the last committed state.
//!
//! Search pulls from up to three corpora and merges them:
//!
//! | Corpus | Path | Category |
//! |--------|------|----------|
//! | Memory entries | FTS5, substring backstop | entry category |
//! | Knowledge chunks | FTS5 | `knowledge` |
//! | Session history | substring scan | `other` |

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::db;
use crate::error::ValidationError;
use crate::fts;
use crate::history::{read_history, score_history};
use crate::memory;
use crate::migrate::run_migrations;
use crate::models::{Category, ResultCategory, SearchHit};
use crate::rank::merge_ranked;
use crate::sync::{Clock, SyncEngine, SyncOutcome, SyncReport, SystemClock};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl StoreRequest {
    /// Trimmed text and parsed category, or the first validation failure.
    pub fn validate(&self) -> Result<(String, Category), ValidationError> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(ValidationError::Empty { field: "text" });
        }
        let category = match self.category.as_deref() {
            None => Category::default(),
            Some(raw) => raw.parse()?,
        };
        Ok((text.to_string(), category))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreResponse {
    pub id: String,
    pub created_at: i64,
    pub deduplicated: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl SearchRequest {
    /// Trimmed query and effective limit.
    pub fn validate(&self, default_limit: i64, max_limit: i64) -> Result<(String, i64), ValidationError> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err(ValidationError::Empty { field: "query" });
        }
        let limit = self.limit.unwrap_or(default_limit);
        if !(1..=max_limit).contains(&limit) {
            return Err(ValidationError::LimitOutOfRange {
                field: "limit",
                value: limit,
                max: max_limit,
            });
        }
        Ok((query.to_string(), limit))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForgetRequest {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForgetResponse {
    pub deleted: bool,
}

/// Row counts across the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub memories: i64,
    pub files: i64,
    pub chunks: i64,
    pub history_entries: i64,
}

pub struct MemoryService {
    pool: SqlitePool,
    config: Arc<Config>,
    sync: SyncEngine,
    writer: Mutex<()>,
}

impl MemoryService {
    /// Connect to the configured database and bring its schema up to date.
    pub async fn open(config: Config) -> Result<Self> {
        let pool = db::connect(&config).await?;
        run_migrations(&pool).await?;
        Self::new(pool, config, Arc::new(SystemClock))
    }

    /// Build a service over an already-migrated pool.
    pub fn new(pool: SqlitePool, config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let sync = SyncEngine::new(
            pool.clone(),
            config.knowledge.clone(),
            config.chunking.clone(),
            clock,
        )?;
        Ok(Self {
            pool,
            config: Arc::new(config),
            sync,
            writer: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn store(&self, req: StoreRequest) -> Result<StoreResponse> {
        let (text, category) = req.validate()?;

        let _guard = self.writer.lock().await;
        let stored = memory::store_memory(&self.pool, &text, category).await?;

        Ok(StoreResponse {
            id: stored.entry.id,
            created_at: stored.entry.created_at,
            deduplicated: stored.deduplicated,
        })
    }

    pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
        let retrieval = &self.config.retrieval;
        let (query, limit) = req.validate(retrieval.default_limit, retrieval.max_limit)?;

        {
            let _guard = self.writer.lock().await;
            match self.sync.sync_if_needed().await {
                Ok(SyncOutcome::Synced(report)) => {
                    debug!(updated = report.updated, removed = report.removed, "synced before search")
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "knowledge sync failed, searching last indexed state"),
            }
        }

        let fetch_limit = limit.saturating_mul(retrieval.candidate_multiplier);

        let memories = memory::search_memory_corpus(&self.pool, &query, fetch_limit).await?;
        let knowledge = self.search_knowledge(&query, fetch_limit).await;
        let history = self.search_history(&query).await;

        let results = merge_ranked([memories, knowledge, history], limit as usize);
        Ok(SearchResponse { results })
    }

    pub async fn forget(&self, req: ForgetRequest) -> Result<ForgetResponse> {
        let id = req.id.trim();
        if id.is_empty() {
            return Err(ValidationError::Empty { field: "id" }.into());
        }

        let _guard = self.writer.lock().await;
        let deleted = memory::forget_memory(&self.pool, id).await?;
        debug!(id, deleted, "forget");
        Ok(ForgetResponse { deleted })
    }

    /// Force a full reconciliation pass regardless of the cooldown.
    pub async fn sync(&self) -> Result<SyncReport> {
        let _guard = self.writer.lock().await;
        self.sync.sync().await
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let memories = memory::count_memories(&self.pool).await?;
        let files: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_files")
            .fetch_one(&self.pool)
            .await?;
        let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_chunks")
            .fetch_one(&self.pool)
            .await?;
        let history_entries = match &self.config.history.path {
            Some(path) => read_history(path).await.len() as i64,
            None => 0,
        };

        Ok(StoreStats {
            memories,
            files,
            chunks,
            history_entries,
        })
    }

    async fn search_knowledge(&self, query: &str, fetch_limit: i64) -> Vec<SearchHit> {
        if self.sync.root().is_none() {
            return Vec::new();
        }

        match fts::search_chunks(&self.pool, query, fetch_limit).await {
            Ok(matches) => matches
                .into_iter()
                .map(|m| SearchHit {
                    text: format!(
                        "{}#L{}-L{}\n{}",
                        m.chunk.file_path, m.chunk.start_line, m.chunk.end_line, m.chunk.text
                    ),
                    id: m.chunk.id,
                    category: ResultCategory::Knowledge,
                    score: m.relevance.score(),
                    timestamp: m.chunk.updated_at,
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "knowledge index query failed");
                Vec::new()
            }
        }
    }

    async fn search_history(&self, query: &str) -> Vec<SearchHit> {
        match &self.config.history.path {
            Some(path) => score_history(&read_history(path).await, query),
            None => Vec::new(),
        }
    }
}
