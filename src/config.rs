//! TOML configuration parsing and validation.
//!
//! Every section carries defaults so a partial file (or none at all) still
//! yields a usable [`Config`]. A handful of `MEMH_*` environment variables
//! are applied on top of the file by [`load_config`].

use anyhow::{bail, Context, Result};
use globset::Glob;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/memory.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,
    /// Rows fetched from each index per requested result, leaving room for
    /// the cross-corpus merge before truncation.
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            candidate_multiplier: default_candidate_multiplier(),
        }
    }
}

fn default_limit() -> i64 {
    5
}
fn default_max_limit() -> i64 {
    20
}

const MAX_CANDIDATE_MULTIPLIER: i64 = 100;

fn default_candidate_multiplier() -> i64 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    800
}
fn default_overlap_chars() -> usize {
    160
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    /// Knowledge-base root. Unset or empty disables the document corpus.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_sync_cooldown_ms")]
    pub sync_cooldown_ms: u64,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            root: None,
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            sync_cooldown_ms: default_sync_cooldown_ms(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}
fn default_sync_cooldown_ms() -> u64 {
    5000
}

impl KnowledgeConfig {
    /// The configured root, treating an empty path as unset.
    pub fn root(&self) -> Option<&Path> {
        self.root
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct HistoryConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Apply `MEMH_*` environment overrides on top of the parsed file.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup("MEMH_DB_PATH") {
            self.db.path = PathBuf::from(path);
        }
        if let Some(raw) = lookup("MEMH_DEFAULT_LIMIT") {
            self.retrieval.default_limit = raw
                .trim()
                .parse()
                .with_context(|| format!("MEMH_DEFAULT_LIMIT is not an integer: {raw}"))?;
        }
        if let Some(raw) = lookup("MEMH_MAX_LIMIT") {
            self.retrieval.max_limit = raw
                .trim()
                .parse()
                .with_context(|| format!("MEMH_MAX_LIMIT is not an integer: {raw}"))?;
        }
        if let Some(path) = lookup("MEMH_KNOWLEDGE_PATH") {
            self.knowledge.root = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("MEMH_HISTORY_PATH") {
            self.history.path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chars == 0 {
            bail!("chunking.max_chars must be > 0");
        }
        if self.chunking.overlap_chars >= self.chunking.max_chars {
            bail!("chunking.overlap_chars must be smaller than chunking.max_chars");
        }

        if self.retrieval.max_limit < 1 {
            bail!("retrieval.max_limit must be >= 1");
        }
        if !(1..=self.retrieval.max_limit).contains(&self.retrieval.default_limit) {
            bail!(
                "retrieval.default_limit must be in [1, {}]",
                self.retrieval.max_limit
            );
        }
        if !(1..=MAX_CANDIDATE_MULTIPLIER).contains(&self.retrieval.candidate_multiplier) {
            bail!(
                "retrieval.candidate_multiplier must be in [1, {}]",
                MAX_CANDIDATE_MULTIPLIER
            );
        }

        for pattern in self
            .knowledge
            .include_globs
            .iter()
            .chain(self.knowledge.exclude_globs.iter())
        {
            Glob::new(pattern)
                .with_context(|| format!("invalid knowledge glob: '{}'", pattern))?;
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.apply_env_overrides()?;
    config.validate()?;

    Ok(config)
}

/// Load the config file if it exists, otherwise start from defaults.
/// Environment overrides and validation apply either way.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        return load_config(path);
    }
    let mut config = Config::default();
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}
