//! # Memory Harness
//!
//! Persistent memory and knowledge-base retrieval for AI tools.
//!
//! Three corpora are searched together: short memory notes stored through
//! the API, markdown documents under a knowledge root (chunked and indexed
//! incrementally), and a read-only session-history log. Results from all
//! three are merged into one ranked list.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Knowledge    │──▶│ scan → hash  │──▶│   SQLite     │
//! │ root (*.md)  │   │ → chunk      │   │ rows + FTS5  │
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              │
//!   store / forget ───────────────────────────▶│
//!                                              ▼
//!   history.jsonl ──▶ substring scan ──▶ ranked merge ──▶ search
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Validation errors |
//! | [`hash`] | Content fingerprints |
//! | [`chunk`] | Line-boundary chunking with overlap |
//! | [`scan`] | Knowledge-root enumeration |
//! | [`sync`] | Incremental reconciliation and cooldown |
//! | [`fts`] | FTS5 projection and BM25 queries |
//! | [`score`] | Substring fallback scorer |
//! | [`rank`] | Relevance contract and ranked merge |
//! | [`history`] | Session-history log reader |
//! | [`memory`] | Memory-entry persistence |
//! | [`service`] | Store / search / forget operations |
//! | [`tools`] | Tool trait and registry |
//! | [`server`] | HTTP tool server |
//! | [`stats`] | `memh stats` output |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod config;
pub mod db;
pub mod error;
pub mod fts;
pub mod hash;
pub mod history;
pub mod memory;
pub mod migrate;
pub mod models;
pub mod rank;
pub mod scan;
pub mod score;
pub mod server;
pub mod service;
pub mod stats;
pub mod sync;
pub mod tools;
