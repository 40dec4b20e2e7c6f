//! # newsroll
//!
//! Ingestion, deduplication, and summarization service for items
//! collected from monitored channels.
//!
//! Collectors submit items over HTTP (or `newsroll ingest`). Each item is
//! scored against a keyword dictionary, deduplicated by link and by
//! normalized content, and stored with its tags. Analysts group items
//! into cases, promote them, and generate summaries and reports.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────────┐   ┌──────────┐
//! │ Collectors │──▶│ DedupEngine + Scorer │──▶│  SQLite  │
//! └────────────┘   └──────────┬───────────┘   └────┬─────┘
//!                             │ orphan cleanup     │
//!                             ▼                    ▼
//!                       ┌──────────┐        ┌────────────┐
//!                       │  Media   │        │ CaseBook + │──▶ chat backend
//!                       │  (disk)  │        │ Summarizer │
//!                       └──────────┘        └────────────┘
//! ```
//!
//! The domain logic lives in `newsroll-core`; this crate provides the
//! configured backends, the CLI, and the HTTP API.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite `Store` implementation |
//! | [`media`] | Disk `MediaStore` implementation |
//! | [`llm`] | OpenAI-compatible chat backend |
//! | [`app`] | Service wiring |
//! | [`ingest`] | `newsroll ingest` |
//! | [`items`] | Item retrieval and listing |
//! | [`case_cmd`] | Case and report commands |
//! | [`server`] | HTTP API |

pub mod app;
pub mod case_cmd;
pub mod config;
pub mod db;
pub mod ingest;
pub mod items;
pub mod llm;
pub mod media;
pub mod migrate;
pub mod server;
pub mod sqlite_store;
