//! Wiring of the core services against the configured backends.
//!
//! [`App`] is built once per process (CLI command or server) and shared
//! by reference; every field is cheap to clone.

use std::sync::Arc;

use anyhow::Result;
use newsroll_core::cases::CaseBook;
use newsroll_core::dedup::DedupEngine;
use newsroll_core::media::MediaStore;
use newsroll_core::scoring::{KeywordScorer, KeywordTable};
use newsroll_core::store::Store;
use newsroll_core::summarize::{Summarizer, TextBackend};

use crate::config::Config;
use crate::db;
use crate::llm::OpenAiChatBackend;
use crate::media::DiskMediaStore;
use crate::sqlite_store::SqliteStore;

pub type Engine = DedupEngine<dyn Store, dyn MediaStore, KeywordTable>;
pub type Cases = CaseBook<dyn Store, dyn TextBackend>;

#[derive(Clone)]
pub struct App {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub media: Arc<dyn MediaStore>,
    pub engine: Engine,
    pub cases: Cases,
}

impl App {
    /// Connect to the configured database and use the OpenAI chat backend.
    pub async fn open(config: &Config) -> Result<Self> {
        let backend = Arc::new(OpenAiChatBackend::new(&config.summarizer)?);
        Self::open_with_backend(config, backend).await
    }

    pub async fn open_with_backend(config: &Config, backend: Arc<dyn TextBackend>) -> Result<Self> {
        let pool = db::connect(config).await?;
        let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
        let media: Arc<dyn MediaStore> = Arc::new(DiskMediaStore::new(&config.media));
        Ok(Self::assemble(config, store, media, backend))
    }

    pub fn assemble(
        config: &Config,
        store: Arc<dyn Store>,
        media: Arc<dyn MediaStore>,
        backend: Arc<dyn TextBackend>,
    ) -> Self {
        let scorer = Arc::new(KeywordScorer::new(KeywordTable::new(
            config.scoring.keywords.clone(),
        )));
        let summarizer = Arc::new(Summarizer::new(backend, config.summarizer.settings()));

        Self {
            config: Arc::new(config.clone()),
            engine: DedupEngine::new(store.clone(), media.clone(), scorer),
            cases: CaseBook::new(store.clone(), summarizer),
            store,
            media,
        }
    }
}
