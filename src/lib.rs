pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

use crate::application::context::ContextAssembler;
use crate::application::memory_inspect::{MemoryInspectUseCase, TierStats};
use crate::application::pipeline::{BackfillRequest, BackfillSummary, PipelineDriver, PipelineReport, PipelineRequest};
use crate::application::rate_limit::RateLimiter;
use crate::application::retrieval::RetrievalOrchestrator;
use crate::application::stages::StageRunner;
use crate::config::{Config, PipelineConfig};
use crate::domain::entities::memory_record::{MemoryHit, MemoryRecord};
use crate::domain::error::DomainError;
use crate::domain::ports::decision_journal::DecisionJournal;
use crate::domain::ports::embedding_port::EmbeddingProvider;
use crate::domain::ports::language_model::LanguageModel;
use crate::domain::ports::market_data::MarketDataSource;
use crate::domain::ports::memory_store::MemoryStores;
use crate::domain::values::memory_tier::MemoryTier;
use crate::infrastructure::embeddings::gemini::GeminiEmbeddingProvider;
use crate::infrastructure::embeddings::noop::NoopProvider;
use crate::infrastructure::embeddings::openai::OpenAiProvider;
use crate::infrastructure::llm::gemini::GeminiModel;
use crate::infrastructure::sqlite::market_repo::SqliteMarketData;
use crate::infrastructure::sqlite::memory_store::SqliteMemoryStore;
use crate::infrastructure::sqlite::migrations::run_migrations;
use rusqlite::Connection;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

pub struct FinAgent {
    market_data: Arc<SqliteMarketData>,
    stores: MemoryStores,
    driver: Arc<PipelineDriver>,
    inspect_uc: MemoryInspectUseCase,
    pipeline_config: PipelineConfig,
}

impl FinAgent {
    pub fn new(config: &Config) -> Result<Self, DomainError> {
        let api_key = config.embedding.api_key.clone().unwrap_or_default();
        let model = config.embedding.model.clone();

        let embedder: Arc<dyn EmbeddingProvider> = match config.embedding.provider.as_str() {
            "openai" => Arc::new(OpenAiProvider::new(api_key, model, None)),
            "gemini" => Arc::new(GeminiEmbeddingProvider::new(api_key, model, config.model.base_url.clone())),
            _ => Arc::new(NoopProvider),
        };
        let llm: Arc<dyn LanguageModel> = Arc::new(GeminiModel::new(
            config.model.api_key.clone().unwrap_or_default(),
            config.model.base_url.clone(),
        ));

        Self::with_providers(&config.db_path, embedder, llm, config.pipeline.clone())
    }

    pub fn with_providers(
        db_path: &str,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LanguageModel>,
        pipeline_config: PipelineConfig,
    ) -> Result<Self, DomainError> {
        pipeline_config.validate()?;

        let market_data = Arc::new(SqliteMarketData::new(open_connection(db_path)?));
        let market_store = SqliteMemoryStore::new(open_connection(db_path)?, embedder.clone(), MemoryTier::Market);
        let price_store =
            SqliteMemoryStore::new(open_connection(db_path)?, embedder.clone(), MemoryTier::PriceReflection);
        let decision_store =
            SqliteMemoryStore::new(open_connection(db_path)?, embedder.clone(), MemoryTier::DecisionReflection);

        let provider_dim = embedder.dimension();
        if provider_dim > 0 {
            for store in [&market_store, &price_store, &decision_store] {
                if let Ok(Some(stored_dim)) = store.stored_dimension() {
                    if stored_dim != provider_dim {
                        tracing::warn!(
                            stored_dim,
                            provider_dim,
                            "stored memory vectors do not match the embedding provider; affected records fall back to lexical scoring"
                        );
                        break;
                    }
                }
            }
        }

        let stores = MemoryStores {
            market: Arc::new(market_store),
            price: Arc::new(price_store),
            decision: Arc::new(decision_store),
        };

        let data_source: Arc<dyn MarketDataSource> = market_data.clone();
        let journal: Arc<dyn DecisionJournal> = market_data.clone();
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(pipeline_config.min_call_interval_ms)));

        let driver = PipelineDriver::new(
            ContextAssembler::new(data_source.clone(), journal.clone()),
            RetrievalOrchestrator::new(stores.clone(), pipeline_config.retrieval.clone()),
            StageRunner::new(llm, stores.clone(), limiter, &pipeline_config),
            journal,
            data_source,
            pipeline_config.clone(),
        );

        Ok(Self {
            market_data,
            inspect_uc: MemoryInspectUseCase::new(stores.clone()),
            stores,
            driver: Arc::new(driver),
            pipeline_config,
        })
    }

    /// Loader-side access to the relational tables.
    pub fn market_data(&self) -> &SqliteMarketData {
        &self.market_data
    }

    pub fn stores(&self) -> &MemoryStores {
        &self.stores
    }

    pub fn pipeline_config(&self) -> &PipelineConfig {
        &self.pipeline_config
    }

    pub async fn run(&self, request: PipelineRequest) -> PipelineReport {
        self.driver.run(request).await
    }

    pub async fn backfill(
        &self,
        request: BackfillRequest,
        cancel: Arc<AtomicBool>,
    ) -> Result<Vec<BackfillSummary>, DomainError> {
        self.driver.backfill(request, cancel).await
    }

    pub fn memory_stats(&self) -> Result<Vec<TierStats>, DomainError> {
        self.inspect_uc.stats()
    }

    pub fn memory_peek(&self, tier: MemoryTier, limit: usize) -> Result<Vec<MemoryRecord>, DomainError> {
        self.inspect_uc.peek(tier, limit)
    }

    pub async fn memory_search(&self, tier: MemoryTier, query: &str, limit: usize) -> Result<Vec<MemoryHit>, DomainError> {
        self.inspect_uc.search(tier, query, limit).await
    }
}

fn open_connection(db_path: &str) -> Result<Connection, DomainError> {
    let conn = Connection::open(db_path).map_err(|e| DomainError::Database(format!("DB error: {e}")))?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| DomainError::Database(format!("WAL error: {e}")))?;
    conn.busy_timeout(Duration::from_secs(5))
        .map_err(|e| DomainError::Database(format!("Busy timeout error: {e}")))?;
    run_migrations(&conn)?;
    Ok(conn)
}
