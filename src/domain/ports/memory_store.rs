use crate::domain::entities::memory_record::{MemoryHit, MemoryRecord};
use crate::domain::error::DomainError;
use crate::domain::values::memory_tier::MemoryTier;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Restricts a memory query. Metadata pairs must match exactly; `before`
/// keeps only records dated strictly earlier.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub equals: BTreeMap<String, String>,
    pub before: Option<NaiveDate>,
}

impl MetadataFilter {
    pub fn eq(mut self, key: &str, value: impl Into<String>) -> Self {
        self.equals.insert(key.to_string(), value.into());
        self
    }

    pub fn before(mut self, date: NaiveDate) -> Self {
        self.before = Some(date);
        self
    }
}

#[derive(Debug, Clone)]
pub struct MemoryQuery {
    pub text: String,
    pub top_k: usize,
    pub filter: MetadataFilter,
}

/// One collection of the memory. Upserts overwrite by id.
#[async_trait::async_trait]
pub trait MemoryStore: Send + Sync {
    fn tier(&self) -> MemoryTier;

    /// Writes all records in one batch; either all land or none do.
    async fn upsert(&self, records: &[MemoryRecord]) -> Result<(), DomainError>;

    /// Up to `top_k` hits ordered by descending similarity.
    async fn query(&self, query: &MemoryQuery) -> Result<Vec<MemoryHit>, DomainError>;

    fn count(&self) -> Result<usize, DomainError>;

    /// Most recently dated records, newest first.
    fn peek(&self, limit: usize) -> Result<Vec<MemoryRecord>, DomainError>;
}

/// The three tier handles injected into the pipeline.
#[derive(Clone)]
pub struct MemoryStores {
    pub market: Arc<dyn MemoryStore>,
    pub price: Arc<dyn MemoryStore>,
    pub decision: Arc<dyn MemoryStore>,
}

impl MemoryStores {
    pub fn get(&self, tier: MemoryTier) -> &Arc<dyn MemoryStore> {
        match tier {
            MemoryTier::Market => &self.market,
            MemoryTier::PriceReflection => &self.price,
            MemoryTier::DecisionReflection => &self.decision,
        }
    }
}
