use crate::domain::entities::memory_record::{MemoryHit, MemoryRecord};
use crate::domain::error::DomainError;
use crate::domain::ports::memory_store::{MemoryQuery, MemoryStores, MetadataFilter};
use crate::domain::values::memory_tier::MemoryTier;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TierStats {
    pub tier: MemoryTier,
    pub collection: &'static str,
    pub count: usize,
}

/// Read-only views over the memory tiers for the `memory` command.
pub struct MemoryInspectUseCase {
    stores: MemoryStores,
}

impl MemoryInspectUseCase {
    pub fn new(stores: MemoryStores) -> Self {
        Self { stores }
    }

    pub fn stats(&self) -> Result<Vec<TierStats>, DomainError> {
        MemoryTier::ALL
            .iter()
            .map(|tier| {
                Ok(TierStats {
                    tier: *tier,
                    collection: tier.collection(),
                    count: self.stores.get(*tier).count()?,
                })
            })
            .collect()
    }

    pub fn peek(&self, tier: MemoryTier, limit: usize) -> Result<Vec<MemoryRecord>, DomainError> {
        self.stores.get(tier).peek(limit)
    }

    pub async fn search(&self, tier: MemoryTier, text: &str, limit: usize) -> Result<Vec<MemoryHit>, DomainError> {
        if text.trim().is_empty() {
            return Err(DomainError::InvalidInput("Search text must not be empty".into()));
        }
        let query = MemoryQuery {
            text: text.to_string(),
            top_k: limit,
            filter: MetadataFilter::default(),
        };
        self.stores.get(tier).query(&query).await
    }
}
