use crate::config::RetrievalConfig;
use crate::domain::entities::memory_record::{MemoryHit, META_DURATION};
use crate::domain::ports::memory_store::{MemoryQuery, MemoryStores, MetadataFilter};
use crate::domain::values::horizon::Horizon;
use crate::domain::values::memory_tier::MemoryTier;
use chrono::NaiveDate;

pub const NO_HISTORY: &str = "No relevant history found.";

/// Turns stage outputs into memory queries and renders the hits as a
/// history block. Only records dated before the run date are visible.
pub struct RetrievalOrchestrator {
    stores: MemoryStores,
    config: RetrievalConfig,
}

impl RetrievalOrchestrator {
    pub fn new(stores: MemoryStores, config: RetrievalConfig) -> Self {
        Self { stores, config }
    }

    /// One search per horizon, each restricted to that horizon's bucket.
    pub async fn market_history(&self, date: NaiveDate, queries: &[(Horizon, String)]) -> String {
        let mut lines = Vec::new();
        for (horizon, text) in queries {
            if text.trim().is_empty() {
                continue;
            }
            let query = MemoryQuery {
                text: text.clone(),
                top_k: self.config.market_top_k,
                filter: MetadataFilter::default()
                    .eq(META_DURATION, horizon.label())
                    .before(date),
            };
            for hit in self.search(MemoryTier::Market, &query).await {
                lines.push(format!("- [{} | {}] {}", hit.record.date(), horizon.label(), hit.record.content));
            }
        }
        render(lines)
    }

    /// Single unfiltered search against the price or decision tier.
    pub async fn reflection_history(&self, tier: MemoryTier, date: NaiveDate, text: &str) -> String {
        if text.trim().is_empty() {
            return NO_HISTORY.to_string();
        }
        let query = MemoryQuery {
            text: text.to_string(),
            top_k: self.config.reflection_top_k,
            filter: MetadataFilter::default().before(date),
        };
        let lines = self
            .search(tier, &query)
            .await
            .into_iter()
            .map(|hit| format!("- [{}] {}", hit.record.date(), hit.record.content))
            .collect();
        render(lines)
    }

    async fn search(&self, tier: MemoryTier, query: &MemoryQuery) -> Vec<MemoryHit> {
        match self.stores.get(tier).query(query).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(%tier, error = %e, "memory retrieval unavailable, continuing without history");
                vec![]
            }
        }
    }
}

fn render(lines: Vec<String>) -> String {
    if lines.is_empty() {
        NO_HISTORY.to_string()
    } else {
        lines.join("\n")
    }
}
