use crate::domain::values::memory_tier::MemoryTier;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const META_SYMBOL: &str = "symbol";
pub const META_DATE: &str = "date";
pub const META_TYPE: &str = "type";
pub const META_DURATION: &str = "duration";
pub const META_QUERY_TEXT: &str = "query_text";

/// One entry in a memory tier. The id is derived from
/// (symbol, date, tier, sub-category) so re-running a stage overwrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub tier: MemoryTier,
    pub content: String,
    pub metadata: BTreeMap<String, String>,
}

impl MemoryRecord {
    pub fn new(
        tier: MemoryTier,
        symbol: &str,
        date: NaiveDate,
        subcategory: &str,
        content: String,
    ) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(META_SYMBOL.to_string(), symbol.to_uppercase());
        metadata.insert(META_DATE.to_string(), date.format("%Y-%m-%d").to_string());
        metadata.insert(META_TYPE.to_string(), tier.to_string());
        Self {
            id: Self::make_id(symbol, date, tier, subcategory),
            tier,
            content,
            metadata,
        }
    }

    pub fn make_id(symbol: &str, date: NaiveDate, tier: MemoryTier, subcategory: &str) -> String {
        format!(
            "{}_{}_{}_{}",
            symbol.to_uppercase(),
            date.format("%Y-%m-%d"),
            tier,
            subcategory
        )
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn date(&self) -> &str {
        self.meta(META_DATE).unwrap_or("unknown date")
    }
}

/// A retrieved record and its similarity to the query (higher is closer).
#[derive(Debug, Clone, Serialize)]
pub struct MemoryHit {
    pub record: MemoryRecord,
    pub score: f64,
}
