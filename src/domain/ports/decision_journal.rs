use crate::domain::entities::decision::DecisionEntry;
use crate::domain::error::DomainError;
use chrono::NaiveDate;

pub trait DecisionJournal: Send + Sync {
    /// Keyed by (symbol, date); a re-run replaces the earlier entry.
    fn record(&self, entry: &DecisionEntry) -> Result<(), DomainError>;

    /// Most recent entries dated strictly before `before`, newest first.
    fn recent(&self, symbol: &str, before: NaiveDate, limit: usize) -> Result<Vec<DecisionEntry>, DomainError>;
}
