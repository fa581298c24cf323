use crate::domain::entities::market_data::{FinancialPeriod, NewsItem, PriceBar};
use crate::domain::error::DomainError;
use chrono::{NaiveDate, NaiveDateTime};

/// Read-only accessors over the relational market database.
pub trait MarketDataSource: Send + Sync {
    /// News for `symbol` or market-wide, within `[from, to]`, newest first.
    fn news_between(
        &self,
        symbol: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
        limit: usize,
    ) -> Result<Vec<NewsItem>, DomainError>;

    /// Latest period with `year <= max_year`, ordered by year then period.
    fn latest_financials(&self, symbol: &str, max_year: i32) -> Result<Option<FinancialPeriod>, DomainError>;

    /// Bars dated on or before `until`, newest first.
    fn price_bars(&self, symbol: &str, until: NaiveDate, limit: usize) -> Result<Vec<PriceBar>, DomainError>;

    fn has_bar_on(&self, symbol: &str, date: NaiveDate) -> Result<bool, DomainError>;
}
