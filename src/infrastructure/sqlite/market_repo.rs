use crate::domain::entities::decision::DecisionEntry;
use crate::domain::entities::market_data::{FinancialPeriod, NewsItem, PriceBar};
use crate::domain::error::DomainError;
use crate::domain::ports::decision_journal::DecisionJournal;
use crate::domain::ports::market_data::MarketDataSource;
use crate::domain::values::trade_action::TradeAction;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use std::sync::Mutex;

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

const FINANCIAL_COLS: &str =
    "symbol, year, period, revenue, net_income, gross_profit, total_assets, total_equity, total_debt";

/// Relational market data plus the decision journal, sharing one connection.
pub struct SqliteMarketData {
    conn: Mutex<Connection>,
}

impl SqliteMarketData {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn parse_date(s: &str) -> Result<NaiveDate, rusqlite::Error> {
        NaiveDate::parse_from_str(s, DATE_FMT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
    }

    fn row_to_news(row: &rusqlite::Row) -> Result<NewsItem, rusqlite::Error> {
        let published: String = row.get(1)?;
        Ok(NewsItem {
            symbol: row.get(0)?,
            published_at: NaiveDateTime::parse_from_str(&published, DATETIME_FMT).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
            })?,
            title: row.get(2)?,
            summary: row.get(3)?,
            content: row.get(4)?,
        })
    }

    fn row_to_financials(row: &rusqlite::Row) -> Result<FinancialPeriod, rusqlite::Error> {
        Ok(FinancialPeriod {
            symbol: row.get(0)?,
            year: row.get(1)?,
            period: row.get(2)?,
            revenue: row.get(3)?,
            net_income: row.get(4)?,
            gross_profit: row.get(5)?,
            total_assets: row.get(6)?,
            total_equity: row.get(7)?,
            total_debt: row.get(8)?,
        })
    }

    fn row_to_bar(row: &rusqlite::Row) -> Result<PriceBar, rusqlite::Error> {
        let date: String = row.get(1)?;
        Ok(PriceBar {
            symbol: row.get(0)?,
            date: Self::parse_date(&date)?,
            close: row.get(2)?,
            open: row.get(3)?,
            high: row.get(4)?,
            low: row.get(5)?,
            volume: row.get(6)?,
        })
    }

    fn row_to_decision(row: &rusqlite::Row) -> Result<DecisionEntry, rusqlite::Error> {
        let date: String = row.get(1)?;
        let action_str: String = row.get(2)?;
        let recorded_str: String = row.get(5)?;
        Ok(DecisionEntry {
            symbol: row.get(0)?,
            date: Self::parse_date(&date)?,
            action: action_str.parse().unwrap_or_else(|_| {
                tracing::warn!(action = %action_str, "invalid action in decision journal, reading as HOLD");
                TradeAction::Hold
            }),
            reference_price: row.get(3)?,
            reasoning: row.get(4)?,
            recorded_at: DateTime::parse_from_rfc3339(&recorded_str)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(|_| chrono::Utc::now()),
        })
    }

    // Writers below belong to the data-loading side, not the pipeline.

    pub fn insert_news(&self, item: &NewsItem) -> Result<(), DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        conn.execute(
            "INSERT INTO news (symbol, published_at, title, summary, content) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                item.symbol.as_ref().map(|s| s.to_uppercase()),
                item.published_at.format(DATETIME_FMT).to_string(),
                item.title,
                item.summary,
                item.content,
            ],
        )
        .map_err(|e| DomainError::Database(format!("Failed to add news: {e}")))?;
        Ok(())
    }

    pub fn upsert_financials(&self, fp: &FinancialPeriod) -> Result<(), DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        conn.execute(
            &format!("INSERT OR REPLACE INTO financial_periods ({FINANCIAL_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            params![
                fp.symbol.to_uppercase(),
                fp.year,
                fp.period,
                fp.revenue,
                fp.net_income,
                fp.gross_profit,
                fp.total_assets,
                fp.total_equity,
                fp.total_debt,
            ],
        )
        .map_err(|e| DomainError::Database(format!("Failed to add financials: {e}")))?;
        Ok(())
    }

    pub fn upsert_price_bar(&self, bar: &PriceBar) -> Result<(), DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO price_bars (symbol, date, close, open, high, low, volume) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                bar.symbol.to_uppercase(),
                bar.date.format(DATE_FMT).to_string(),
                bar.close,
                bar.open,
                bar.high,
                bar.low,
                bar.volume,
            ],
        )
        .map_err(|e| DomainError::Database(format!("Failed to add price bar: {e}")))?;
        Ok(())
    }
}

impl MarketDataSource for SqliteMarketData {
    fn news_between(
        &self,
        symbol: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
        limit: usize,
    ) -> Result<Vec<NewsItem>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, published_at, title, summary, content FROM news
                 WHERE published_at >= ?1 AND published_at <= ?2 AND (symbol IS NULL OR symbol = ?3)
                 ORDER BY published_at DESC LIMIT ?4",
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let items = stmt
            .query_map(
                params![
                    from.format(DATETIME_FMT).to_string(),
                    to.format(DATETIME_FMT).to_string(),
                    symbol.to_uppercase(),
                    limit as i64
                ],
                Self::row_to_news,
            )
            .map_err(|e| DomainError::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(items)
    }

    fn latest_financials(&self, symbol: &str, max_year: i32) -> Result<Option<FinancialPeriod>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let sql = format!(
            "SELECT {FINANCIAL_COLS} FROM financial_periods WHERE symbol = ?1 AND year <= ?2
             ORDER BY year DESC, period DESC LIMIT 1"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let mut rows = stmt
            .query_map(params![symbol.to_uppercase(), max_year], Self::row_to_financials)
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(rows.next().and_then(|r| r.ok()))
    }

    fn price_bars(&self, symbol: &str, until: NaiveDate, limit: usize) -> Result<Vec<PriceBar>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, date, close, open, high, low, volume FROM price_bars
                 WHERE symbol = ?1 AND date <= ?2 ORDER BY date DESC LIMIT ?3",
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let bars = stmt
            .query_map(
                params![symbol.to_uppercase(), until.format(DATE_FMT).to_string(), limit as i64],
                Self::row_to_bar,
            )
            .map_err(|e| DomainError::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(bars)
    }

    fn has_bar_on(&self, symbol: &str, date: NaiveDate) -> Result<bool, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM price_bars WHERE symbol = ?1 AND date = ?2",
                params![symbol.to_uppercase(), date.format(DATE_FMT).to_string()],
                |r| r.get(0),
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        Ok(count > 0)
    }
}

impl DecisionJournal for SqliteMarketData {
    fn record(&self, entry: &DecisionEntry) -> Result<(), DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO decisions (symbol, date, action, reference_price, reasoning, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.symbol.to_uppercase(),
                entry.date.format(DATE_FMT).to_string(),
                entry.action.to_string(),
                entry.reference_price,
                entry.reasoning,
                entry.recorded_at.to_rfc3339(),
            ],
        )
        .map_err(|e| DomainError::Database(format!("Failed to record decision: {e}")))?;
        Ok(())
    }

    fn recent(&self, symbol: &str, before: NaiveDate, limit: usize) -> Result<Vec<DecisionEntry>, DomainError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, date, action, reference_price, reasoning, recorded_at FROM decisions
                 WHERE symbol = ?1 AND date < ?2 ORDER BY date DESC LIMIT ?3",
            )
            .map_err(|e| DomainError::Database(e.to_string()))?;
        let entries = stmt
            .query_map(
                params![symbol.to_uppercase(), before.format(DATE_FMT).to_string(), limit as i64],
                Self::row_to_decision,
            )
            .map_err(|e| DomainError::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(entries)
    }
}
