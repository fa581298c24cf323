use crate::domain::error::DomainError;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<(), DomainError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS news (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            symbol TEXT,
            published_at TEXT NOT NULL,
            title TEXT NOT NULL,
            summary TEXT,
            content TEXT
        );

        CREATE TABLE IF NOT EXISTS financial_periods (
            symbol TEXT NOT NULL,
            year INTEGER NOT NULL,
            period INTEGER NOT NULL,
            revenue INTEGER,
            net_income INTEGER,
            gross_profit INTEGER,
            total_assets INTEGER,
            total_equity INTEGER,
            total_debt INTEGER,
            PRIMARY KEY (symbol, year, period)
        );

        CREATE TABLE IF NOT EXISTS price_bars (
            symbol TEXT NOT NULL,
            date TEXT NOT NULL,
            close REAL NOT NULL,
            open REAL,
            high REAL,
            low REAL,
            volume INTEGER,
            PRIMARY KEY (symbol, date)
        );

        CREATE TABLE IF NOT EXISTS decisions (
            symbol TEXT NOT NULL,
            date TEXT NOT NULL,
            action TEXT NOT NULL,
            reference_price REAL,
            reasoning TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            PRIMARY KEY (symbol, date)
        );

        CREATE TABLE IF NOT EXISTS memory_records (
            tier TEXT NOT NULL,
            id TEXT NOT NULL,
            content TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            record_date TEXT,
            vector BLOB,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (tier, id)
        );

        CREATE INDEX IF NOT EXISTS idx_news_published ON news(published_at);
        CREATE INDEX IF NOT EXISTS idx_news_symbol ON news(symbol);
        CREATE INDEX IF NOT EXISTS idx_memory_tier_date ON memory_records(tier, record_date);
        ",
    )
    .map_err(|e| DomainError::Database(format!("Migration failed: {e}")))
}
