use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A news article. `symbol == None` marks market-wide news.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub symbol: Option<String>,
    pub published_at: NaiveDateTime,
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
}

impl NewsItem {
    /// Summary if present, otherwise the first 150 characters of the body.
    pub fn excerpt(&self) -> String {
        if let Some(summary) = self.summary.as_deref().filter(|s| !s.trim().is_empty()) {
            return summary.to_string();
        }
        match self.content.as_deref() {
            Some(body) if !body.is_empty() => {
                let head: String = body.chars().take(150).collect();
                format!("{head}...")
            }
            _ => String::new(),
        }
    }
}

/// One published financial-statement period. `period` 1..=4 is a quarter;
/// 0 or 5 is the full-year report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinancialPeriod {
    pub symbol: String,
    pub year: i32,
    pub period: i32,
    pub revenue: Option<i64>,
    pub net_income: Option<i64>,
    pub gross_profit: Option<i64>,
    pub total_assets: Option<i64>,
    pub total_equity: Option<i64>,
    pub total_debt: Option<i64>,
}

impl FinancialPeriod {
    pub fn label(&self) -> String {
        match self.period {
            1..=4 => format!("Q{}/{}", self.period, self.year),
            _ => format!("FY{}", self.year),
        }
    }
}

/// Daily trading bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub close: f64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<i64>,
}
