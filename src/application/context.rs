use crate::application::indicators::{momentum_label, pct_change, rsi, sma};
use crate::domain::entities::market_data::PriceBar;
use crate::domain::ports::decision_journal::DecisionJournal;
use crate::domain::ports::market_data::MarketDataSource;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

pub const NO_PRICE_DATA: &str = "No price data.";
pub const NO_FINANCIALS: &str = "No financial report data available.";
pub const NO_PAST_DECISIONS: &str = "No past decisions recorded.";

const MAX_NEWS: usize = 5;
const PRICE_ACTION_BARS: usize = 30;
const SIGNAL_BARS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Increase,
    Decrease,
    Sideway,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trend::Increase => "Increase",
            Trend::Decrease => "Decrease",
            Trend::Sideway => "Sideway",
        };
        write!(f, "{s}")
    }
}

/// Percent moves against 1, 5 and 20 trading days back.
#[derive(Debug, Clone, Serialize)]
pub struct PriceMovements {
    pub short_term: f64,
    pub medium_term: f64,
    pub long_term: f64,
    pub short_term_desc: Trend,
}

impl PriceMovements {
    /// `bars` newest first. A missing comparison bar compares the close with itself.
    pub fn from_bars(bars: &[PriceBar]) -> Option<Self> {
        let p0 = bars.first()?.close;
        let back = |n: usize| bars.get(n).map(|b| b.close).unwrap_or(p0);
        let (p1, p5, p20) = (back(1), back(5), back(20));
        let short_term_desc = if p0 > p1 {
            Trend::Increase
        } else if p0 < p1 {
            Trend::Decrease
        } else {
            Trend::Sideway
        };
        Some(Self {
            short_term: pct_change(p0, p1),
            medium_term: pct_change(p0, p5),
            long_term: pct_change(p0, p20),
            short_term_desc,
        })
    }

    pub fn render(&self) -> String {
        format!(
            "- Short-term (1 trading day): {:.2}%\n- Medium-term (5 trading days): {:.2}%\n- Long-term (20 trading days): {:.2}%\n- Short-term direction: {}",
            self.short_term, self.medium_term, self.long_term, self.short_term_desc
        )
    }
}

/// Read-only text views over the market database for one symbol/date.
/// Data-source failures are logged and rendered as the sentinel text.
pub struct ContextAssembler {
    data: Arc<dyn MarketDataSource>,
    journal: Arc<dyn DecisionJournal>,
}

impl ContextAssembler {
    pub fn new(data: Arc<dyn MarketDataSource>, journal: Arc<dyn DecisionJournal>) -> Self {
        Self { data, journal }
    }

    pub fn fetch_news(&self, symbol: &str, date: NaiveDate, lookback_days: i64) -> String {
        let sentinel = format!("No specific news found for {symbol} in the last {lookback_days} days.");
        let from = (date - Duration::days(lookback_days)).and_time(NaiveTime::MIN);
        let to = date.and_hms_opt(23, 59, 59).unwrap_or_else(|| date.and_time(NaiveTime::MIN));

        let items = match self.data.news_between(symbol, from, to, MAX_NEWS) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(symbol, %date, error = %e, "news lookup failed");
                return sentinel;
            }
        };
        if items.is_empty() {
            return sentinel;
        }
        items
            .iter()
            .map(|n| format!("- [{}] {}: {}", n.published_at.format("%Y-%m-%d %H:%M"), n.title, n.excerpt()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn fetch_financials(&self, symbol: &str, date: NaiveDate) -> String {
        let report = match self.data.latest_financials(symbol, date.year()) {
            Ok(Some(report)) => report,
            Ok(None) => return NO_FINANCIALS.to_string(),
            Err(e) => {
                tracing::warn!(symbol, %date, error = %e, "financials lookup failed");
                return NO_FINANCIALS.to_string();
            }
        };

        let mut lines = vec![format!("**Report Period: {}**", report.label())];
        let metrics = [
            ("Revenue", report.revenue),
            ("Net Income", report.net_income),
            ("Gross Profit", report.gross_profit),
            ("Total Assets", report.total_assets),
            ("Total Equity", report.total_equity),
            ("Total Debt", report.total_debt),
        ];
        for (label, value) in metrics {
            if let Some(v) = value {
                lines.push(format!("- {label}: {v} VND"));
            }
        }
        lines.join("\n")
    }

    pub fn fetch_price_action(&self, symbol: &str, date: NaiveDate) -> String {
        let bars = self.bars(symbol, date, PRICE_ACTION_BARS);
        let Some(today) = bars.first() else {
            return NO_PRICE_DATA.to_string();
        };
        let prev = bars.get(1).unwrap_or(today);
        let change = today.close - prev.close;

        let mut lines = vec![
            format!("- Close Price: {}", today.close),
            format!("- Daily Change: {:.2} ({:.2}%)", change, pct_change(today.close, prev.close)),
        ];
        if let Some(volume) = today.volume {
            lines.push(format!("- Volume: {volume}"));
        }
        if let Some(week_ago) = bars.get(6) {
            lines.push(format!("- 7-Day Trend: {:.2}%", pct_change(today.close, week_ago.close)));
        }
        lines.join("\n")
    }

    pub fn price_movements(&self, symbol: &str, date: NaiveDate) -> Option<PriceMovements> {
        PriceMovements::from_bars(&self.bars(symbol, date, 21))
    }

    pub fn technical_signals(&self, symbol: &str, date: NaiveDate) -> String {
        let mut bars = self.bars(symbol, date, SIGNAL_BARS);
        if bars.is_empty() {
            return NO_PRICE_DATA.to_string();
        }
        bars.reverse();
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let last = closes[closes.len() - 1];

        let mut lines = Vec::new();
        if let Some(v) = sma(&closes, 5) {
            lines.push(format!("- SMA(5): {v:.2} (close is {} it)", above_below(last, v)));
        }
        if let Some(v) = sma(&closes, 20) {
            lines.push(format!("- SMA(20): {v:.2} (close is {} it)", above_below(last, v)));
        }
        if let Some(v) = rsi(&closes, 14) {
            let zone = if v >= 70.0 {
                "overbought"
            } else if v <= 30.0 {
                "oversold"
            } else {
                "neutral"
            };
            lines.push(format!("- RSI(14): {v:.1} ({zone})"));
        }
        let base = closes[closes.len().saturating_sub(6)];
        lines.push(format!("- Momentum (5 days): {}", momentum_label(pct_change(last, base))));
        lines.join("\n")
    }

    /// Close on or before `date`; `None` when the symbol has no bars yet.
    pub fn current_price(&self, symbol: &str, date: NaiveDate) -> Option<f64> {
        self.bars(symbol, date, 1).first().map(|b| b.close)
    }

    /// Most recent journaled decisions strictly before `date`, with realized outcomes.
    pub fn past_decisions(&self, symbol: &str, date: NaiveDate, window: usize) -> String {
        if window == 0 {
            return NO_PAST_DECISIONS.to_string();
        }
        let entries = match self.journal.recent(symbol, date, window) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(symbol, %date, error = %e, "decision journal lookup failed");
                return NO_PAST_DECISIONS.to_string();
            }
        };
        if entries.is_empty() {
            return NO_PAST_DECISIONS.to_string();
        }
        let current = self.current_price(symbol, date);
        entries
            .iter()
            .map(|d| {
                let price = d
                    .reference_price
                    .map(|p| format!(" at {p}"))
                    .unwrap_or_default();
                format!(
                    "- [{}] {}{}: {}. Reason: {}",
                    d.date.format("%Y-%m-%d"),
                    d.action,
                    price,
                    d.outcome_text(current),
                    d.reasoning
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn bars(&self, symbol: &str, date: NaiveDate, limit: usize) -> Vec<PriceBar> {
        self.data.price_bars(symbol, date, limit).unwrap_or_else(|e| {
            tracing::warn!(symbol, %date, error = %e, "price lookup failed");
            vec![]
        })
    }
}

fn above_below(price: f64, level: f64) -> &'static str {
    if price >= level {
        "above"
    } else {
        "below"
    }
}
