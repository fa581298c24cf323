mod common;

use common::*;
use finagent::application::context::{ContextAssembler, Trend, NO_PAST_DECISIONS, NO_PRICE_DATA};
use finagent::domain::entities::decision::DecisionEntry;
use finagent::domain::entities::market_data::NewsItem;
use finagent::domain::ports::decision_journal::DecisionJournal;
use finagent::domain::values::trade_action::TradeAction;
use finagent::infrastructure::sqlite::market_repo::SqliteMarketData;
use finagent::infrastructure::sqlite::migrations::run_migrations;
use rusqlite::Connection;
use std::sync::Arc;

fn assembler() -> (ContextAssembler, Arc<SqliteMarketData>) {
    let conn = Connection::open_in_memory().unwrap();
    run_migrations(&conn).unwrap();
    let data = Arc::new(SqliteMarketData::new(conn));
    (ContextAssembler::new(data.clone(), data.clone()), data)
}

fn news(symbol: Option<&str>, published: chrono::NaiveDateTime, title: &str) -> NewsItem {
    NewsItem {
        symbol: symbol.map(String::from),
        published_at: published,
        title: title.to_string(),
        summary: None,
        content: Some("x".repeat(200)),
    }
}

#[test]
fn test_news_window_and_limit() {
    let (ctx, data) = assembler();
    for d in 5..=14 {
        data.insert_news(&news(Some("HPG"), at(2024, 1, d, 8, 0), &format!("HPG day {d}"))).unwrap();
    }
    data.insert_news(&news(None, at(2024, 1, 15, 23, 0), "Market-wide close")).unwrap();
    data.insert_news(&news(Some("VNM"), at(2024, 1, 15, 10, 0), "Dairy news")).unwrap();
    data.insert_news(&news(Some("HPG"), at(2024, 1, 16, 8, 0), "Future news")).unwrap();

    let text = ctx.fetch_news("HPG", day(2024, 1, 15), 7);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("- [2024-01-15 23:00] Market-wide close: "));
    assert!(lines[1].starts_with("- [2024-01-14 08:00] HPG day 14: "));
    assert!(lines[1].ends_with(&format!("{}...", "x".repeat(150))));
    assert!(!text.contains("Dairy"));
    assert!(!text.contains("Future"));
}

#[test]
fn test_news_sentinel() {
    let (ctx, _data) = assembler();
    assert_eq!(
        ctx.fetch_news("HPG", day(2024, 1, 15), 3),
        "No specific news found for HPG in the last 3 days."
    );
}

#[test]
fn test_price_action_format() {
    let (ctx, data) = assembler();
    let closes = [20.0, 20.5, 21.0, 21.5, 22.0, 22.5, 23.0];
    for (i, close) in closes.iter().enumerate() {
        data.upsert_price_bar(&bar("HPG", day(2024, 1, 2 + i as u32), *close)).unwrap();
    }

    let text = ctx.fetch_price_action("HPG", day(2024, 1, 8));
    assert!(text.contains("- Close Price: 23"));
    assert!(text.contains("- Daily Change: 0.50 (2.22%)"));
    assert!(text.contains("- Volume: 1000000"));
    assert!(text.contains("- 7-Day Trend: 15.00%"));

    let short = ctx.fetch_price_action("HPG", day(2024, 1, 2));
    assert!(short.contains("- Daily Change: 0.00 (0.00%)"));
    assert!(!short.contains("7-Day Trend"));

    assert_eq!(ctx.fetch_price_action("HPG", day(2023, 12, 1)), NO_PRICE_DATA);
}

#[test]
fn test_price_movements_for_hpg() {
    let (ctx, data) = assembler();
    data.upsert_price_bar(&bar("HPG", day(2024, 1, 12), 26.5)).unwrap();
    data.upsert_price_bar(&bar("HPG", day(2024, 1, 15), 26.0)).unwrap();

    let m = ctx.price_movements("HPG", day(2024, 1, 15)).unwrap();
    assert_eq!(m.short_term_desc, Trend::Decrease);
    assert!((m.short_term - (-1.8867924528)).abs() < 1e-6);
    assert_eq!(m.medium_term, 0.0);
    assert!(ctx.price_movements("VNM", day(2024, 1, 15)).is_none());
}

#[test]
fn test_technical_signals() {
    let (ctx, data) = assembler();
    assert_eq!(ctx.technical_signals("HPG", day(2024, 1, 15)), NO_PRICE_DATA);

    for i in 0..25u32 {
        let date = day(2024, 1, 1) + chrono::Duration::days(i as i64);
        data.upsert_price_bar(&bar("HPG", date, 20.0 + i as f64)).unwrap();
    }
    let text = ctx.technical_signals("HPG", day(2024, 1, 25));
    assert!(text.contains("- SMA(5): 42.00 (close is above it)"));
    assert!(text.contains("- SMA(20): 34.50"));
    assert!(text.contains("- RSI(14): 100.0 (overbought)"));
    assert!(text.contains("- Momentum (5 days): strong upward"));

    let sparse = ctx.technical_signals("HPG", day(2024, 1, 3));
    assert!(!sparse.contains("SMA(5)"));
    assert!(sparse.contains("Momentum"));
}

#[test]
fn test_past_decisions_with_outcomes() {
    let (ctx, data) = assembler();
    assert_eq!(ctx.past_decisions("HPG", day(2024, 1, 15), 5), NO_PAST_DECISIONS);

    data.upsert_price_bar(&bar("HPG", day(2024, 1, 15), 22.0)).unwrap();
    data.record(&DecisionEntry::new("HPG", day(2024, 1, 10), TradeAction::Buy, Some(20.0), "Breakout".into()))
        .unwrap();
    data.record(&DecisionEntry::new("HPG", day(2024, 1, 11), TradeAction::Sell, None, "Take profit".into()))
        .unwrap();
    data.record(&DecisionEntry::new("HPG", day(2024, 1, 15), TradeAction::Hold, Some(22.0), "Same day".into()))
        .unwrap();

    let text = ctx.past_decisions("HPG", day(2024, 1, 15), 5);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "- [2024-01-11] SELL: Outcome unknown. Reason: Take profit");
    assert_eq!(lines[1], "- [2024-01-10] BUY at 20: +10.00% since decision (gain). Reason: Breakout");

    assert_eq!(ctx.past_decisions("HPG", day(2024, 1, 15), 1).lines().count(), 1);
}

#[test]
fn test_financials_pick_latest_period_up_to_year() {
    let (ctx, data) = assembler();
    for (year, period) in [(2022, 4), (2023, 2), (2023, 3), (2024, 1)] {
        data.upsert_financials(&finagent::domain::entities::market_data::FinancialPeriod {
            symbol: "HPG".into(),
            year,
            period,
            total_debt: Some(100),
            ..Default::default()
        })
        .unwrap();
    }
    let text = ctx.fetch_financials("HPG", day(2023, 12, 31));
    assert!(text.starts_with("**Report Period: Q3/2023**"));
    assert!(text.contains("- Total Debt: 100 VND"));
    assert_eq!(ctx.fetch_financials("HPG", day(2021, 6, 1)), "No financial report data available.");
}
