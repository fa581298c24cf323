mod common;

use common::*;
use finagent::application::pipeline::PipelineRequest;
use finagent::application::retrieval::{RetrievalOrchestrator, NO_HISTORY};
use finagent::config::RetrievalConfig;
use finagent::domain::entities::memory_record::{MemoryRecord, META_DURATION};
use finagent::domain::ports::memory_store::{MemoryQuery, MemoryStore, MetadataFilter};
use finagent::domain::values::account::AccountStatus;
use finagent::domain::values::horizon::Horizon;
use finagent::domain::values::memory_tier::MemoryTier;
use std::sync::Arc;

fn market_record(date: chrono::NaiveDate, sub: &str, duration: &str, content: &str) -> MemoryRecord {
    MemoryRecord::new(MemoryTier::Market, "HPG", date, sub, content.to_string()).with_meta(META_DURATION, duration)
}

async fn seed_market_memory(agent: &finagent::FinAgent) {
    let d = day(2024, 1, 10);
    agent
        .stores()
        .market
        .upsert(&[
            market_record(d, "overall", "OVERALL", "HPG overall steel outlook cautious"),
            market_record(d, "short_term", "SHORT-TERM", "HPG steel price decline after export tariff"),
            market_record(d, "medium_term", "MEDIUM-TERM", "HPG construction demand slowdown in Q1"),
            market_record(d, "long_term", "LONG-TERM", "HPG Dung Quat capacity expansion"),
        ])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_diversified_retrieval_returns_one_per_horizon() {
    let (agent, _model) = setup();
    seed_market_memory(&agent).await;
    let retrieval = RetrievalOrchestrator::new(agent.stores().clone(), RetrievalConfig::default());

    let queries = vec![
        (Horizon::ShortTerm, "steel price decline".to_string()),
        (Horizon::MediumTerm, "steel price decline".to_string()),
        (Horizon::LongTerm, "steel price decline".to_string()),
    ];
    let text = retrieval.market_history(day(2024, 1, 15), &queries).await;
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("- [2024-01-10 | SHORT-TERM] HPG steel price decline"));
    assert!(lines[1].starts_with("- [2024-01-10 | MEDIUM-TERM] HPG construction demand"));
    assert!(lines[2].starts_with("- [2024-01-10 | LONG-TERM] HPG Dung Quat"));
    assert!(!text.contains("OVERALL"));
}

#[tokio::test]
async fn test_retrieval_never_looks_ahead() {
    let (agent, _model) = setup();
    seed_market_memory(&agent).await;
    let retrieval = RetrievalOrchestrator::new(agent.stores().clone(), RetrievalConfig::default());

    let queries = vec![(Horizon::ShortTerm, "steel".to_string())];
    assert_eq!(retrieval.market_history(day(2024, 1, 10), &queries).await, NO_HISTORY);
    assert_eq!(
        retrieval
            .reflection_history(MemoryTier::PriceReflection, day(2024, 1, 15), "steel")
            .await,
        NO_HISTORY
    );
    assert_eq!(retrieval.market_history(day(2024, 1, 15), &[]).await, NO_HISTORY);
}

#[tokio::test]
async fn test_reflection_history_top_k() {
    let (agent, _model) = setup();
    let records: Vec<MemoryRecord> = (1..=4)
        .map(|d| {
            MemoryRecord::new(
                MemoryTier::PriceReflection,
                "HPG",
                day(2024, 1, d),
                "reasoning",
                format!("HPG price reasoning day {d}: steel demand weak"),
            )
        })
        .collect();
    agent.stores().price.upsert(&records).await.unwrap();

    let retrieval = RetrievalOrchestrator::new(agent.stores().clone(), RetrievalConfig::default());
    let text = retrieval
        .reflection_history(MemoryTier::PriceReflection, day(2024, 1, 15), "steel demand")
        .await;
    assert_eq!(text.lines().count(), 2);
    // Equal scores fall back to the most recent records.
    assert!(text.lines().next().unwrap().starts_with("- [2024-01-04]"));
}

#[tokio::test]
async fn test_query_filters_and_ranking() {
    let (agent, _model) = setup();
    seed_market_memory(&agent).await;

    let hits = agent
        .stores()
        .market
        .query(&MemoryQuery {
            text: "Dung Quat capacity".into(),
            top_k: 10,
            filter: MetadataFilter::default(),
        })
        .await
        .unwrap();
    assert_eq!(hits.len(), 4);
    assert_eq!(hits[0].record.meta(META_DURATION), Some("LONG-TERM"));
    assert!(hits[0].score > hits[1].score);

    let filtered = agent
        .stores()
        .market
        .query(&MemoryQuery {
            text: "anything".into(),
            top_k: 10,
            filter: MetadataFilter::default().eq(META_DURATION, "OVERALL"),
        })
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].record.id, "HPG_2024-01-10_market_overall");
}

#[tokio::test]
async fn test_upsert_rejects_wrong_tier() {
    let (agent, _model) = setup();
    let rec = MemoryRecord::new(MemoryTier::Market, "HPG", day(2024, 1, 10), "overall", "x".into());
    assert!(agent.stores().price.upsert(&[rec]).await.is_err());
    assert_eq!(agent.stores().price.count().unwrap(), 0);
}

#[tokio::test]
async fn test_memory_inspection() {
    let (agent, _model) = setup();
    seed_market_memory(&agent).await;

    let stats = agent.memory_stats().unwrap();
    assert_eq!(stats[0].collection, "market_memory");
    assert_eq!(stats[0].count, 4);

    let peeked = agent.memory_peek(MemoryTier::Market, 2).unwrap();
    assert_eq!(peeked.len(), 2);

    let hits = agent.memory_search(MemoryTier::Market, "construction demand", 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.id, "HPG_2024-01-10_market_medium_term");

    assert!(agent.memory_search(MemoryTier::Market, "  ", 1).await.is_err());
}

#[tokio::test]
async fn test_memory_persists_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("finagent.db");
    let path = path.to_str().unwrap();

    {
        let model = Arc::new(ScriptedModel::new());
        let agent = setup_with(path, model);
        seed_hpg(&agent);
        agent
            .run(PipelineRequest {
                symbol: "HPG".into(),
                date: day(2024, 1, 12),
                account: AccountStatus::new(100_000_000.0, 0).unwrap(),
                chart: None,
            })
            .await;
    }

    let model = Arc::new(ScriptedModel::new());
    let agent = setup_with(path, model.clone());
    let counts: Vec<usize> = agent.memory_stats().unwrap().iter().map(|s| s.count).collect();
    assert_eq!(counts, vec![4, 1, 1]);

    agent
        .run(PipelineRequest {
            symbol: "HPG".into(),
            date: day(2024, 1, 15),
            account: AccountStatus::new(100_000_000.0, 0).unwrap(),
            chart: None,
        })
        .await;

    let synthesis = model.last_prompt(StageKey::Synthesis);
    assert!(synthesis.contains("- [2024-01-12 | SHORT-TERM]"));
    let high = model.last_prompt(StageKey::HighLevel);
    assert!(high.contains("- [2024-01-12] HPG on 2024-01-12 price reasoning"));
    assert!(high.contains("- [2024-01-12] HOLD at 26.5"));
    assert!(model
        .last_prompt(StageKey::Decision)
        .contains("- [2024-01-12] HPG on 2024-01-12 trading reflection"));
}
