mod common;

use common::*;
use finagent::application::pipeline::PipelineRequest;
use finagent::application::retrieval::NO_HISTORY;
use finagent::application::stages::UNAVAILABLE;
use finagent::domain::ports::decision_journal::DecisionJournal;
use finagent::domain::ports::language_model::ImageAttachment;
use finagent::domain::values::account::AccountStatus;
use finagent::domain::values::memory_tier::MemoryTier;
use finagent::domain::values::trade_action::TradeAction;
use std::sync::Arc;

fn request(cash: f64, position: u64) -> PipelineRequest {
    PipelineRequest {
        symbol: "HPG".into(),
        date: day(2024, 1, 15),
        account: AccountStatus::new(cash, position).unwrap(),
        chart: None,
    }
}

fn counts(agent: &finagent::FinAgent) -> Vec<usize> {
    agent.memory_stats().unwrap().iter().map(|s| s.count).collect()
}

#[tokio::test]
async fn test_hpg_sell_without_position_is_held() {
    let (agent, model) = setup();
    seed_hpg(&agent);

    let report = agent.run(request(100_000_000.0, 0)).await;

    assert_eq!(report.symbol, "HPG");
    assert_eq!(report.action, Some(TradeAction::Hold));
    let o = report.constraint_override.expect("override expected");
    assert_eq!(o.proposed, TradeAction::Sell);
    assert!(report.market_intelligence.is_some());
    assert!(report.price_reflection.is_some());
    assert!(report.decision_reflection.is_some());
    assert!(model.last_prompt(StageKey::LowLevel).contains("Short-term direction: Decrease"));
    assert_eq!(model.calls(), 5);

    let journal = agent.market_data().recent("HPG", day(2024, 1, 16), 5).unwrap();
    assert_eq!(journal.len(), 1);
    assert_eq!(journal[0].action, TradeAction::Hold);
    assert_eq!(journal[0].reference_price, Some(26.0));
}

#[tokio::test]
async fn test_buy_without_cash_is_held() {
    let (agent, model) = setup();
    seed_hpg(&agent);
    model.respond(
        StageKey::Decision,
        r#"{"analysis": "Oversold", "action": "BUY", "reasoning": "Bounce expected"}"#,
    );

    let report = agent.run(request(0.0, 0)).await;

    assert_eq!(report.action, Some(TradeAction::Hold));
    assert_eq!(report.constraint_override.unwrap().proposed, TradeAction::Buy);
    assert!(report.decision.unwrap().reasoning.contains("Overridden to HOLD"));
}

#[tokio::test]
async fn test_feasible_action_is_kept() {
    let (agent, model) = setup();
    seed_hpg(&agent);
    model.respond(
        StageKey::Decision,
        r#"{"analysis": "Oversold", "action": "buy", "reasoning": "Bounce expected"}"#,
    );

    let report = agent.run(request(1_000.0, 0)).await;

    assert_eq!(report.action, Some(TradeAction::Buy));
    assert!(report.constraint_override.is_none());
}

#[tokio::test]
async fn test_rerun_overwrites_memory() {
    let (agent, model) = setup();
    seed_hpg(&agent);

    agent.run(request(100_000_000.0, 0)).await;
    assert_eq!(counts(&agent), vec![4, 1, 1]);

    // The second run drops the medium-term query and changes the summary.
    model.respond(
        StageKey::Latest,
        r#"{"analysis": "Steel rebound", "summary": "Recovery in sight", "queries": {"short_term": "HPG steel rebound", "medium_term": "", "long_term": "HPG Dung Quat 2"}}"#,
    );
    model.respond(
        StageKey::Synthesis,
        r#"{"analysis": "Rebounds held before", "summary": "NEW summary"}"#,
    );
    agent.run(request(100_000_000.0, 0)).await;
    assert_eq!(counts(&agent), vec![4, 1, 1]);

    let market = agent.memory_peek(MemoryTier::Market, 10).unwrap();
    assert_eq!(market.len(), 4);
    for record in &market {
        assert!(record.content.contains("NEW summary"), "stale record {}", record.id);
    }
    let medium = market
        .iter()
        .find(|r| r.id == "HPG_2024-01-15_market_medium_term")
        .unwrap();
    assert!(medium.content.contains(UNAVAILABLE));

    // Same-day records never feed back into their own run.
    let second_synthesis = model.prompts_for(StageKey::Synthesis).pop().unwrap();
    assert!(second_synthesis.contains(NO_HISTORY));
    assert_eq!(agent.market_data().recent("HPG", day(2024, 1, 16), 5).unwrap().len(), 1);
}

#[tokio::test]
async fn test_cold_start_uses_placeholders() {
    let (agent, model) = setup();
    seed_hpg(&agent);

    agent.run(request(100_000_000.0, 0)).await;

    assert!(model.last_prompt(StageKey::Synthesis).contains(NO_HISTORY));
    let high = model.last_prompt(StageKey::HighLevel);
    assert!(high.contains(NO_HISTORY));
    assert!(high.contains("No past decisions recorded."));
    assert!(model
        .last_prompt(StageKey::Decision)
        .contains(&format!("Past lessons:\n{NO_HISTORY}")));
}

#[tokio::test]
async fn test_missing_financials_sentinel_in_prompt() {
    let (agent, model) = setup();
    seed_hpg(&agent);

    agent.run(request(100_000_000.0, 0)).await;

    let latest = model.last_prompt(StageKey::Latest);
    assert!(latest.contains("No financial report data available."));
    assert!(latest.contains("- [2024-01-14 09:30] Steel prices slide: Domestic steel prices fell for a third week"));
    assert!(latest.contains("- Close Price: 26"));
}

#[tokio::test]
async fn test_financials_rendered_when_present() {
    let (agent, model) = setup();
    seed_hpg(&agent);
    seed_financials(&agent);

    agent.run(request(100_000_000.0, 0)).await;

    let latest = model.last_prompt(StageKey::Latest);
    assert!(latest.contains("**Report Period: Q3/2023**"));
    assert!(latest.contains("- Revenue: 34000000000000 VND"));
    assert!(!latest.contains("Total Debt"));
}

#[tokio::test]
async fn test_failed_low_level_stage_degrades() {
    let (agent, model) = setup();
    seed_hpg(&agent);
    model.fail(StageKey::LowLevel);

    let report = agent.run(request(100_000_000.0, 0)).await;

    assert!(report.price_reflection.is_none());
    assert!(model.last_prompt(StageKey::HighLevel).contains(UNAVAILABLE));
    assert!(model.last_prompt(StageKey::Decision).contains(UNAVAILABLE));
    assert_eq!(counts(&agent), vec![4, 0, 1]);
    assert!(report.action.is_some());
}

#[tokio::test]
async fn test_failed_market_stage_skips_synthesis() {
    let (agent, model) = setup();
    seed_hpg(&agent);
    model.fail(StageKey::Latest);

    let report = agent.run(request(100_000_000.0, 0)).await;

    assert!(report.latest_intelligence.is_none());
    assert!(report.market_intelligence.is_none());
    assert!(model.prompts_for(StageKey::Synthesis).is_empty());
    assert!(model.last_prompt(StageKey::LowLevel).contains(UNAVAILABLE));
    assert_eq!(counts(&agent)[0], 0);
}

#[tokio::test]
async fn test_malformed_decision_yields_no_action() {
    let (agent, model) = setup();
    seed_hpg(&agent);
    model.respond(StageKey::Decision, "I would probably buy some shares.");

    let report = agent.run(request(100_000_000.0, 0)).await;

    assert!(report.decision.is_none());
    assert!(report.action.is_none());
    assert!(agent.market_data().recent("HPG", day(2024, 1, 16), 5).unwrap().is_empty());
    // Upstream memory writes stand on their own.
    assert_eq!(counts(&agent), vec![4, 1, 1]);
}

#[tokio::test]
async fn test_chart_only_sent_to_image_capable_models() {
    let chart = ImageAttachment {
        mime_type: "image/png".into(),
        bytes: vec![0x89, 0x50, 0x4e, 0x47],
    };

    let (agent, model) = setup();
    seed_hpg(&agent);
    let mut req = request(100_000_000.0, 0);
    req.chart = Some(chart.clone());
    agent.run(req).await;
    assert_eq!(model.images_seen(), 0);

    let vision = Arc::new(ScriptedModel::new().accepting_images());
    let agent = setup_with(":memory:", vision.clone());
    seed_hpg(&agent);
    let mut req = request(100_000_000.0, 0);
    req.chart = Some(chart);
    agent.run(req).await;
    assert_eq!(vision.images_seen(), 2);
    assert!(vision.last_prompt(StageKey::LowLevel).contains("candlestick chart"));
}

#[tokio::test]
async fn test_unknown_symbol_runs_on_sentinels() {
    let (agent, model) = setup();

    let mut req = request(100_000_000.0, 0);
    req.symbol = "zzz".into();
    model.respond(
        StageKey::Decision,
        r#"{"analysis": "No data", "action": "BUY", "reasoning": "Speculative"}"#,
    );
    let report = agent.run(req).await;

    assert_eq!(report.symbol, "ZZZ");
    // No price means a BUY cannot be checked and is refused.
    assert_eq!(report.action, Some(TradeAction::Hold));
    let latest = model.last_prompt(StageKey::Latest);
    assert!(latest.contains("No specific news found for ZZZ in the last 7 days."));
    assert!(latest.contains("No price data."));
}

#[tokio::test]
async fn test_rate_limited_call_is_retried() {
    let model = Arc::new(ScriptedModel::new());
    let config = finagent::config::PipelineConfig {
        max_retries: 2,
        ..test_config()
    };
    let agent = setup_with_config(":memory:", model.clone(), config);
    seed_hpg(&agent);
    model.rate_limit(StageKey::Decision, 2);

    let report = agent.run(request(100_000_000.0, 0)).await;

    assert_eq!(report.action, Some(TradeAction::Hold));
    assert_eq!(model.prompts_for(StageKey::Decision).len(), 3);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let (agent, model) = setup();
    seed_hpg(&agent);
    model.rate_limit(StageKey::Decision, 1);

    let report = agent.run(request(100_000_000.0, 0)).await;

    assert!(report.action.is_none());
    assert_eq!(model.prompts_for(StageKey::Decision).len(), 1);
}
