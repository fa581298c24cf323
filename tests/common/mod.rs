//! Shared test helpers: a scripted language model and seeded market data.
#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use finagent::config::PipelineConfig;
use finagent::domain::entities::market_data::{FinancialPeriod, NewsItem, PriceBar};
use finagent::domain::error::ModelError;
use finagent::domain::ports::language_model::{LanguageModel, ModelRequest};
use finagent::infrastructure::embeddings::noop::NoopProvider;
use finagent::FinAgent;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKey {
    Latest,
    Synthesis,
    LowLevel,
    HighLevel,
    Decision,
}

impl StageKey {
    fn detect(prompt: &str) -> Option<Self> {
        if prompt.contains("LATEST MARKET DATA") {
            Some(StageKey::Latest)
        } else if prompt.contains("Synthesise the final market intelligence") {
            Some(StageKey::Synthesis)
        } else if prompt.contains("low-level reflection module") {
            Some(StageKey::LowLevel)
        } else if prompt.contains("high-level reflection module") {
            Some(StageKey::HighLevel)
        } else if prompt.contains("decision-making module") {
            Some(StageKey::Decision)
        } else {
            None
        }
    }

    fn default_response(self) -> &'static str {
        match self {
            StageKey::Latest => {
                r#"{"analysis": "Steel prices softened while construction demand stays weak", "summary": "HPG faces near-term pressure from falling steel prices", "queries": {"short_term": "HPG steel price decline news", "medium_term": "HPG construction demand slowdown", "long_term": "HPG capacity expansion Dung Quat"}}"#
            }
            StageKey::Synthesis => {
                r#"```json
{"analysis": "Similar dips in the past recovered slowly", "summary": "Cautious outlook for HPG"}
```"#
            }
            StageKey::LowLevel => {
                r#"{"reasoning": {"short_term": "Price fell on weak steel news, momentum fading", "medium_term": "Range bound", "long_term": "Flat"}, "query": "HPG price drop on weak steel prices"}"#
            }
            StageKey::HighLevel => {
                r#"{"reasoning": "No prior decision was wrong", "improvement": "Wait for confirmation", "summary": "Stay patient on HPG", "query": "HPG patience during steel downturn"}"#
            }
            StageKey::Decision => r#"{"analysis": "Downtrend", "action": "SELL", "reasoning": "Momentum is negative"}"#,
        }
    }
}

/// Answers each stage with a fixed JSON reply and records every prompt.
pub struct ScriptedModel {
    responses: Mutex<HashMap<StageKey, String>>,
    failing: Mutex<HashSet<StageKey>>,
    rate_limited: Mutex<HashMap<StageKey, usize>>,
    prompts: Mutex<Vec<(StageKey, String)>>,
    images: Mutex<usize>,
    accepts_images: bool,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            rate_limited: Mutex::new(HashMap::new()),
            prompts: Mutex::new(Vec::new()),
            images: Mutex::new(0),
            accepts_images: false,
        }
    }

    pub fn accepting_images(mut self) -> Self {
        self.accepts_images = true;
        self
    }

    pub fn respond(&self, stage: StageKey, body: &str) {
        self.responses.lock().unwrap().insert(stage, body.to_string());
    }

    pub fn fail(&self, stage: StageKey) {
        self.failing.lock().unwrap().insert(stage);
    }

    /// The next `times` calls for `stage` answer 429 with a zero retry-after.
    pub fn rate_limit(&self, stage: StageKey, times: usize) {
        self.rate_limited.lock().unwrap().insert(stage, times);
    }

    pub fn prompts_for(&self, stage: StageKey) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == stage)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn last_prompt(&self, stage: StageKey) -> String {
        self.prompts_for(stage).pop().unwrap_or_default()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn images_seen(&self) -> usize {
        *self.images.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn supports_images(&self) -> bool {
        self.accepts_images
    }

    async fn generate(&self, request: &ModelRequest) -> Result<String, ModelError> {
        let stage = StageKey::detect(&request.prompt)
            .ok_or_else(|| ModelError::Malformed("unrecognised prompt".into()))?;
        self.prompts.lock().unwrap().push((stage, request.prompt.clone()));
        if request.image.is_some() {
            *self.images.lock().unwrap() += 1;
        }
        if let Some(left) = self.rate_limited.lock().unwrap().get_mut(&stage) {
            if *left > 0 {
                *left -= 1;
                return Err(ModelError::RateLimited {
                    retry_after_secs: Some(0),
                });
            }
        }
        if self.failing.lock().unwrap().contains(&stage) {
            return Err(ModelError::Transport("scripted failure".into()));
        }
        let custom = self.responses.lock().unwrap().get(&stage).cloned();
        Ok(custom.unwrap_or_else(|| stage.default_response().to_string()))
    }
}

pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        max_retries: 0,
        min_call_interval_ms: 0,
        backfill_pause_secs: 0,
        ..PipelineConfig::default()
    }
}

pub fn setup_with(db_path: &str, model: Arc<ScriptedModel>) -> FinAgent {
    setup_with_config(db_path, model, test_config())
}

pub fn setup_with_config(db_path: &str, model: Arc<ScriptedModel>, config: PipelineConfig) -> FinAgent {
    FinAgent::with_providers(db_path, Arc::new(NoopProvider), model, config).unwrap()
}

pub fn setup() -> (FinAgent, Arc<ScriptedModel>) {
    let model = Arc::new(ScriptedModel::new());
    (setup_with(":memory:", model.clone()), model)
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    day(y, m, d).and_hms_opt(h, min, 0).unwrap()
}

pub fn bar(symbol: &str, date: NaiveDate, close: f64) -> PriceBar {
    PriceBar {
        symbol: symbol.to_string(),
        date,
        close,
        open: Some(close),
        high: Some(close),
        low: Some(close),
        volume: Some(1_000_000),
    }
}

/// HPG with one prior bar (a decrease into 2024-01-15) and one news item.
pub fn seed_hpg(agent: &FinAgent) {
    let data = agent.market_data();
    data.upsert_price_bar(&bar("HPG", day(2024, 1, 12), 26.5)).unwrap();
    data.upsert_price_bar(&bar("HPG", day(2024, 1, 15), 26.0)).unwrap();
    data.insert_news(&NewsItem {
        symbol: Some("HPG".into()),
        published_at: at(2024, 1, 14, 9, 30),
        title: "Steel prices slide".into(),
        summary: Some("Domestic steel prices fell for a third week".into()),
        content: None,
    })
    .unwrap();
}

pub fn seed_financials(agent: &FinAgent) {
    agent
        .market_data()
        .upsert_financials(&FinancialPeriod {
            symbol: "HPG".into(),
            year: 2023,
            period: 3,
            revenue: Some(34_000_000_000_000),
            net_income: Some(2_000_000_000_000),
            ..Default::default()
        })
        .unwrap();
}
