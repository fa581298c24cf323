use super::{or_unavailable, require, Prompt, Stage};
use crate::application::context::{PriceMovements, NO_PRICE_DATA};
use crate::domain::entities::memory_record::{MemoryRecord, META_QUERY_TEXT};
use crate::domain::ports::language_model::ImageAttachment;
use crate::domain::values::memory_tier::MemoryTier;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub struct PriceReflectionInput {
    pub symbol: String,
    pub date: NaiveDate,
    pub market_summary: Option<String>,
    pub movements: Option<PriceMovements>,
    pub chart: Option<ImageAttachment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonReasoning {
    pub short_term: String,
    pub medium_term: String,
    pub long_term: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceReflection {
    #[serde(default)]
    pub reasoning: HorizonReasoning,
    #[serde(default)]
    pub query: String,
}

impl PriceReflection {
    pub fn render(&self) -> String {
        format!(
            "- Short-term: {}\n- Medium-term: {}\n- Long-term: {}",
            self.reasoning.short_term, self.reasoning.medium_term, self.reasoning.long_term
        )
    }
}

/// Explains how price reacted to the market intelligence.
pub struct LowLevelReflection;

impl Stage for LowLevelReflection {
    type Input = PriceReflectionInput;
    type Output = PriceReflection;

    fn name(&self) -> &'static str {
        "low_level_reflection"
    }

    fn build_prompt(&self, input: &PriceReflectionInput) -> Prompt {
        let movements = input
            .movements
            .as_ref()
            .map(PriceMovements::render)
            .unwrap_or_else(|| NO_PRICE_DATA.to_string());
        let chart_note = if input.chart.is_some() {
            "A candlestick chart of recent trading is attached; use it."
        } else {
            "No chart is available."
        };
        let text = format!(
            r#"You are the low-level reflection module of a trading agent, analysing {symbol} on {date}.
Explain the relationship between market intelligence and price movements.

MARKET INTELLIGENCE SUMMARY
{summary}

PRICE MOVEMENTS
{movements}

{chart_note}

TASK
For each horizon explain WHY the price moved the way it did given the information.
You must explicitly reason about momentum: say whether it is building, fading or reversing, and whether the trend agrees with the sentiment.
Name the pattern if one applies (e.g. "sell the news", "panic selling", "accumulation").
Finish with one concise sentence that would retrieve this reasoning in the future.

Respond with JSON only:
{{"reasoning": {{"short_term": "...", "medium_term": "...", "long_term": "..."}}, "query": "..."}}"#,
            symbol = input.symbol,
            date = input.date.format("%Y-%m-%d"),
            summary = or_unavailable(input.market_summary.as_deref()),
        );
        Prompt {
            text,
            image: input.chart.clone(),
        }
    }

    fn validate(&self, output: &PriceReflection) -> Result<(), String> {
        require("reasoning.short_term", &output.reasoning.short_term)?;
        require("query", &output.query)
    }

    fn memory_records(&self, input: &PriceReflectionInput, output: &PriceReflection) -> Vec<MemoryRecord> {
        let direction = input
            .movements
            .as_ref()
            .map(|m| m.short_term_desc.to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let content = format!(
            "{} on {} price reasoning (short-term direction: {direction}). Short-term: {} Medium-term: {} Long-term: {}",
            input.symbol,
            input.date.format("%Y-%m-%d"),
            output.reasoning.short_term,
            output.reasoning.medium_term,
            output.reasoning.long_term,
        );
        vec![
            MemoryRecord::new(MemoryTier::PriceReflection, &input.symbol, input.date, "reasoning", content)
                .with_meta(META_QUERY_TEXT, output.query.clone()),
        ]
    }
}
