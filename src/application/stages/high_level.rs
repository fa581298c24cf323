use super::{or_unavailable, require, Prompt, Stage};
use crate::domain::entities::memory_record::{MemoryRecord, META_QUERY_TEXT};
use crate::domain::ports::language_model::ImageAttachment;
use crate::domain::values::memory_tier::MemoryTier;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub struct DecisionReflectionInput {
    pub symbol: String,
    pub date: NaiveDate,
    pub market_summary: Option<String>,
    pub price_reasoning: Option<String>,
    pub past_decisions: String,
    pub history: String,
    pub chart: Option<ImageAttachment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionReflection {
    pub reasoning: String,
    pub improvement: String,
    pub summary: String,
    pub query: String,
}

impl DecisionReflection {
    pub fn render(&self) -> String {
        format!(
            "Reflection: {}\nImprovement: {}\nSummary: {}",
            self.reasoning, self.improvement, self.summary
        )
    }
}

/// Reviews past decisions against what happened since.
pub struct HighLevelReflection;

impl Stage for HighLevelReflection {
    type Input = DecisionReflectionInput;
    type Output = DecisionReflection;

    fn name(&self) -> &'static str {
        "high_level_reflection"
    }

    fn build_prompt(&self, input: &DecisionReflectionInput) -> Prompt {
        let text = format!(
            r#"You are the high-level reflection module of a trading agent, reviewing {symbol} on {date}.

CURRENT MARKET INTELLIGENCE
{summary}

CURRENT PRICE REASONING
{price_reasoning}

RECENT DECISIONS AND OUTCOMES
{past_decisions}

LESSONS FROM SIMILAR SITUATIONS
{history}

TASK
Judge whether each recent decision was right or wrong given its outcome and explain why.
Propose concrete improvements for the next decision, summarise the lessons learned and write one sentence that would retrieve this reflection in the future.

Respond with JSON only:
{{"reasoning": "...", "improvement": "...", "summary": "...", "query": "..."}}"#,
            symbol = input.symbol,
            date = input.date.format("%Y-%m-%d"),
            summary = or_unavailable(input.market_summary.as_deref()),
            price_reasoning = or_unavailable(input.price_reasoning.as_deref()),
            past_decisions = input.past_decisions,
            history = input.history,
        );
        Prompt {
            text,
            image: input.chart.clone(),
        }
    }

    fn validate(&self, output: &DecisionReflection) -> Result<(), String> {
        require("summary", &output.summary)?;
        require("query", &output.query)
    }

    fn memory_records(&self, input: &DecisionReflectionInput, output: &DecisionReflection) -> Vec<MemoryRecord> {
        let content = format!(
            "{} on {} trading reflection. Summary: {} Reasoning: {} Improvement: {}",
            input.symbol,
            input.date.format("%Y-%m-%d"),
            output.summary,
            output.reasoning,
            output.improvement,
        );
        vec![
            MemoryRecord::new(MemoryTier::DecisionReflection, &input.symbol, input.date, "reflection", content)
                .with_meta(META_QUERY_TEXT, output.query.clone()),
        ]
    }
}
