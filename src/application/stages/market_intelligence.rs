use super::{require, Prompt, Stage, UNAVAILABLE};
use crate::domain::entities::memory_record::{MemoryRecord, META_DURATION};
use crate::domain::values::horizon::Horizon;
use crate::domain::values::memory_tier::MemoryTier;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const OVERALL: &str = "OVERALL";

/// Current-day text views fed to the first pass.
pub struct MarketSnapshot {
    pub symbol: String,
    pub date: NaiveDate,
    pub news: String,
    pub financials: String,
    pub price_action: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonQueries {
    pub short_term: String,
    pub medium_term: String,
    pub long_term: String,
}

impl HorizonQueries {
    pub fn get(&self, horizon: Horizon) -> &str {
        match horizon {
            Horizon::ShortTerm => &self.short_term,
            Horizon::MediumTerm => &self.medium_term,
            Horizon::LongTerm => &self.long_term,
        }
    }

    pub fn pairs(&self) -> Vec<(Horizon, String)> {
        Horizon::ALL.iter().map(|h| (*h, self.get(*h).to_string())).collect()
    }
}

/// Output of the latest-information pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestIntelligence {
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub queries: HorizonQueries,
}

/// Output of the synthesis pass; the market intelligence handed downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketIntelligence {
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub summary: String,
}

impl MarketIntelligence {
    pub fn render(&self) -> String {
        format!("Analysis: {}\nSummary: {}", self.analysis, self.summary)
    }
}

pub struct LatestMarketIntelligence;

impl Stage for LatestMarketIntelligence {
    type Input = MarketSnapshot;
    type Output = LatestIntelligence;

    fn name(&self) -> &'static str {
        "market_intelligence_latest"
    }

    fn build_prompt(&self, input: &MarketSnapshot) -> Prompt {
        Prompt::text(format!(
            r#"You are a financial analyst covering {symbol} on {date}.

LATEST MARKET DATA
1. Financial reports:
{financials}

2. Recent price action:
{price_action}

3. News:
{news}

TASKS
1. Analyse the sentiment of the information above and how long its impact is likely to last.
2. Write one retrieval query per horizon that would find SIMILAR past events:
   short_term focuses on immediate news impact, medium_term on the coming weeks, long_term on fundamental shifts.
3. Summarise today's situation in a few sentences.

Respond with JSON only:
{{"analysis": "...", "summary": "...", "queries": {{"short_term": "...", "medium_term": "...", "long_term": "..."}}}}"#,
            symbol = input.symbol,
            date = input.date.format("%Y-%m-%d"),
            financials = input.financials,
            price_action = input.price_action,
            news = input.news,
        ))
    }

    fn validate(&self, output: &LatestIntelligence) -> Result<(), String> {
        require("summary", &output.summary)?;
        if Horizon::ALL.iter().all(|h| output.queries.get(*h).trim().is_empty()) {
            return Err("no retrieval queries returned".into());
        }
        Ok(())
    }
}

/// Second pass input: the latest analysis plus retrieved market history.
pub struct SynthesisInput {
    pub symbol: String,
    pub date: NaiveDate,
    pub latest: LatestIntelligence,
    pub history: String,
}

pub struct PastMarketIntelligence;

impl Stage for PastMarketIntelligence {
    type Input = SynthesisInput;
    type Output = MarketIntelligence;

    fn name(&self) -> &'static str {
        "market_intelligence_synthesis"
    }

    fn build_prompt(&self, input: &SynthesisInput) -> Prompt {
        Prompt::text(format!(
            r#"You are a financial analyst covering {symbol} on {date}. Synthesise the final market intelligence.

CURRENT ANALYSIS
- Analysis: {analysis}
- Summary: {summary}

SIMILAR PAST EVENTS
{history}

TASK
Combine today's information with the historical patterns. State whether history supports or contradicts the current reading, then give a refined analysis and summary.

Respond with JSON only:
{{"analysis": "...", "summary": "..."}}"#,
            symbol = input.symbol,
            date = input.date.format("%Y-%m-%d"),
            analysis = input.latest.analysis,
            summary = input.latest.summary,
            history = input.history,
        ))
    }

    fn validate(&self, output: &MarketIntelligence) -> Result<(), String> {
        require("analysis", &output.analysis)?;
        require("summary", &output.summary)
    }

    fn memory_records(&self, input: &SynthesisInput, output: &MarketIntelligence) -> Vec<MemoryRecord> {
        let date = input.date.format("%Y-%m-%d");
        let mut records = vec![MemoryRecord::new(
            MemoryTier::Market,
            &input.symbol,
            input.date,
            "overall",
            format!(
                "{} on {date} [{OVERALL}] Summary: {} Analysis: {}",
                input.symbol, output.summary, output.analysis
            ),
        )
        .with_meta(META_DURATION, OVERALL)];

        // Every horizon is written so a re-run replaces the whole set.
        for horizon in Horizon::ALL {
            let focus = input.latest.queries.get(horizon).trim();
            let focus = if focus.is_empty() { UNAVAILABLE } else { focus };
            records.push(
                MemoryRecord::new(
                    MemoryTier::Market,
                    &input.symbol,
                    input.date,
                    horizon.key(),
                    format!(
                        "{} on {date} [{}] Focus: {focus} Summary: {}",
                        input.symbol,
                        horizon.label(),
                        output.summary
                    ),
                )
                .with_meta(META_DURATION, horizon.label()),
            );
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthesis_input() -> SynthesisInput {
        SynthesisInput {
            symbol: "HPG".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            latest: LatestIntelligence {
                analysis: "a".into(),
                summary: "s".into(),
                queries: HorizonQueries {
                    short_term: "steel price drop".into(),
                    medium_term: "".into(),
                    long_term: "infrastructure spending".into(),
                },
            },
            history: "No relevant history found.".into(),
        }
    }

    #[test]
    fn market_records_cover_overall_and_every_horizon() {
        let output = MarketIntelligence {
            analysis: "Steel demand weak".into(),
            summary: "Cautious".into(),
        };
        let records = PastMarketIntelligence.memory_records(&synthesis_input(), &output);
        let durations: Vec<_> = records.iter().map(|r| r.meta(META_DURATION).unwrap()).collect();
        assert_eq!(durations, vec!["OVERALL", "SHORT-TERM", "MEDIUM-TERM", "LONG-TERM"]);
        assert_eq!(records[1].id, "HPG_2024-01-15_market_short_term");
        assert_eq!(records[2].id, "HPG_2024-01-15_market_medium_term");
        assert!(records[2].content.contains(&format!("Focus: {UNAVAILABLE}")));
        assert!(records[2].content.contains("Summary: Cautious"));
        assert!(records[3].content.contains("infrastructure spending"));
    }

    #[test]
    fn latest_requires_a_query() {
        let out: LatestIntelligence = serde_json::from_str(r#"{"analysis": "a", "summary": "s"}"#).unwrap();
        assert!(LatestMarketIntelligence.validate(&out).is_err());
    }
}
