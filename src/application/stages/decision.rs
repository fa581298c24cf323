use super::{or_unavailable, require, Prompt, Stage};
use crate::domain::values::account::AccountStatus;
use crate::domain::values::trade_action::TradeAction;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

pub struct DecisionInput {
    pub symbol: String,
    pub date: NaiveDate,
    pub market_intelligence: Option<String>,
    pub price_reasoning: Option<String>,
    pub lessons: String,
    pub technical_signals: String,
    pub account: AccountStatus,
    pub current_price: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingDecision {
    #[serde(default)]
    pub analysis: String,
    #[serde(deserialize_with = "lenient_action")]
    pub action: TradeAction,
    #[serde(default)]
    pub reasoning: String,
}

fn lenient_action<'de, D>(deserializer: D) -> Result<TradeAction, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

/// Records that the proposed action broke an account constraint.
#[derive(Debug, Clone, Serialize)]
pub struct ConstraintOverride {
    pub proposed: TradeAction,
    pub reason: String,
}

pub struct DecisionStage;

impl Stage for DecisionStage {
    type Input = DecisionInput;
    type Output = TradingDecision;

    fn name(&self) -> &'static str {
        "decision"
    }

    fn build_prompt(&self, input: &DecisionInput) -> Prompt {
        let price = input
            .current_price
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Prompt::text(format!(
            r#"You are the decision-making module of a trading agent. Decide today's action for {symbol} on {date}.

MARKET INTELLIGENCE
{market}

PRICE REASONING
{price_reasoning}

LESSONS FROM PAST DECISIONS
{lessons}

TECHNICAL SIGNALS
{signals}

ACCOUNT
- Cash available: {cash}
- Shares held: {position}
- Current price: {price}

RULES
- BUY only if the cash covers at least one share at the current price.
- SELL only if shares are held.
- Otherwise HOLD.

Respond with JSON only:
{{"analysis": "...", "action": "BUY|SELL|HOLD", "reasoning": "..."}}"#,
            symbol = input.symbol,
            date = input.date.format("%Y-%m-%d"),
            market = or_unavailable(input.market_intelligence.as_deref()),
            price_reasoning = or_unavailable(input.price_reasoning.as_deref()),
            lessons = input.lessons,
            signals = input.technical_signals,
            cash = input.account.cash(),
            position = input.account.position(),
        ))
    }

    fn validate(&self, output: &TradingDecision) -> Result<(), String> {
        require("reasoning", &output.reasoning)
    }
}

/// Replaces an infeasible BUY or SELL with HOLD.
pub fn enforce_constraints(
    mut decision: TradingDecision,
    account: &AccountStatus,
    price: Option<f64>,
) -> (TradingDecision, Option<ConstraintOverride>) {
    let reason = match decision.action {
        TradeAction::Buy if !account.can_buy(price) => Some(match price {
            Some(p) => format!("BUY needs at least {p} cash, only {} available", account.cash()),
            None => "BUY refused because the current price is unknown".to_string(),
        }),
        TradeAction::Sell if !account.can_sell() => Some("SELL refused because no shares are held".to_string()),
        _ => None,
    };

    let Some(reason) = reason else {
        return (decision, None);
    };
    let proposed = decision.action;
    decision.action = TradeAction::Hold;
    decision.reasoning = format!("{} [Overridden to HOLD: {reason}]", decision.reasoning);
    (decision, Some(ConstraintOverride { proposed, reason }))
}
