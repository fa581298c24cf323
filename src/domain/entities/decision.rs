use crate::domain::values::trade_action::TradeAction;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A finalized recommendation kept in the decision journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub symbol: String,
    pub date: NaiveDate,
    pub action: TradeAction,
    /// Close on the decision date; used later to compute the realized outcome.
    pub reference_price: Option<f64>,
    pub reasoning: String,
    pub recorded_at: DateTime<Utc>,
}

impl DecisionEntry {
    pub fn new(
        symbol: &str,
        date: NaiveDate,
        action: TradeAction,
        reference_price: Option<f64>,
        reasoning: String,
    ) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            date,
            action,
            reference_price,
            reasoning,
            recorded_at: Utc::now(),
        }
    }

    /// Percent move from the reference close to `current_price`.
    pub fn realized_change_pct(&self, current_price: Option<f64>) -> Option<f64> {
        match (self.reference_price, current_price) {
            (Some(then), Some(now)) if then > 0.0 => Some((now - then) / then * 100.0),
            _ => None,
        }
    }

    /// Human-readable outcome from the point of view of the action taken.
    pub fn outcome_text(&self, current_price: Option<f64>) -> String {
        let Some(change) = self.realized_change_pct(current_price) else {
            return "Outcome unknown".to_string();
        };
        let verdict = match self.action {
            TradeAction::Buy if change > 0.0 => "gain",
            TradeAction::Buy if change < 0.0 => "loss",
            TradeAction::Sell if change < 0.0 => "avoided loss",
            TradeAction::Sell if change > 0.0 => "missed gain",
            TradeAction::Hold => "held",
            _ => "flat",
        };
        format!("{change:+.2}% since decision ({verdict})")
    }
}
