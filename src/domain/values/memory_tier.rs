use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three independent memory collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    /// News and macro events, bucketed by horizon.
    Market,
    /// How prices reacted to market intelligence.
    PriceReflection,
    /// Lessons drawn from past trading decisions.
    DecisionReflection,
}

impl MemoryTier {
    pub const ALL: [MemoryTier; 3] = [
        MemoryTier::Market,
        MemoryTier::PriceReflection,
        MemoryTier::DecisionReflection,
    ];

    pub fn collection(&self) -> &'static str {
        match self {
            MemoryTier::Market => "market_memory",
            MemoryTier::PriceReflection => "price_reflection_memory",
            MemoryTier::DecisionReflection => "decision_reflection_memory",
        }
    }
}

impl fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryTier::Market => write!(f, "market"),
            MemoryTier::PriceReflection => write!(f, "price_reflection"),
            MemoryTier::DecisionReflection => write!(f, "decision_reflection"),
        }
    }
}

impl FromStr for MemoryTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "market" => Ok(MemoryTier::Market),
            "price" | "price_reflection" | "low_level" => Ok(MemoryTier::PriceReflection),
            "decision" | "decision_reflection" | "high_level" => {
                Ok(MemoryTier::DecisionReflection)
            }
            _ => Err(format!("Unknown memory tier: {s}")),
        }
    }
}
