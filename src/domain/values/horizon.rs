use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Analysis horizon buckets shared by market retrieval and price reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    ShortTerm,
    MediumTerm,
    LongTerm,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::ShortTerm, Horizon::MediumTerm, Horizon::LongTerm];

    /// JSON key used in model responses (`short_term`, ...).
    pub fn key(&self) -> &'static str {
        match self {
            Horizon::ShortTerm => "short_term",
            Horizon::MediumTerm => "medium_term",
            Horizon::LongTerm => "long_term",
        }
    }

    /// Value stored in the `duration` metadata field of market memory.
    pub fn label(&self) -> &'static str {
        match self {
            Horizon::ShortTerm => "SHORT-TERM",
            Horizon::MediumTerm => "MEDIUM-TERM",
            Horizon::LongTerm => "LONG-TERM",
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Horizon {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "short_term" | "short" => Ok(Horizon::ShortTerm),
            "medium_term" | "medium" => Ok(Horizon::MediumTerm),
            "long_term" | "long" => Ok(Horizon::LongTerm),
            _ => Err(format!("Unknown horizon: {s}")),
        }
    }
}
