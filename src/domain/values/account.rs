use serde::{Deserialize, Serialize};

/// Cash and share position available to the Decision stage. Read only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountStatus {
    cash: f64,
    position: u64,
}

impl AccountStatus {
    pub fn new(cash: f64, position: u64) -> Result<Self, String> {
        if !cash.is_finite() || cash < 0.0 {
            return Err(format!("Cash must be a non-negative amount, got {cash}"));
        }
        Ok(Self { cash, position })
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// A BUY needs enough cash for at least one share at `price`.
    /// An unknown price cannot be checked and is refused.
    pub fn can_buy(&self, price: Option<f64>) -> bool {
        match price {
            Some(p) if p.is_finite() && p > 0.0 => self.cash >= p,
            _ => false,
        }
    }

    pub fn can_sell(&self) -> bool {
        self.position > 0
    }
}
