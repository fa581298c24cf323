pub mod account;
pub mod horizon;
pub mod memory_tier;
pub mod trade_action;
