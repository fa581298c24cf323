pub mod market_repo;
pub mod memory_store;
pub mod migrations;
