pub mod decision_journal;
pub mod embedding_port;
pub mod language_model;
pub mod market_data;
pub mod memory_store;
