pub mod decision;
pub mod market_data;
pub mod memory_record;
