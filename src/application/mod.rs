pub mod context;
pub mod indicators;
pub mod memory_inspect;
pub mod pipeline;
pub mod rate_limit;
pub mod retrieval;
pub mod stages;
