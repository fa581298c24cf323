pub mod embeddings;
pub mod llm;
pub mod sqlite;
