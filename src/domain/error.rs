use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// Failures of a single language-model invocation.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("model call timed out after {0}s")]
    Timeout(u64),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl ModelError {
    /// Credential failures will not fix themselves between attempts.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ModelError::Unauthorized(_))
    }
}
