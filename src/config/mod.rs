use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub db_path: String,
    pub model: ModelConfig,
    pub embedding: EmbeddingConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Only the pipeline commands need it; memory inspection runs without.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: String, // "noop", "openai" or "gemini"
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: Option<String>,
}

/// Knobs the pipeline reads at run time. Everything here has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub model_name: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub min_call_interval_ms: u64,
    pub backfill_pause_secs: u64,
    pub news_lookback_days: i64,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Hits per horizon bucket in the market tier.
    pub market_top_k: usize,
    /// Hits for the price and decision tiers.
    pub reflection_top_k: usize,
    /// Past decisions shown to the high-level reflection stage.
    pub decision_window: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            market_top_k: 1,
            reflection_top_k: 2,
            decision_window: 5,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_name: "gemini-2.5-flash".to_string(),
            timeout_secs: 60,
            max_retries: 2,
            min_call_interval_ms: 1000,
            backfill_pause_secs: 60,
            news_lookback_days: 7,
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, DomainError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Unset keys take defaults;
    /// set-but-invalid keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("GEMINI_API_KEY");

        let provider = non_empty("FINAGENT_EMBEDDING_PROVIDER").unwrap_or_else(|| "noop".to_string());
        if !matches!(provider.as_str(), "noop" | "openai" | "gemini") {
            return Err(DomainError::Config(format!(
                "Invalid FINAGENT_EMBEDDING_PROVIDER value: {provider} (use noop, openai or gemini)"
            )));
        }
        // Gemini embeddings fall back to the model key.
        let embedding_key = non_empty("FINAGENT_EMBEDDING_API_KEY")
            .or_else(|| api_key.clone().filter(|_| provider == "gemini"));
        if provider != "noop" && embedding_key.is_none() {
            return Err(DomainError::Config(format!(
                "FINAGENT_EMBEDDING_API_KEY is required for the {provider} embedding provider"
            )));
        }

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            model_name: non_empty("FINAGENT_MODEL").unwrap_or(defaults.model_name),
            timeout_secs: parse_or(&lookup, "FINAGENT_MODEL_TIMEOUT_SECS", defaults.timeout_secs)?,
            max_retries: parse_or(&lookup, "FINAGENT_MODEL_MAX_RETRIES", defaults.max_retries)?,
            min_call_interval_ms: parse_or(&lookup, "FINAGENT_MIN_CALL_INTERVAL_MS", defaults.min_call_interval_ms)?,
            backfill_pause_secs: parse_or(&lookup, "FINAGENT_BACKFILL_PAUSE_SECS", defaults.backfill_pause_secs)?,
            news_lookback_days: parse_or(&lookup, "FINAGENT_NEWS_LOOKBACK_DAYS", defaults.news_lookback_days)?,
            retrieval: RetrievalConfig {
                market_top_k: parse_or(&lookup, "FINAGENT_MARKET_TOP_K", defaults.retrieval.market_top_k)?,
                reflection_top_k: parse_or(&lookup, "FINAGENT_REFLECTION_TOP_K", defaults.retrieval.reflection_top_k)?,
                decision_window: parse_or(&lookup, "FINAGENT_DECISION_WINDOW", defaults.retrieval.decision_window)?,
            },
        };
        pipeline.validate()?;

        Ok(Config {
            db_path: non_empty("FINAGENT_DB").unwrap_or_else(|| "./finagent.db".to_string()),
            model: ModelConfig {
                api_key,
                base_url: non_empty("FINAGENT_GEMINI_BASE_URL"),
            },
            embedding: EmbeddingConfig {
                api_key: embedding_key,
                provider,
                model: non_empty("FINAGENT_EMBEDDING_MODEL"),
            },
            pipeline,
        })
    }

    /// The model key, checked before any command that calls the model.
    pub fn require_model_key(&self) -> Result<&str, DomainError> {
        self.model
            .api_key
            .as_deref()
            .ok_or_else(|| DomainError::Config("GEMINI_API_KEY environment variable is required but not set".into()))
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.timeout_secs == 0 {
            return Err(DomainError::Config("FINAGENT_MODEL_TIMEOUT_SECS must be positive".into()));
        }
        if self.news_lookback_days < 0 {
            return Err(DomainError::Config("FINAGENT_NEWS_LOOKBACK_DAYS must not be negative".into()));
        }
        if self.retrieval.market_top_k == 0 || self.retrieval.reflection_top_k == 0 {
            return Err(DomainError::Config("retrieval top_k values must be positive".into()));
        }
        Ok(())
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, DomainError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| DomainError::Config(format!("Invalid {key} value: {raw}"))),
    }
}
