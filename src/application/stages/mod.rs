pub mod decision;
pub mod high_level;
pub mod low_level;
pub mod market_intelligence;

use crate::application::rate_limit::RateLimiter;
use crate::config::PipelineConfig;
use crate::domain::entities::memory_record::MemoryRecord;
use crate::domain::error::ModelError;
use crate::domain::ports::language_model::{ImageAttachment, LanguageModel, ModelRequest, ResponseFormat};
use crate::domain::ports::memory_store::MemoryStores;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Rendered in place of an upstream stage result that is missing.
pub const UNAVAILABLE: &str = "unavailable (upstream analysis failed)";

const BACKOFF_BASE: Duration = Duration::from_secs(1);

pub struct Prompt {
    pub text: String,
    pub image: Option<ImageAttachment>,
}

impl Prompt {
    pub fn text(text: String) -> Self {
        Self { text, image: None }
    }
}

/// One reasoning step: prompt construction, output contract and the
/// records it contributes to memory.
pub trait Stage: Send + Sync {
    type Input: Send + Sync;
    type Output: DeserializeOwned + Serialize + Send;

    fn name(&self) -> &'static str;

    fn build_prompt(&self, input: &Self::Input) -> Prompt;

    /// Rejects outputs that parsed but are missing required content.
    fn validate(&self, output: &Self::Output) -> Result<(), String>;

    /// Records to upsert once the output is accepted. All share one tier.
    fn memory_records(&self, _input: &Self::Input, _output: &Self::Output) -> Vec<MemoryRecord> {
        vec![]
    }
}

/// Shared wrapper around every stage call: rate limit, timeout, bounded
/// retries with exponential backoff, JSON extraction, validation, then the
/// memory write. A stage that cannot produce a valid output yields `None`.
pub struct StageRunner {
    model: Arc<dyn LanguageModel>,
    stores: MemoryStores,
    limiter: Arc<RateLimiter>,
    model_name: String,
    timeout: Duration,
    max_retries: u32,
}

impl StageRunner {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        stores: MemoryStores,
        limiter: Arc<RateLimiter>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            model,
            stores,
            limiter,
            model_name: config.model_name.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
        }
    }

    pub async fn run<S: Stage>(&self, stage: &S, input: &S::Input) -> Option<S::Output> {
        let prompt = stage.build_prompt(input);
        let image = match prompt.image {
            Some(image) if self.model.supports_images() => Some(image),
            Some(_) => {
                tracing::debug!(stage = stage.name(), model = self.model.name(), "model takes no images, chart dropped");
                None
            }
            None => None,
        };
        let request = ModelRequest {
            model: self.model_name.clone(),
            prompt: prompt.text,
            image,
            format: ResponseFormat::Json,
        };

        let output = match self.generate(stage, &request).await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(stage = stage.name(), error = %e, "stage failed, continuing without its result");
                return None;
            }
        };

        let records = stage.memory_records(input, &output);
        if let Some(first) = records.first() {
            let tier = first.tier;
            match self.stores.get(tier).upsert(&records).await {
                Ok(()) => tracing::info!(stage = stage.name(), %tier, count = records.len(), "memory saved"),
                Err(e) => tracing::error!(stage = stage.name(), %tier, error = %e, "memory write failed"),
            }
        }
        Some(output)
    }

    async fn generate<S: Stage>(&self, stage: &S, request: &ModelRequest) -> Result<S::Output, ModelError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.limiter.acquire().await;
            let result = match timeout(self.timeout, self.model.generate(request)).await {
                Ok(Ok(text)) => parse_output(stage, &text),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(ModelError::Timeout(self.timeout.as_secs())),
            };

            let err = match result {
                Ok(output) => {
                    tracing::info!(stage = stage.name(), attempt, "stage completed");
                    return Ok(output);
                }
                Err(e) => e,
            };
            if !err.is_retryable() || attempt > self.max_retries {
                return Err(err);
            }

            let wait = retry_wait(&err, attempt, self.timeout);
            tracing::warn!(
                stage = stage.name(),
                attempt,
                max_attempts = self.max_retries + 1,
                error = %err,
                "retrying in {:?}",
                wait
            );
            tokio::time::sleep(wait).await;
        }
    }
}

/// Server-sent `Retry-After` is honoured up to the per-call timeout.
fn retry_wait(err: &ModelError, attempt: u32, cap: Duration) -> Duration {
    match err {
        ModelError::RateLimited {
            retry_after_secs: Some(secs),
        } => Duration::from_secs(*secs).min(cap),
        _ => BACKOFF_BASE * 2u32.saturating_pow(attempt - 1),
    }
}

fn parse_output<S: Stage>(stage: &S, text: &str) -> Result<S::Output, ModelError> {
    let json = extract_json(text).ok_or_else(|| ModelError::Malformed("no JSON object in response".into()))?;
    let output: S::Output =
        serde_json::from_str(json).map_err(|e| ModelError::Malformed(format!("JSON does not match contract: {e}")))?;
    stage.validate(&output).map_err(ModelError::Malformed)?;
    Ok(output)
}

/// Locates the JSON object in a model reply that may carry markdown fences
/// or surrounding prose.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        if let Some(end) = text[start + 7..].find("```") {
            return Some(text[start + 7..start + 7 + end].trim());
        }
    }

    if let Some(start) = text.find("```") {
        if let Some(end) = text[start + 3..].find("```") {
            let fenced = text[start + 3..start + 3 + end].trim();
            if fenced.starts_with('{') {
                return Some(fenced);
            }
        }
    }

    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Renders an optional upstream result, substituting the placeholder.
pub fn or_unavailable(text: Option<&str>) -> &str {
    match text {
        Some(t) if !t.trim().is_empty() => t,
        _ => UNAVAILABLE,
    }
}

pub(crate) fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("missing required field `{field}`"))
    } else {
        Ok(())
    }
}
