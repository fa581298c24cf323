use crate::domain::error::{DomainError, ModelError};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResponseFormat {
    Text,
    Json,
}

/// An image sent alongside the prompt, e.g. a candlestick chart.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageAttachment {
    pub fn from_path(path: &Path) -> Result<Self, DomainError> {
        let mime_type = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .as_deref()
        {
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            other => {
                return Err(DomainError::InvalidInput(format!(
                    "Unsupported chart image type: {other:?}"
                )))
            }
        };
        let bytes = std::fs::read(path)
            .map_err(|e| DomainError::InvalidInput(format!("Cannot read {}: {e}", path.display())))?;
        Ok(Self {
            mime_type: mime_type.to_string(),
            bytes,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub prompt: String,
    pub image: Option<ImageAttachment>,
    pub format: ResponseFormat,
}

#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    /// Whether image attachments are accepted. Attachments are dropped otherwise.
    fn supports_images(&self) -> bool {
        false
    }

    async fn generate(&self, request: &ModelRequest) -> Result<String, ModelError>;
}
