use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod openai;

pub use openai::OpenAiGenerator;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("text generation is not configured")]
    NotConfigured,
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned no content")]
    EmptyResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 200,
            temperature: 0.7,
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Used when no provider key is configured. Every call degrades to the stub.
pub struct UnconfiguredGenerator;

#[async_trait]
impl TextGenerator for UnconfiguredGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
        Err(GenerationError::NotConfigured)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedText {
    pub text: String,
    /// True when the provider failed and `text` is the stub.
    pub degraded: bool,
}

pub fn stub_output(prompt: &str) -> String {
    format!("AI call failed or OPENAI_API_KEY missing.\n\nStub fallback:\n\"{prompt}\"")
}

/// Runs the provider and absorbs any failure into the stub text.
pub async fn generate_or_stub(
    generator: &dyn TextGenerator,
    request: &GenerationRequest,
) -> GeneratedText {
    match generator.generate(request).await {
        Ok(text) => GeneratedText {
            text,
            degraded: false,
        },
        Err(err) => {
            tracing::warn!(?err, "text generation failed; returning stub output");
            GeneratedText {
                text: stub_output(&request.prompt),
                degraded: true,
            }
        }
    }
}
