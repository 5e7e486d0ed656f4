//! Generation backend boundary: requests, raw responses, and error kinds.

use async_trait::async_trait;
use std::time::Duration;

/// A single generation call as seen by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Backend model string (e.g. `gemini-2.5-flash`).
    pub model: String,
    /// System instruction text.
    pub system_instruction: String,
    /// User prompt text.
    pub prompt: String,
    /// Optional input image as a data URI.
    pub prompt_image: Option<String>,
    /// Request image output instead of text.
    pub image_output: bool,
    /// Thinking enabled for this model entry.
    pub thinking: bool,
    /// Model supports toggling thinking.
    pub thinking_capable: bool,
}

/// Unshaped backend response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawResponse {
    /// Text candidate.
    Text(String),
    /// Base64 inline image payload.
    Image { mime_type: String, data: String },
}

/// Failure kinds for a generation call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// The call did not resolve before the deadline.
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    /// The backend rejected the call.
    #[error("backend error: {0}")]
    Backend(String),
    /// The backend answered with something that could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The call was explicitly aborted.
    #[error("generation cancelled")]
    Cancelled,
    /// No API key is available to build the backend client.
    #[error("API key missing")]
    MissingCredential,
}

impl GenerationError {
    /// Whether the generation client should try again after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::Timeout(_)
                | GenerationError::Backend(_)
                | GenerationError::Malformed(_)
        )
    }
}

/// External generation capability.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Issue one generation call.
    async fn generate(&self, request: &GenerationRequest) -> Result<RawResponse, GenerationError>;
}

/// Host-provided secret retrieval.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Return the API key, if one is configured.
    async fn api_key(&self) -> Option<String>;
}
