//! Text-completion backends used for field extraction and pattern generation.

pub mod backoff;
pub mod together;

pub use backoff::RetryPolicy;
pub use together::TogetherClient;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "meta-llama/Llama-3.3-70B-Instruct-Turbo-Free";
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited by backend")]
    RateLimited,

    #[error("backend rejected credentials ({0})")]
    Unauthorized(StatusCode),

    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl LlmError {
    /// Whether another attempt at the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited => true,
            Self::Status { status, .. } => status.is_server_error(),
            Self::Unauthorized(_) | Self::MalformedResponse(_) | Self::Config(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Model identifier and sampling knobs shared by every request of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl CompletionSettings {
    pub fn request(&self, prompt: impl Into<String>) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            prompt: prompt.into(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// A remote text-completion call. Implementations return the raw generated
/// text; interpreting it is the caller's job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(LlmError::RateLimited.is_transient());
        assert!(LlmError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(
            LlmError::Status {
                status: StatusCode::BAD_GATEWAY,
                body: String::new()
            }
            .is_transient()
        );

        assert!(!LlmError::Unauthorized(StatusCode::UNAUTHORIZED).is_transient());
        assert!(
            !LlmError::Status {
                status: StatusCode::BAD_REQUEST,
                body: "bad prompt".to_string()
            }
            .is_transient()
        );
        assert!(!LlmError::MalformedResponse("no choices".to_string()).is_transient());
    }

    #[test]
    fn settings_build_requests() {
        let settings = CompletionSettings::default();
        let request = settings.request("hello");
        assert_eq!(request.model, DEFAULT_MODEL);
        assert_eq!(request.max_tokens, 4000);
        assert_eq!(request.prompt, "hello");
    }
}
