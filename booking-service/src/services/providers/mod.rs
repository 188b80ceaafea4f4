//! Generative-text provider abstraction.
//!
//! [`GeminiTextProvider`] proxies to Google's Gemini API with the server-held
//! key; [`MockTextProvider`] is used by tests.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use service_core::error::AppError;
use thiserror::Error;

pub use gemini::{GeminiConfig, GeminiTextProvider};
pub use mock::MockTextProvider;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// Non-2xx answer; status and body are relayed to the caller.
    #[error("Upstream error {status}")]
    Upstream { status: u16, body: String },

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotConfigured(msg) => AppError::ConfigError(anyhow::anyhow!(msg)),
            ProviderError::Upstream { status, body } => AppError::Upstream { status, body },
            ProviderError::ApiError(msg) | ProviderError::NetworkError(msg) => {
                AppError::InternalError(anyhow::anyhow!(msg))
            }
        }
    }
}

/// Generated text plus the full upstream response.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedText {
    pub text: Option<String>,
    pub raw: Value,
}

#[async_trait]
pub trait TextProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<GeneratedText, ProviderError>;
}
