//! Mock text provider for testing.

use super::{GeneratedText, ProviderError, TextProvider};
use async_trait::async_trait;
use serde_json::json;

pub struct MockTextProvider {
    enabled: bool,
}

impl MockTextProvider {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    async fn generate(&self, prompt: &str) -> Result<GeneratedText, ProviderError> {
        if !self.enabled {
            return Err(ProviderError::NotConfigured(
                "GEMINI_API_KEY not configured on server".to_string(),
            ));
        }

        let text = format!("Mock response for: {}", prompt);
        Ok(GeneratedText {
            raw: json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] }),
            text: Some(text),
        })
    }
}
