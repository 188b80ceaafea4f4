//! Server-side proxy for generative text, keeping the API key off the client.

use axum::{body::Bytes, extract::State, Json};
use serde_json::Value;
use service_core::error::AppError;

use crate::dtos::GenerateResponse;
use crate::startup::AppState;

const MSG_MISSING_PROMPT: &str = "Missing prompt in request body";

#[tracing::instrument(skip(state, body))]
pub async fn generate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<GenerateResponse>, AppError> {
    let prompt = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|v| v.get("prompt").and_then(Value::as_str).map(str::to_string))
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!(MSG_MISSING_PROMPT)))?;

    let generated = state.text_provider.generate(&prompt).await.map_err(|e| {
        tracing::warn!(error = %e, "Text generation failed");
        AppError::from(e)
    })?;

    Ok(Json(GenerateResponse {
        text: generated.text,
        raw: generated.raw,
    }))
}
