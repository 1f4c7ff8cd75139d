use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::ApiError;
use crate::gateway::LlmGateway;

pub const DEFAULT_VOICE: &str = "Fritz-PlayAI";

#[derive(Debug, Default, Deserialize)]
pub struct SpeechRequest {
    /// Kept loose so a non-string `text` gets the same 400 as a missing one
    #[serde(default)]
    pub text: Option<Value>,
    #[serde(default)]
    pub voice: Option<String>,
}

/// Synthesize the request's text, returning WAV bytes.
pub async fn synthesize(gateway: &dyn LlmGateway, request: SpeechRequest) -> Result<Vec<u8>, ApiError> {
    let text = match request.text {
        Some(Value::String(text)) if !text.is_empty() => text,
        _ => {
            return Err(ApiError::BadRequest(
                "Text is required and must be a string".to_string(),
            ));
        }
    };
    let voice = request
        .voice
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_VOICE.to_string());

    info!(chars = text.chars().count(), voice = %voice, "Generating speech");
    Ok(gateway.speak(&text, &voice).await?)
}
