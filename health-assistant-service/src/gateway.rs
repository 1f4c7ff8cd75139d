//! Client for the OpenAI-compatible completion, vision and speech endpoints.
//!
//! Everything that needs a model goes through [`LlmGateway`] so handlers and
//! intake tasks can be exercised against a scripted gateway in tests.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, info};

use crate::config::GatewayConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to the AI service failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Authentication failed. Please check your API key.")]
    Unauthorized,

    #[error("API quota exceeded. Please try again later.")]
    QuotaExceeded,

    #[error(
        "The selected model does not support image analysis. Please use a vision-capable model."
    )]
    UnsupportedModality,

    #[error("AI service returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Received empty response from the AI model")]
    EmptyCompletion,

    #[error("Invalid response format from the AI model")]
    InvalidFormat,
}

impl GatewayError {
    /// Status code to surface when an upstream status should be passed through.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            GatewayError::Upstream { status, .. } => Some(*status),
            GatewayError::Unauthorized => Some(401),
            GatewayError::QuotaExceeded => Some(429),
            _ => None,
        }
    }
}

/// One piece of a multi-part user message.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    /// `data:` URL or remote URL of an image
    ImageUrl(String),
}

/// A single, non-streamed chat completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: Option<String>,
    pub content: Vec<ContentPart>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: Option<f32>,
    /// Ask the provider to force a JSON object reply
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            content: vec![ContentPart::Text(prompt.into())],
            temperature: 0.3,
            max_tokens: 500,
            top_p: None,
            json_mode: false,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    pub fn image(mut self, url: impl Into<String>) -> Self {
        self.content.push(ContentPart::ImageUrl(url.into()));
        self
    }

    pub fn has_image(&self) -> bool {
        self.content
            .iter()
            .any(|part| matches!(part, ContentPart::ImageUrl(_)))
    }

    /// Chat-completions payload in the OpenAI wire format.
    pub fn to_payload(&self) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &self.system {
            messages.push(json!({ "role": "system", "content": system }));
        }

        let user_content = match self.content.as_slice() {
            [ContentPart::Text(text)] => json!(text),
            parts => Value::Array(
                parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text(text) => json!({ "type": "text", "text": text }),
                        ContentPart::ImageUrl(url) => json!({
                            "type": "image_url",
                            "image_url": { "url": url }
                        }),
                    })
                    .collect(),
            ),
        };
        messages.push(json!({ "role": "user", "content": user_content }));

        let mut payload = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        if let Some(top_p) = self.top_p {
            payload["top_p"] = json!(top_p);
        }
        if self.json_mode {
            payload["response_format"] = json!({ "type": "json_object" });
        }
        payload
    }
}

/// Models the service talks to, taken from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSet {
    pub text: String,
    pub vision: String,
}

#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Model names requests should be addressed to
    fn models(&self) -> &ModelSet;

    /// Run one completion and return the text of the first choice.
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError>;

    /// Synthesize `text` with `voice`, returning WAV bytes.
    async fn speak(&self, text: &str, voice: &str) -> Result<Vec<u8>, GatewayError>;
}

/// Groq (OpenAI-compatible) implementation of [`LlmGateway`].
pub struct GroqGateway {
    client: Client,
    base_url: String,
    api_key: String,
    tts_model: String,
    models: ModelSet,
}

impl GroqGateway {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            tts_model: config.tts_model.clone(),
            models: ModelSet {
                text: config.text_model.clone(),
                vision: config.vision_model.clone(),
            },
        }
    }

    async fn post(&self, path: &str, payload: &Value) -> Result<reqwest::Response, GatewayError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(payload)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        error!(status, body = %body, path, "AI service request failed");
        Err(classify_failure(status, &body))
    }
}

/// Map a failed upstream response onto the error taxonomy.
fn classify_failure(status: u16, body: &str) -> GatewayError {
    if status == 401 {
        return GatewayError::Unauthorized;
    }
    if body.contains("insufficient_quota") {
        return GatewayError::QuotaExceeded;
    }
    if body.contains("does not support multimodal") {
        return GatewayError::UnsupportedModality;
    }

    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| "request failed".to_string());
    GatewayError::Upstream { status, message }
}

#[async_trait]
impl LlmGateway for GroqGateway {
    fn models(&self) -> &ModelSet {
        &self.models
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        info!(
            model = %request.model,
            json_mode = request.json_mode,
            with_image = request.has_image(),
            "Sending completion request"
        );

        let response: Value = self
            .post("/chat/completions", &request.to_payload())
            .await?
            .json()
            .await?;

        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(GatewayError::EmptyCompletion)?;
        if content.trim().is_empty() {
            return Err(GatewayError::EmptyCompletion);
        }

        Ok(content.to_string())
    }

    async fn speak(&self, text: &str, voice: &str) -> Result<Vec<u8>, GatewayError> {
        let payload = json!({
            "model": self.tts_model,
            "input": text,
            "voice": voice,
            "response_format": "wav",
        });

        let audio = self.post("/audio/speech", &payload).await?.bytes().await?;
        info!(bytes = audio.len(), voice, "Synthesized speech");
        Ok(audio.to_vec())
    }
}
