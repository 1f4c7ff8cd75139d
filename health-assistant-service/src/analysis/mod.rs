//! Structured interpretation of medical images and medication lists.
//!
//! Every analysis validates its input before anything is sent to the gateway,
//! then asks for a JSON object and decodes it leniently into a typed result.

pub mod ecg;
pub mod interactions;
pub mod lab_report;
pub mod payload;
pub mod skin;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use crate::gateway::{CompletionRequest, GatewayError, LlmGateway};
use crate::reply::{ParsedReply, parse_lenient};

pub use ecg::{EcgAnalysis, analyze_ecg};
pub use interactions::{InteractionReport, check_interactions};
pub use lab_report::{LabReportAnalysis, analyze_lab_report};
pub use payload::{ImagePayload, UploadedFile, size_exceeded};
pub use skin::{SkinAnalysis, analyze_skin};

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Rejected before reaching the gateway; the message is shown to the user as is
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("AI response was not in valid JSON format")]
    Unparseable,

    #[error("Analysis timed out after {0} seconds")]
    TimedOut(u64),
}

/// Sampling used by every structured analysis.
const ANALYSIS_TEMPERATURE: f32 = 0.2;
const ANALYSIS_MAX_TOKENS: u32 = 1000;

pub(crate) fn structured_request(model: &str, system: &str, prompt: impl Into<String>) -> CompletionRequest {
    CompletionRequest::new(model, prompt)
        .system(system)
        .temperature(ANALYSIS_TEMPERATURE)
        .max_tokens(ANALYSIS_MAX_TOKENS)
        .json()
}

/// Send `request` and decode the reply as `T`. Any JSON object is accepted;
/// missing fields fall back to their defaults.
pub(crate) async fn complete_structured<T: DeserializeOwned>(
    gateway: &dyn LlmGateway,
    request: CompletionRequest,
) -> Result<T, AnalysisError> {
    let reply = ParsedReply::from_completion(gateway.complete(request).await, |raw| {
        parse_lenient(raw, Value::is_object)
    });

    match reply {
        ParsedReply::Parsed(result) => Ok(result),
        ParsedReply::Fallback => Err(AnalysisError::Unparseable),
        ParsedReply::MalformedUpstream(e) => {
            error!(error = %e, "Analysis request failed");
            Err(e.into())
        }
    }
}

/// Vision-model analysis of a validated image.
pub(crate) async fn analyze_image<T: DeserializeOwned>(
    gateway: &dyn LlmGateway,
    system: &str,
    instruction: &str,
    image: &ImagePayload,
) -> Result<T, AnalysisError> {
    let request = structured_request(&gateway.models().vision, system, instruction)
        .image(image.data_url());
    complete_structured(gateway, request).await
}
