use serde::{Deserialize, Serialize};
use tracing::info;

use super::{AnalysisError, ImagePayload, analyze_image};
use crate::gateway::LlmGateway;
use crate::reply::{
    flexible_text, lenient_bool, lenient_level, lenient_list, lenient_number, optional_text,
    text_list,
};

const SKIN_SYSTEM_PROMPT: &str = r#"You are a highly skilled dermatologist with expertise in identifying skin conditions from images.
Analyze the provided skin image and provide a detailed, professional assessment.

Analysis Requirements:
1. Identify potential skin conditions visible in the image
2. Provide a summary of your observations
3. List possible skin conditions with estimated probabilities
4. Include differential diagnosis considerations
5. Suggest general recommendations
6. Assess severity level (low, moderate, high)
7. Determine if a follow-up with a dermatologist is recommended

Response Format (JSON):
{
  "summary": "Detailed summary of the skin condition visible in the image",
  "possibleConditions": [
    {
      "name": "Condition name",
      "probability": float (0-1),
      "description": "Short description of the condition"
    }
  ],
  "recommendations": ["List of recommendations"],
  "severity": "low" | "moderate" | "high" | "unknown",
  "followUpNeeded": boolean,
  "differentialDiagnosis": "Potential alternative diagnoses to consider",
  "skinType": "Description of skin type if relevant",
  "additionalObservations": "Any additional relevant observations"
}"#;

const SKIN_INSTRUCTION: &str =
    "Please analyze this skin image and provide a detailed assessment based on what you can see.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkinSeverity {
    Low,
    Moderate,
    High,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PossibleCondition {
    #[serde(deserialize_with = "flexible_text")]
    pub name: String,
    /// Between 0 and 1, as estimated by the model
    #[serde(deserialize_with = "lenient_number")]
    pub probability: f64,
    #[serde(deserialize_with = "flexible_text")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkinAnalysis {
    #[serde(deserialize_with = "flexible_text")]
    pub summary: String,
    #[serde(deserialize_with = "lenient_list")]
    pub possible_conditions: Vec<PossibleCondition>,
    #[serde(deserialize_with = "text_list")]
    pub recommendations: Vec<String>,
    #[serde(deserialize_with = "lenient_level")]
    pub severity: SkinSeverity,
    #[serde(deserialize_with = "lenient_bool")]
    pub follow_up_needed: bool,
    #[serde(deserialize_with = "flexible_text")]
    pub differential_diagnosis: String,
    #[serde(deserialize_with = "optional_text", skip_serializing_if = "Option::is_none")]
    pub skin_type: Option<String>,
    #[serde(deserialize_with = "optional_text", skip_serializing_if = "Option::is_none")]
    pub additional_observations: Option<String>,
}

/// Assess a skin photo sent as a data URL or bare base64.
pub async fn analyze_skin(
    gateway: &dyn LlmGateway,
    image: Option<&str>,
    limit_mb: usize,
) -> Result<SkinAnalysis, AnalysisError> {
    let encoded = image
        .filter(|data| !data.trim().is_empty())
        .ok_or_else(|| AnalysisError::Invalid("No image provided".to_string()))?;

    let image = ImagePayload::from_base64(encoded)?;
    image.ensure_within(limit_mb)?;
    info!(mime = %image.mime, bytes = image.bytes.len(), "Analyzing skin image");

    analyze_image(gateway, SKIN_SYSTEM_PROMPT, SKIN_INSTRUCTION, &image).await
}
