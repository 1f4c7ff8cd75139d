use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::info;

use super::{AnalysisError, ImagePayload, analyze_image};
use crate::gateway::LlmGateway;
use crate::reply::{flexible_text, lenient_level, text_list};

const ECG_SYSTEM_PROMPT: &str = r#"You are a highly skilled cardiologist specialized in ECG analysis.
Analyze the provided ECG image and provide a detailed, professional assessment.

ECG Conditions to Check:
• Normal ECG (NORM)
• Left bundle branch block (LBBB)
• Right bundle branch block (RBBB)
• Atrial fibrillation (AFIB)
• Atrial flutter (AFLT)
• First degree AV block (fAVB)
• Myocardial infarction (MI)
• Wolff-Parkinson White (WPW)
• Supraventricular tachycardia
• Ventricular tachycardia (VT)
• Ventricular fibrillation (VF)
• ST elevation
• ST depression
• T wave inversion
• QT prolongation

Analysis Requirements:
1. Heart rate and rhythm analysis
2. Identification of any abnormalities or patterns
3. Potential diagnostic considerations
4. Severity assessment (normal, mild concern, moderate concern, severe concern)

Response Format (JSON):
{
  "heartRate": string,
  "rhythm": string,
  "abnormalities": string[] | null,
  "interpretation": string,
  "severityLevel": "normal" | "mild" | "moderate" | "severe",
  "recommendations": string[]
}"#;

const ECG_INSTRUCTION: &str = "Please analyze this ECG image and provide a detailed assessment.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EcgSeverity {
    Normal,
    Mild,
    Moderate,
    Severe,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EcgAnalysis {
    #[serde(deserialize_with = "flexible_text")]
    pub heart_rate: String,
    #[serde(deserialize_with = "flexible_text")]
    pub rhythm: String,
    /// `None` when the model reports no abnormalities at all
    #[serde(deserialize_with = "abnormality_list")]
    pub abnormalities: Option<Vec<String>>,
    #[serde(deserialize_with = "flexible_text")]
    pub interpretation: String,
    #[serde(deserialize_with = "lenient_level")]
    pub severity_level: EcgSeverity,
    #[serde(deserialize_with = "text_list")]
    pub recommendations: Vec<String>,
}

fn abnormality_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    text_list(value).map(Some).map_err(serde::de::Error::custom)
}

/// Interpret an ECG photo sent as base64 (bare or data URL).
pub async fn analyze_ecg(
    gateway: &dyn LlmGateway,
    image_base64: Option<&str>,
    limit_mb: usize,
) -> Result<EcgAnalysis, AnalysisError> {
    let encoded = image_base64
        .filter(|data| !data.trim().is_empty())
        .ok_or_else(|| AnalysisError::Invalid("No image data provided".to_string()))?;

    let image = ImagePayload::from_base64(encoded)?;
    image.ensure_within(limit_mb)?;
    info!(mime = %image.mime, bytes = image.bytes.len(), "Analyzing ECG image");

    analyze_image(gateway, ECG_SYSTEM_PROMPT, ECG_INSTRUCTION, &image).await
}
