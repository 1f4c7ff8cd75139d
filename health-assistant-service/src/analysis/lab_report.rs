use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{AnalysisError, ImagePayload, UploadedFile, analyze_image};
use crate::gateway::LlmGateway;
use crate::reply::{flexible_text, lenient_level, text_map};

const LAB_REPORT_SYSTEM_PROMPT: &str = r#"You are a highly skilled laboratory medicine specialist and pathologist.
Analyze the provided lab report image and provide a detailed, professional assessment.

Lab Report Analysis Requirements:
1. Identify the test names and their values from the image
2. Determine which values are outside normal reference ranges
3. Explain the significance of abnormal values
4. Provide a holistic interpretation of the lab results
5. Assess urgency level (normal, attention, urgent, critical)

Response Format (JSON):
{
  "summary": "Brief overall summary of the lab report results",
  "analysis": "Detailed interpretation of the lab report findings",
  "abnormalValues": {
    "testName1": "value1",
    "testName2": "value2"
  },
  "normalRanges": {
    "testName1": "reference range1",
    "testName2": "reference range2"
  },
  "recommendations": "Suggested follow-up actions or lifestyle modifications",
  "urgencyLevel": "normal | attention | urgent | critical"
}"#;

const LAB_REPORT_INSTRUCTION: &str =
    "Please analyze this lab report image and provide a detailed assessment.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    Normal,
    Attention,
    Urgent,
    Critical,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabReportAnalysis {
    #[serde(deserialize_with = "flexible_text")]
    pub summary: String,
    #[serde(deserialize_with = "flexible_text")]
    pub analysis: String,
    /// Test name to reported value
    #[serde(deserialize_with = "text_map")]
    pub abnormal_values: BTreeMap<String, String>,
    /// Test name to reference range
    #[serde(deserialize_with = "text_map")]
    pub normal_ranges: BTreeMap<String, String>,
    #[serde(deserialize_with = "flexible_text")]
    pub recommendations: String,
    #[serde(deserialize_with = "lenient_level")]
    pub urgency_level: UrgencyLevel,
}

/// Interpret a photographed lab report. The gateway call is bounded by `timeout`.
pub async fn analyze_lab_report(
    gateway: &dyn LlmGateway,
    upload: Option<UploadedFile>,
    limit_mb: usize,
    timeout: Duration,
) -> Result<LabReportAnalysis, AnalysisError> {
    let upload = upload.ok_or_else(|| AnalysisError::Invalid("No file uploaded".to_string()))?;
    let image = ImagePayload::from_upload(upload)?;
    image.ensure_within(limit_mb)?;
    info!(mime = %image.mime, bytes = image.bytes.len(), "Analyzing lab report");

    let analysis = analyze_image(gateway, LAB_REPORT_SYSTEM_PROMPT, LAB_REPORT_INSTRUCTION, &image);
    match tokio::time::timeout(timeout, analysis).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "Lab report analysis timed out");
            Err(AnalysisError::TimedOut(timeout.as_secs()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::payload::tests::{png_bytes, upload};
    use crate::config::megabytes;
    use crate::testing::ScriptedGateway;

    const TIMEOUT: Duration = Duration::from_secs(120);

    #[tokio::test]
    async fn validation_happens_before_the_gateway() {
        let gateway = ScriptedGateway::new();

        let cases = [
            (None, "No file uploaded"),
            (
                Some(upload(Some("text/plain"), b"hello".to_vec())),
                "Uploaded file is not an image",
            ),
            (
                Some(upload(Some("image/png"), png_bytes(megabytes(5) + 1))),
                "File size exceeds 5MB limit",
            ),
        ];
        for (file, message) in cases {
            match analyze_lab_report(&gateway, file, 5, TIMEOUT).await {
                Err(AnalysisError::Invalid(m)) => assert_eq!(m, message),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn reply_maps_values_and_urgency() {
        let gateway = ScriptedGateway::replying(
            "```json\n{\"summary\": \"Mild anemia\", \"analysis\": \"Low hemoglobin\", \
             \"abnormalValues\": {\"Hemoglobin\": 10.1}, \
             \"normalRanges\": {\"Hemoglobin\": \"12-16 g/dL\"}, \
             \"recommendations\": [\"Iron studies\", \"Repeat CBC\"], \
             \"urgencyLevel\": \"Attention\"}\n```",
        );
        let report = analyze_lab_report(
            &gateway,
            Some(upload(Some("image/png"), png_bytes(128))),
            5,
            TIMEOUT,
        )
        .await
        .unwrap();

        assert_eq!(report.summary, "Mild anemia");
        assert_eq!(report.abnormal_values["Hemoglobin"], "10.1");
        assert_eq!(report.normal_ranges["Hemoglobin"], "12-16 g/dL");
        assert_eq!(report.recommendations, "Iron studies\nRepeat CBC");
        assert_eq!(report.urgency_level, UrgencyLevel::Attention);
        assert_eq!(gateway.requests()[0].model, "vision-model");
    }
}
