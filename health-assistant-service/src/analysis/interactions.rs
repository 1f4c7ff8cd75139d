use serde::{Deserialize, Serialize};
use tracing::info;

use super::{AnalysisError, complete_structured, structured_request};
use crate::gateway::LlmGateway;
use crate::reply::{
    flexible_text, lenient_bool, lenient_level, lenient_list, lenient_optional_list, text_list,
};

const INTERACTION_SYSTEM_PROMPT: &str = r#"You are a pharmacologist and medical expert specialized in drug interactions.
Analyze the list of medicines provided and identify any potential interactions between them.

Drug Interaction Analysis Requirements:
1. Identify any known interactions between the provided medicines
2. Explain the mechanism of each interaction
3. Describe the potential effects of each interaction
4. Rate the severity of each interaction (mild, moderate, severe)
5. Provide recommendations for managing each interaction
6. Suggest general precautions for taking these medications
7. When appropriate, suggest alternatives with fewer interactions

Response Format (JSON):
{
  "summary": "Brief overall summary of interaction analysis",
  "interactionFound": boolean,
  "interactions": [
    {
      "medicines": ["Medicine 1", "Medicine 2"],
      "severity": "mild | moderate | severe",
      "mechanism": "Description of how these medicines interact",
      "effects": "Description of potential effects",
      "recommendations": "Recommendations for managing this interaction"
    }
  ],
  "precautions": ["List of general precautions"],
  "alternatives": [
    {
      "medicine": "Original medicine",
      "alternative": "Suggested alternative with fewer interactions"
    }
  ]
}"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionSeverity {
    Mild,
    Moderate,
    Severe,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Interaction {
    #[serde(deserialize_with = "text_list")]
    pub medicines: Vec<String>,
    #[serde(deserialize_with = "lenient_level")]
    pub severity: InteractionSeverity,
    #[serde(deserialize_with = "flexible_text")]
    pub mechanism: String,
    #[serde(deserialize_with = "flexible_text")]
    pub effects: String,
    #[serde(deserialize_with = "flexible_text")]
    pub recommendations: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alternative {
    #[serde(deserialize_with = "flexible_text")]
    pub medicine: String,
    #[serde(deserialize_with = "flexible_text")]
    pub alternative: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InteractionReport {
    #[serde(deserialize_with = "flexible_text")]
    pub summary: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub interaction_found: bool,
    #[serde(deserialize_with = "lenient_list")]
    pub interactions: Vec<Interaction>,
    #[serde(deserialize_with = "text_list")]
    pub precautions: Vec<String>,
    #[serde(
        deserialize_with = "lenient_optional_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub alternatives: Option<Vec<Alternative>>,
}

/// Trimmed, non-empty medicine names in their original order.
pub fn clean_medicine_names(names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ask the text model about interactions between at least two medicines.
pub async fn check_interactions(
    gateway: &dyn LlmGateway,
    medicine_names: &[String],
) -> Result<InteractionReport, AnalysisError> {
    let names = clean_medicine_names(medicine_names);
    if names.len() < 2 {
        return Err(AnalysisError::Invalid(
            "Please provide at least two medicine names".to_string(),
        ));
    }
    info!(count = names.len(), "Checking medicine interactions");

    let prompt = format!(
        "Please analyze potential interactions between the following medicines: {}",
        names.join(", ")
    );
    let request = structured_request(&gateway.models().text, INTERACTION_SYSTEM_PROMPT, prompt);
    complete_structured(gateway, request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ContentPart, GatewayError};
    use crate::testing::ScriptedGateway;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn fewer_than_two_names_is_rejected_without_a_call() {
        let gateway = ScriptedGateway::new();
        for list in [vec![], names(&["aspirin"]), names(&["aspirin", "  ", ""])] {
            match check_interactions(&gateway, &list).await {
                Err(AnalysisError::Invalid(m)) => {
                    assert_eq!(m, "Please provide at least two medicine names")
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn names_are_trimmed_into_the_prompt() {
        let gateway = ScriptedGateway::replying(
            r#"{"summary": "One interaction", "interactionFound": true,
                "interactions": [{"medicines": ["warfarin", "aspirin"], "severity": "Severe",
                  "mechanism": "Additive anticoagulation", "effects": "Bleeding risk",
                  "recommendations": "Avoid combination"}],
                "precautions": ["Monitor INR"]}"#,
        );
        let report = check_interactions(&gateway, &names(&[" warfarin ", "aspirin"]))
            .await
            .unwrap();

        assert!(report.interaction_found);
        assert_eq!(report.interactions[0].severity, InteractionSeverity::Severe);
        assert_eq!(report.alternatives, None);

        let request = &gateway.requests()[0];
        assert_eq!(request.model, "text-model");
        assert!(request.json_mode);
        assert_eq!(
            request.content,
            vec![ContentPart::Text(
                "Please analyze potential interactions between the following medicines: warfarin, aspirin"
                    .to_string()
            )]
        );
    }

    #[tokio::test]
    async fn null_lists_and_quoted_flags_still_decode() {
        let gateway = ScriptedGateway::replying(
            r#"{"summary": "No interactions", "interactionFound": "false",
                "interactions": null, "precautions": null, "alternatives": null}"#,
        )
        .then(r#"{"summary": "One", "interactionFound": "true", "interactions": {"medicines": ["a", "b"]}}"#);

        let report = check_interactions(&gateway, &names(&["paracetamol", "cetirizine"]))
            .await
            .unwrap();
        assert_eq!(report.summary, "No interactions");
        assert!(!report.interaction_found);
        assert!(report.interactions.is_empty());
        assert!(report.precautions.is_empty());
        assert_eq!(report.alternatives, None);

        let report = check_interactions(&gateway, &names(&["a", "b"])).await.unwrap();
        assert!(report.interaction_found);
        assert_eq!(report.interactions.len(), 1);
        assert_eq!(report.interactions[0].severity, InteractionSeverity::Unknown);
    }

    #[tokio::test]
    async fn gateway_failure_is_reported() {
        let gateway = ScriptedGateway::failing(GatewayError::EmptyCompletion);
        let result = check_interactions(&gateway, &names(&["a", "b"])).await;
        assert!(matches!(
            result,
            Err(AnalysisError::Gateway(GatewayError::EmptyCompletion))
        ));
    }
}
