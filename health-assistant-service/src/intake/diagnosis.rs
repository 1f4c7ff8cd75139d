use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{error, info};

use super::categories::MedicalCategory;
use super::state::PatientRecord;
use crate::gateway::{CompletionRequest, LlmGateway};
use crate::reply::{ParsedReply, parse_lenient};

const DIAGNOSIS_SYSTEM_PROMPT: &str = "You are a medical diagnostic AI assistant. You ONLY respond with valid JSON in exactly the requested format, with no additional text, explanations, or markdown formatting. Your response should be a single JSON object that can be directly parsed.";

const DIAGNOSIS_FORMAT_INSTRUCTIONS: &str = r#"You MUST respond with ONLY a valid JSON object and nothing else - no explanation text.
Generate a structured response with the top 3 most likely conditions based on the symptoms and information above.
Format your response exactly as follows:
{
    "conditions": [
        {"condition": "Condition Name 1", "likelihood": 50},
        {"condition": "Condition Name 2", "likelihood": 30},
        {"condition": "Condition Name 3", "likelihood": 20}
    ]
}
Remember that the percentages must add up to 100%."#;

const UNPARSEABLE_CONDITION: &str = "Unidentified Condition";
const UNAVAILABLE_CONDITION: &str = "Could not determine - please try again";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub conditions: Vec<ConditionLikelihood>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionLikelihood {
    pub condition: String,
    /// Percentage. Nothing checks that the entries add up to 100.
    #[serde(deserialize_with = "lenient_percent")]
    pub likelihood: i64,
}

impl DiagnosisResult {
    fn single(condition: &str) -> Self {
        Self {
            conditions: vec![ConditionLikelihood {
                condition: condition.to_string(),
                likelihood: 100,
            }],
        }
    }

    pub fn top_condition(&self) -> Option<&str> {
        self.conditions.first().map(|c| c.condition.as_str())
    }
}

/// Accepts integers, floats (rounded) and numeric strings.
fn lenient_percent<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    number
        .map(|n| n.round() as i64)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid likelihood: {value}")))
}

/// Decode a raw model reply into a differential.
pub fn parse_diagnosis(raw: &str) -> Option<DiagnosisResult> {
    parse_lenient(raw, |value| value.get("conditions").is_some_and(Value::is_array))
}

impl ParsedReply<DiagnosisResult> {
    /// Collapse into a result that can always be shown to the patient.
    pub fn into_diagnosis(self) -> DiagnosisResult {
        match self {
            ParsedReply::Parsed(result) => result,
            ParsedReply::Fallback => DiagnosisResult::single(UNPARSEABLE_CONDITION),
            ParsedReply::MalformedUpstream(e) => {
                error!(error = %e, "Diagnosis request failed");
                DiagnosisResult::single(UNAVAILABLE_CONDITION)
            }
        }
    }
}

fn joined_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

/// Prompt describing the patient to the model.
pub fn build_diagnosis_prompt(patient: &PatientRecord, category: Option<MedicalCategory>) -> String {
    let duration = if patient.duration.is_empty() {
        "unknown duration"
    } else {
        patient.duration.as_str()
    };

    let mut additional = vec![if patient.is_constant {
        "Symptoms are constant".to_string()
    } else {
        "Symptoms come and go".to_string()
    }];
    if let Some(severity) = patient.severity.filter(|s| *s != 0) {
        additional.push(format!("Severity: {severity}/10"));
    }
    if let Some(answer) = patient
        .category_specific_answer
        .as_deref()
        .filter(|a| !a.is_empty())
    {
        additional.push(format!("Category-specific information: {answer}"));
    }

    let category_line = category
        .map(|c| format!("Medical category: {}", c.name()))
        .unwrap_or_default();

    format!(
        "Patient: {name}, {age} years old, {sex}\n\
         Symptoms: {symptoms}\n\
         Duration: {duration}\n\
         Previous medical conditions: {conditions}\n\
         Current medications: {medications}\n\
         {category_line}\n\
         Additional Information: {additional}\n\n\
         {DIAGNOSIS_FORMAT_INSTRUCTIONS}",
        name = patient.name,
        age = patient.age,
        sex = patient.sex,
        symptoms = patient.symptoms.join(", "),
        conditions = joined_or_none(&patient.previous_conditions),
        medications = joined_or_none(&patient.medications),
        additional = additional.join(", "),
    )
}

/// Ask the gateway for a ranked differential. Never fails; see [`ParsedReply::into_diagnosis`].
pub async fn request_diagnosis(
    gateway: &dyn LlmGateway,
    patient: &PatientRecord,
    category: Option<MedicalCategory>,
) -> DiagnosisResult {
    let request = CompletionRequest::new(
        gateway.models().text.clone(),
        build_diagnosis_prompt(patient, category),
    )
    .system(DIAGNOSIS_SYSTEM_PROMPT)
    .temperature(0.3)
    .max_tokens(500)
    .top_p(0.9)
    .json();

    let diagnosis =
        ParsedReply::from_completion(gateway.complete(request).await, parse_diagnosis).into_diagnosis();
    info!(
        conditions = diagnosis.conditions.len(),
        top = ?diagnosis.top_condition(),
        "Diagnosis generated"
    );
    diagnosis
}

/// Bulleted reply shown to the patient.
pub fn format_diagnosis(diagnosis: &DiagnosisResult) -> String {
    let mut reply = String::from("Based on your symptoms, possible conditions are:\n");
    for entry in &diagnosis.conditions {
        reply.push_str(&format!("• {}: {}%\n", entry.condition, entry.likelihood));
    }
    reply.push_str(
        "\nPlease consult a medical professional for accurate diagnosis. \
         Would you like some general information about managing your symptoms?",
    );
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayError;
    use crate::testing::ScriptedGateway;

    fn patient() -> PatientRecord {
        PatientRecord {
            name: "Alex".into(),
            age: "34".into(),
            sex: "Female".into(),
            symptoms: vec!["chest pain".into(), "shortness of breath".into()],
            duration: "2 days".into(),
            is_constant: true,
            severity: Some(7),
            previous_conditions: vec![],
            medications: vec!["ibuprofen".into()],
            category_specific_answer: Some("Yes".into()),
        }
    }

    #[test]
    fn non_json_yields_the_fallback() {
        let reply =
            ParsedReply::from_completion(Ok("I think it is probably a cold".into()), parse_diagnosis);
        assert!(matches!(reply, ParsedReply::Fallback));
        assert_eq!(
            reply.into_diagnosis(),
            DiagnosisResult::single("Unidentified Condition")
        );
    }

    #[test]
    fn missing_conditions_array_yields_the_fallback() {
        assert_eq!(parse_diagnosis(r#"{"conditions": "flu"}"#), None);
        assert_eq!(parse_diagnosis(r#"{"diagnosis": []}"#), None);
    }

    #[test]
    fn gateway_failure_yields_retry_message() {
        let reply: ParsedReply<DiagnosisResult> =
            ParsedReply::from_completion(Err(GatewayError::EmptyCompletion), parse_diagnosis);
        assert_eq!(
            reply.into_diagnosis().top_condition(),
            Some("Could not determine - please try again")
        );
    }

    #[test]
    fn fenced_reply_with_loose_numbers_parses() {
        let raw = "```json\n{\"conditions\": [{\"condition\": \"Angina\", \"likelihood\": 50.0}, \
                   {\"condition\": \"GERD\", \"likelihood\": \"30%\"}, \
                   {\"condition\": \"Costochondritis\", \"likelihood\": 20}]}\n```";
        let diagnosis = parse_diagnosis(raw).unwrap();
        let likelihoods: Vec<i64> = diagnosis.conditions.iter().map(|c| c.likelihood).collect();
        assert_eq!(likelihoods, vec![50, 30, 20]);
    }

    #[test]
    fn prompt_embeds_the_record() {
        let prompt = build_diagnosis_prompt(&patient(), Some(MedicalCategory::Respiratory));
        assert!(prompt.starts_with("Patient: Alex, 34 years old, Female\n"));
        assert!(prompt.contains("Symptoms: chest pain, shortness of breath"));
        assert!(prompt.contains("Previous medical conditions: none"));
        assert!(prompt.contains("Current medications: ibuprofen"));
        assert!(prompt.contains("Medical category: Respiratory"));
        assert!(prompt.contains(
            "Additional Information: Symptoms are constant, Severity: 7/10, Category-specific information: Yes"
        ));
    }

    #[test]
    fn prompt_skips_zero_or_unparsed_severity() {
        let mut record = patient();
        record.severity = None;
        record.duration.clear();
        let prompt = build_diagnosis_prompt(&record, None);
        assert!(!prompt.contains("Severity"));
        assert!(prompt.contains("Duration: unknown duration"));
        assert!(!prompt.contains("Medical category"));
    }

    #[test]
    fn formatting_lists_each_condition() {
        let diagnosis = DiagnosisResult {
            conditions: vec![
                ConditionLikelihood { condition: "Migraine".into(), likelihood: 60 },
                ConditionLikelihood { condition: "Tension headache".into(), likelihood: 40 },
            ],
        };
        let reply = format_diagnosis(&diagnosis);
        assert!(reply.starts_with("Based on your symptoms, possible conditions are:\n• Migraine: 60%\n• Tension headache: 40%\n"));
        assert!(reply.ends_with("Would you like some general information about managing your symptoms?"));
    }

    #[tokio::test]
    async fn request_uses_json_mode_at_low_temperature() {
        let gateway = ScriptedGateway::replying(
            r#"{"conditions": [{"condition": "Asthma", "likelihood": 100}]}"#,
        );
        let diagnosis = request_diagnosis(&gateway, &patient(), Some(MedicalCategory::Respiratory)).await;
        assert_eq!(diagnosis.top_condition(), Some("Asthma"));

        let request = &gateway.requests()[0];
        assert!(request.json_mode);
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.model, "text-model");
    }
}
