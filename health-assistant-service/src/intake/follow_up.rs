use tracing::{error, info};

use super::categories::MedicalCategory;
use super::diagnosis::DiagnosisResult;
use super::state::PatientRecord;
use crate::gateway::{CompletionRequest, LlmGateway};

/// What a post-diagnosis message is asking for.
///
/// Routing is keyword matching on the lower-cased message, checked in declaration
/// order, so "yes, tell me more" is a request for more information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUpIntent {
    Treatment,
    MoreInformation,
    GeneralAdvice,
    Question,
}

impl FollowUpIntent {
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|w| lowered.contains(w));

        if mentions(&["medicine", "treatment"]) {
            FollowUpIntent::Treatment
        } else if mentions(&["more information", "tell me more"]) {
            FollowUpIntent::MoreInformation
        } else if mentions(&["yes"]) {
            FollowUpIntent::GeneralAdvice
        } else {
            FollowUpIntent::Question
        }
    }
}

fn category_name(category: Option<MedicalCategory>) -> &'static str {
    category.unwrap_or(MedicalCategory::General).name()
}

pub fn treatment_reply(patient: &PatientRecord) -> String {
    format!(
        "I understand you're looking for relief, {}. While I can provide general information about management options, it's important to consult a healthcare professional for specific medical advice and prescriptions tailored to your situation.",
        patient.name
    )
}

/// Free-text answer from the gateway, or `fallback` when the call fails.
async fn answer_or(
    gateway: &dyn LlmGateway,
    system: &str,
    prompt: String,
    max_tokens: u32,
    fallback: &str,
) -> String {
    let request = CompletionRequest::new(gateway.models().text.clone(), prompt)
        .system(system)
        .temperature(0.3)
        .max_tokens(max_tokens);

    match gateway.complete(request).await {
        Ok(answer) => answer,
        Err(e) => {
            error!(error = %e, "Follow-up answer failed");
            fallback.to_string()
        }
    }
}

pub async fn general_advice(
    gateway: &dyn LlmGateway,
    patient: &PatientRecord,
    category: Option<MedicalCategory>,
) -> String {
    let prompt = format!(
        "A patient is experiencing the following symptoms: {}.\n\
         The symptoms are related to {}.\n\
         Provide brief, helpful general advice for managing these symptoms at home.\n\
         Include when they should seek professional medical help.\n\
         Keep your response under 250 words and focus on practical, safe advice.",
        patient.symptoms.join(", "),
        category_name(category),
    );
    answer_or(
        gateway,
        "You are a medical information assistant providing general health advice. You always recommend seeing a doctor for proper diagnosis and treatment.",
        prompt,
        500,
        "I recommend consulting a healthcare professional for advice tailored to your situation.",
    )
    .await
}

pub async fn detailed_information(
    gateway: &dyn LlmGateway,
    patient: &PatientRecord,
    category: Option<MedicalCategory>,
    diagnosis: Option<&DiagnosisResult>,
) -> String {
    let subject = diagnosis
        .and_then(DiagnosisResult::top_condition)
        .unwrap_or("the possible conditions");
    let prompt = format!(
        "Provide more detailed information about {subject}\n\
         in the field of {}, related to these symptoms: {}.\n\
         Include common causes, typical progression, and when to seek immediate medical attention.\n\
         Keep your response under 300 words and ensure it's factually accurate.",
        category_name(category),
        patient.symptoms.join(", "),
    );
    answer_or(
        gateway,
        "You are a medical information assistant providing educational content. You do not provide medical advice, only factual information.",
        prompt,
        600,
        "For more detailed information about your condition, I recommend consulting with a healthcare professional who can provide personalized guidance.",
    )
    .await
}

pub async fn answer_question(
    gateway: &dyn LlmGateway,
    question: &str,
    patient: &PatientRecord,
    category: Option<MedicalCategory>,
) -> String {
    let prompt = format!(
        "A patient with the following symptoms: {} related to {} is asking: \"{question}\".\n\
         Provide a helpful, informative response while being clear that you're not providing medical advice.\n\
         Keep your response under 250 words and focus on factual information.",
        patient.symptoms.join(", "),
        category_name(category),
    );
    answer_or(
        gateway,
        "You are a medical information assistant. You provide general health information but always clarify that you're not providing medical advice.",
        prompt,
        500,
        "I apologize, but I encountered an issue processing your question. For accurate information, please consult a healthcare professional.",
    )
    .await
}

/// Route a post-diagnosis message to its handler.
pub async fn respond(
    gateway: &dyn LlmGateway,
    message: &str,
    patient: &PatientRecord,
    category: Option<MedicalCategory>,
    diagnosis: Option<&DiagnosisResult>,
) -> String {
    let intent = FollowUpIntent::classify(message);
    info!(?intent, "Routing follow-up message");

    match intent {
        FollowUpIntent::Treatment => treatment_reply(patient),
        FollowUpIntent::MoreInformation => {
            detailed_information(gateway, patient, category, diagnosis).await
        }
        FollowUpIntent::GeneralAdvice => general_advice(gateway, patient, category).await,
        FollowUpIntent::Question => answer_question(gateway, message, patient, category).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayError;
    use crate::intake::diagnosis::ConditionLikelihood;
    use crate::testing::ScriptedGateway;

    fn patient() -> PatientRecord {
        PatientRecord {
            name: "Sam".into(),
            symptoms: vec!["headache".into()],
            ..PatientRecord::default()
        }
    }

    #[test]
    fn keyword_routing() {
        assert_eq!(FollowUpIntent::classify("Which medicine should I take?"), FollowUpIntent::Treatment);
        assert_eq!(FollowUpIntent::classify("any TREATMENT options"), FollowUpIntent::Treatment);
        assert_eq!(FollowUpIntent::classify("Tell me more"), FollowUpIntent::MoreInformation);
        assert_eq!(FollowUpIntent::classify("I want more information"), FollowUpIntent::MoreInformation);
        assert_eq!(FollowUpIntent::classify("Yes please"), FollowUpIntent::GeneralAdvice);
        assert_eq!(FollowUpIntent::classify("yes, tell me more"), FollowUpIntent::MoreInformation);
        assert_eq!(FollowUpIntent::classify("Is it contagious?"), FollowUpIntent::Question);
    }

    #[tokio::test]
    async fn treatment_reply_is_canned() {
        let gateway = ScriptedGateway::new();
        let reply = respond(&gateway, "what treatment?", &patient(), None, None).await;
        assert!(reply.starts_with("I understand you're looking for relief, Sam."));
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn more_information_names_top_condition() {
        let gateway = ScriptedGateway::replying("Migraines are...");
        let diagnosis = DiagnosisResult {
            conditions: vec![ConditionLikelihood { condition: "Migraine".into(), likelihood: 70 }],
        };
        let reply = respond(
            &gateway,
            "tell me more",
            &patient(),
            Some(MedicalCategory::Neuro),
            Some(&diagnosis),
        )
        .await;

        assert_eq!(reply, "Migraines are...");
        let request = &gateway.requests()[0];
        assert_eq!(request.max_tokens, 600);
        assert!(!request.json_mode);
        let prompt = format!("{:?}", request.content);
        assert!(prompt.contains("Migraine"));
        assert!(prompt.contains("Neurology"));
    }

    #[tokio::test]
    async fn failures_fall_back_to_canned_text() {
        let gateway = ScriptedGateway::failing(GatewayError::QuotaExceeded);
        let reply = respond(&gateway, "yes", &patient(), None, None).await;
        assert_eq!(
            reply,
            "I recommend consulting a healthcare professional for advice tailored to your situation."
        );

        let gateway = ScriptedGateway::failing(GatewayError::EmptyCompletion);
        let reply = respond(&gateway, "is it serious?", &patient(), None, None).await;
        assert!(reply.starts_with("I apologize, but I encountered an issue"));
    }

    #[tokio::test]
    async fn free_question_is_quoted() {
        let gateway = ScriptedGateway::replying("Usually not.");
        respond(&gateway, "Is it contagious?", &patient(), None, None).await;
        let prompt = format!("{:?}", gateway.requests()[0].content);
        assert!(prompt.contains("Is it contagious?"));
        assert!(prompt.contains("General Medicine"));
    }
}
