//! One task per intake step, plus the transient diagnosis task.

use std::sync::Arc;

use async_trait::async_trait;
use intake_flow::{Context, NextAction, Result, Task, TaskResult};
use tracing::info;

use super::categories::{MedicalCategory, determine_category};
use super::diagnosis::{DiagnosisResult, format_diagnosis, request_diagnosis};
use super::follow_up;
use super::state::{PatientRecord, mentions_yes, optional_list, parse_severity, split_list};
use crate::gateway::LlmGateway;

pub mod session_keys {
    pub const USER_INPUT: &str = "user_input";
    pub const PATIENT: &str = "patient";
    pub const CATEGORY: &str = "category";
    pub const DIAGNOSIS: &str = "diagnosis";
}

async fn user_input(context: &Context) -> Result<String> {
    context.require(session_keys::USER_INPUT).await
}

async fn load_patient(context: &Context) -> PatientRecord {
    context.get(session_keys::PATIENT).await.unwrap_or_default()
}

async fn save_patient(context: &Context, patient: &PatientRecord) -> Result<()> {
    context.set(session_keys::PATIENT, patient).await
}

async fn load_category(context: &Context) -> Option<MedicalCategory> {
    context.get(session_keys::CATEGORY).await
}

/// Store one answer with `record`, then ask `question` and wait on the next task.
async fn record_and_ask(
    context: &Context,
    record: impl FnOnce(&mut PatientRecord, String),
    question: String,
) -> Result<TaskResult> {
    let answer = user_input(context).await?;
    let mut patient = load_patient(context).await;
    record(&mut patient, answer);
    save_patient(context, &patient).await?;
    Ok(TaskResult::new(Some(question), NextAction::Continue))
}

/// Step 0
pub struct NameTask;

#[async_trait]
impl Task for NameTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let answer = user_input(&context).await?;
        let question = format!(
            "Hi {answer}, please describe what medical concerns you'd like to discuss today? I can help with a wide range of symptoms and health concerns."
        );
        record_and_ask(&context, |p, name| p.name = name, question).await
    }
}

/// Step 1: also picks the category, which stays fixed for the rest of the conversation.
pub struct SymptomsTask;

#[async_trait]
impl Task for SymptomsTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let answer = user_input(&context).await?;
        let profile = determine_category(&answer);
        info!(category = ?profile.category, "Symptoms classified");
        context.set(session_keys::CATEGORY, profile.category).await?;

        let question = format!(
            "Based on your description, you might want to consult with a {}. Let's gather more information to better understand your situation. Please enter your age:",
            profile.specialist
        );
        record_and_ask(&context, |p, text| p.symptoms = split_list(&text), question).await
    }
}

/// Step 2
pub struct AgeTask;

#[async_trait]
impl Task for AgeTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        record_and_ask(
            &context,
            |p, age| p.age = age,
            "Thank you. Please enter your biological sex (Male/Female/Other):".to_string(),
        )
        .await
    }
}

/// Step 3
pub struct SexTask;

#[async_trait]
impl Task for SexTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        record_and_ask(
            &context,
            |p, sex| p.sex = sex,
            "How long have you been experiencing these symptoms? (e.g., 2 days, 1 week, several months)"
                .to_string(),
        )
        .await
    }
}

/// Step 4
pub struct DurationTask;

#[async_trait]
impl Task for DurationTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        record_and_ask(
            &context,
            |p, duration| p.duration = duration,
            "Are these symptoms constant or do they come and go? (Yes/No for constant):".to_string(),
        )
        .await
    }
}

/// Step 5
pub struct ConstancyTask;

#[async_trait]
impl Task for ConstancyTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        record_and_ask(
            &context,
            |p, answer| p.is_constant = mentions_yes(&answer),
            "On a scale of 1 to 10, how severe would you rate your symptoms?".to_string(),
        )
        .await
    }
}

/// Step 6
pub struct SeverityTask;

#[async_trait]
impl Task for SeverityTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        record_and_ask(
            &context,
            |p, answer| p.severity = parse_severity(&answer),
            "Do you have any known medical conditions or diagnoses? (List them separated by commas, or type \"none\")"
                .to_string(),
        )
        .await
    }
}

/// Step 7
pub struct ConditionsTask;

#[async_trait]
impl Task for ConditionsTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        record_and_ask(
            &context,
            |p, answer| {
                if let Some(conditions) = optional_list(&answer) {
                    p.previous_conditions = conditions;
                }
            },
            "Are you currently taking any medications? (List them separated by commas, or type \"none\")"
                .to_string(),
        )
        .await
    }
}

/// Step 8. Categories with a clarifying question ask it next; the rest go
/// straight to the diagnosis within the same turn.
pub struct MedicationsTask;

#[async_trait]
impl Task for MedicationsTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let answer = user_input(&context).await?;
        let mut patient = load_patient(&context).await;
        if let Some(medications) = optional_list(&answer) {
            patient.medications = medications;
        }
        save_patient(&context, &patient).await?;

        match load_category(&context)
            .await
            .and_then(MedicalCategory::follow_up_question)
        {
            Some(question) => Ok(TaskResult::new(
                Some(question.to_string()),
                NextAction::Continue,
            )),
            None => Ok(TaskResult::new_with_status(
                None,
                NextAction::ContinueAndExecute,
                Some("No clarifying question for this category".to_string()),
            )),
        }
    }
}

/// Step 9
pub struct CategoryAnswerTask;

#[async_trait]
impl Task for CategoryAnswerTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let answer = user_input(&context).await?;
        let mut patient = load_patient(&context).await;
        patient.category_specific_answer = Some(answer);
        save_patient(&context, &patient).await?;
        Ok(TaskResult::new(None, NextAction::ContinueAndExecute))
    }
}

/// Asks the gateway for a differential. Never waits for input of its own.
pub struct DiagnosisTask {
    gateway: Arc<dyn LlmGateway>,
}

impl DiagnosisTask {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Task for DiagnosisTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let patient = load_patient(&context).await;
        let category = load_category(&context).await;

        let diagnosis = request_diagnosis(self.gateway.as_ref(), &patient, category).await;
        let reply = format_diagnosis(&diagnosis);
        context.set(session_keys::DIAGNOSIS, &diagnosis).await?;

        Ok(TaskResult::new_with_status(
            Some(reply),
            NextAction::Continue,
            Some(format!("{} conditions suggested", diagnosis.conditions.len())),
        ))
    }
}

/// Step 10: answers follow-up messages indefinitely.
pub struct FollowUpTask {
    gateway: Arc<dyn LlmGateway>,
}

impl FollowUpTask {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Task for FollowUpTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let message = user_input(&context).await?;
        let patient = load_patient(&context).await;
        let category = load_category(&context).await;
        let diagnosis: Option<DiagnosisResult> = context.get(session_keys::DIAGNOSIS).await;

        let reply = follow_up::respond(
            self.gateway.as_ref(),
            &message,
            &patient,
            category,
            diagnosis.as_ref(),
        )
        .await;
        Ok(TaskResult::new(Some(reply), NextAction::WaitForInput))
    }
}
