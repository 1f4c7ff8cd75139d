use std::any::type_name;
use std::sync::Arc;

use intake_flow::{Context, Graph, GraphBuilder, GraphError, Session, Task};
use serde::Serialize;
use tracing::{info, warn};

use super::categories::MedicalCategory;
use super::state::ConversationState;
use super::tasks::*;
use crate::gateway::LlmGateway;

const RESTART_PROMPT: &str =
    "Let's start over. Please describe what medical concerns you'd like to discuss today:";

/// Step 1 is where a restarted conversation resumes.
const RESTART_STEP: i64 = 1;

/// Step number each task answers to. The diagnosis task has no step of its own.
fn step_table() -> [(i64, &'static str); 11] {
    [
        (0, type_name::<NameTask>()),
        (1, type_name::<SymptomsTask>()),
        (2, type_name::<AgeTask>()),
        (3, type_name::<SexTask>()),
        (4, type_name::<DurationTask>()),
        (5, type_name::<ConstancyTask>()),
        (6, type_name::<SeverityTask>()),
        (7, type_name::<ConditionsTask>()),
        (8, type_name::<MedicationsTask>()),
        (9, type_name::<CategoryAnswerTask>()),
        (10, type_name::<FollowUpTask>()),
    ]
}

fn task_for_step(step: i64) -> Option<&'static str> {
    step_table()
        .into_iter()
        .find(|(s, _)| *s == step)
        .map(|(_, task)| task)
}

fn step_for_task(task_id: &str) -> Option<i64> {
    step_table()
        .into_iter()
        .find(|(_, task)| *task == task_id)
        .map(|(step, _)| step)
}

/// Reply and state to hand back to the client after one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub response: String,
    pub new_state: ConversationState,
}

pub fn build_intake_graph(gateway: Arc<dyn LlmGateway>) -> Graph {
    let name = Arc::new(NameTask);
    let name_id = name.id().to_string();
    let symptoms = Arc::new(SymptomsTask);
    let symptoms_id = symptoms.id().to_string();
    let age = Arc::new(AgeTask);
    let age_id = age.id().to_string();
    let sex = Arc::new(SexTask);
    let sex_id = sex.id().to_string();
    let duration = Arc::new(DurationTask);
    let duration_id = duration.id().to_string();
    let constancy = Arc::new(ConstancyTask);
    let constancy_id = constancy.id().to_string();
    let severity = Arc::new(SeverityTask);
    let severity_id = severity.id().to_string();
    let conditions = Arc::new(ConditionsTask);
    let conditions_id = conditions.id().to_string();
    let medications = Arc::new(MedicationsTask);
    let medications_id = medications.id().to_string();
    let category_answer = Arc::new(CategoryAnswerTask);
    let category_answer_id = category_answer.id().to_string();
    let diagnosis = Arc::new(DiagnosisTask::new(gateway.clone()));
    let diagnosis_id = diagnosis.id().to_string();
    let follow_up = Arc::new(FollowUpTask::new(gateway));
    let follow_up_id = follow_up.id().to_string();

    GraphBuilder::new("health_intake")
        .add_task(name)
        .add_task(symptoms)
        .add_task(age)
        .add_task(sex)
        .add_task(duration)
        .add_task(constancy)
        .add_task(severity)
        .add_task(conditions)
        .add_task(medications)
        .add_task(category_answer)
        .add_task(diagnosis)
        .add_task(follow_up)
        .add_edge(&name_id, &symptoms_id)
        .add_edge(&symptoms_id, &age_id)
        .add_edge(&age_id, &sex_id)
        .add_edge(&sex_id, &duration_id)
        .add_edge(&duration_id, &constancy_id)
        .add_edge(&constancy_id, &severity_id)
        .add_edge(&severity_id, &conditions_id)
        .add_edge(&conditions_id, &medications_id)
        .add_conditional_edge(
            &medications_id,
            |context: &Context| {
                context
                    .get_sync::<MedicalCategory>(session_keys::CATEGORY)
                    .and_then(MedicalCategory::follow_up_question)
                    .is_some()
            },
            &category_answer_id,
            &diagnosis_id,
        )
        .add_edge(&category_answer_id, &diagnosis_id)
        .add_edge(&diagnosis_id, &follow_up_id)
        .build()
}

/// The scripted intake conversation. Holds no per-conversation data: every
/// call rebuilds a session from the state the client sent.
pub struct IntakeWorkflow {
    graph: Graph,
}

impl IntakeWorkflow {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            graph: build_intake_graph(gateway),
        }
    }

    async fn session_for(&self, state: &ConversationState, message: &str) -> intake_flow::Result<Session> {
        let task_id = task_for_step(state.step).ok_or(GraphError::UnknownStep(state.step))?;

        let context = Context::new();
        context.set(session_keys::USER_INPUT, message).await?;
        context.set(session_keys::PATIENT, &state.patient).await?;
        if let Some(category) = state.category {
            context.set(session_keys::CATEGORY, category).await?;
        }
        if let Some(diagnosis) = &state.diagnosis {
            context.set(session_keys::DIAGNOSIS, diagnosis).await?;
        }
        Ok(Session::with_context(task_id, context))
    }

    /// Run one turn: answer `message` given `state`.
    ///
    /// Unrecognized steps restart the conversation at the symptom question and
    /// keep whatever patient data was sent.
    pub async fn transition(
        &self,
        state: ConversationState,
        message: &str,
    ) -> Result<ChatTurn, GraphError> {
        let mut session = match self.session_for(&state, message).await {
            Ok(session) => session,
            Err(GraphError::UnknownStep(step)) => {
                warn!(step, "Unrecognized step, restarting conversation");
                return Ok(ChatTurn {
                    response: RESTART_PROMPT.to_string(),
                    new_state: ConversationState {
                        step: RESTART_STEP,
                        ..state
                    },
                });
            }
            Err(e) => return Err(e),
        };

        let result = self.graph.execute_session(&mut session).await?;
        let step = step_for_task(&session.current_task_id)
            .ok_or_else(|| GraphError::TaskNotFound(session.current_task_id.clone()))?;

        let context = &session.context;
        let new_state = ConversationState {
            step,
            patient: context
                .get(session_keys::PATIENT)
                .await
                .unwrap_or(state.patient),
            category: context.get(session_keys::CATEGORY).await,
            diagnosis: context.get(session_keys::DIAGNOSIS).await,
        };

        info!(
            from_step = state.step,
            to_step = step,
            status = ?session.status_message,
            "Intake turn complete"
        );

        Ok(ChatTurn {
            response: result.response.unwrap_or_default(),
            new_state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayError;
    use crate::intake::state::PatientRecord;
    use crate::testing::ScriptedGateway;

    fn workflow(gateway: ScriptedGateway) -> (IntakeWorkflow, Arc<ScriptedGateway>) {
        let gateway = Arc::new(gateway);
        (IntakeWorkflow::new(gateway.clone()), gateway)
    }

    fn at_step(step: i64, category: Option<MedicalCategory>) -> ConversationState {
        ConversationState {
            step,
            patient: PatientRecord {
                name: "Alex".into(),
                symptoms: vec!["headache".into()],
                ..PatientRecord::default()
            },
            category,
            diagnosis: None,
        }
    }

    #[test]
    fn every_step_has_a_registered_task() {
        let graph = build_intake_graph(Arc::new(ScriptedGateway::new()));
        for (step, task) in step_table() {
            assert!(graph.contains_task(task), "step {step} has no task");
            assert_eq!(step_for_task(task), Some(step));
        }
        assert_eq!(graph.start_task_id(), Some(type_name::<NameTask>()));
    }

    #[tokio::test]
    async fn name_step_greets() {
        let (workflow, _) = workflow(ScriptedGateway::new());
        let turn = workflow
            .transition(ConversationState::default(), "Alex")
            .await
            .unwrap();

        assert!(turn.response.starts_with("Hi Alex,"));
        assert_eq!(turn.new_state.step, 1);
        assert_eq!(turn.new_state.patient.name, "Alex");
    }

    #[tokio::test]
    async fn symptoms_step_classifies_and_splits() {
        let (workflow, _) = workflow(ScriptedGateway::new());
        let mut state = ConversationState::default();
        state.step = 1;
        state.patient.name = "Alex".into();

        let turn = workflow
            .transition(state, "chest pain, shortness of breath")
            .await
            .unwrap();

        assert_eq!(turn.new_state.step, 2);
        assert_eq!(turn.new_state.category, Some(MedicalCategory::Respiratory));
        assert_eq!(
            turn.new_state.patient.symptoms,
            vec!["chest pain", "shortness of breath"]
        );
        assert!(turn.response.contains("consult with a Pulmonologist"));
        assert!(turn.response.ends_with("Please enter your age:"));
    }

    #[tokio::test]
    async fn same_input_gives_same_turn() {
        let (workflow, _) = workflow(ScriptedGateway::new());
        let state = at_step(5, Some(MedicalCategory::Neuro));
        let first = workflow.transition(state.clone(), "yes").await.unwrap();
        let second = workflow.transition(state, "yes").await.unwrap();
        assert_eq!(first, second);
        assert!(first.new_state.patient.is_constant);
        assert_eq!(first.new_state.step, 6);
    }

    #[tokio::test]
    async fn intermediate_steps_record_answers() {
        let (workflow, _) = workflow(ScriptedGateway::new());

        let turn = workflow.transition(at_step(6, None), "eight").await.unwrap();
        assert_eq!(turn.new_state.patient.severity, None);
        assert_eq!(turn.new_state.step, 7);

        let turn = workflow.transition(at_step(7, None), "None").await.unwrap();
        assert!(turn.new_state.patient.previous_conditions.is_empty());

        let turn = workflow
            .transition(at_step(7, None), "asthma, diabetes")
            .await
            .unwrap();
        assert_eq!(
            turn.new_state.patient.previous_conditions,
            vec!["asthma", "diabetes"]
        );
        assert!(turn.response.starts_with("Are you currently taking any medications?"));
    }

    #[tokio::test]
    async fn unknown_step_restarts() {
        let (workflow, gateway) = workflow(ScriptedGateway::new());
        for step in [-1, 11, 99] {
            let turn = workflow.transition(at_step(step, None), "hello").await.unwrap();
            assert_eq!(turn.response, RESTART_PROMPT);
            assert_eq!(turn.new_state.step, 1);
            assert_eq!(turn.new_state.patient.name, "Alex");
        }
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn medications_ask_the_category_question() {
        let (workflow, gateway) = workflow(ScriptedGateway::new());
        let turn = workflow
            .transition(at_step(8, Some(MedicalCategory::Gastro)), "omeprazole")
            .await
            .unwrap();

        assert_eq!(turn.new_state.step, 9);
        assert_eq!(turn.new_state.patient.medications, vec!["omeprazole"]);
        assert_eq!(
            turn.response,
            "Do your symptoms improve or worsen after eating? (Improve/Worsen/Neither)"
        );
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn medications_go_straight_to_diagnosis_without_a_question() {
        let (workflow, gateway) = workflow(ScriptedGateway::replying(
            r#"{"conditions": [{"condition": "Otitis media", "likelihood": 70}, {"condition": "Wax buildup", "likelihood": 30}]}"#,
        ));
        let turn = workflow
            .transition(at_step(8, Some(MedicalCategory::Ent)), "none")
            .await
            .unwrap();

        assert_eq!(gateway.calls(), 1);
        assert_eq!(turn.new_state.step, 10);
        assert!(turn.new_state.patient.medications.is_empty());
        assert!(turn.response.contains("• Otitis media: 70%\n"));
        assert_eq!(
            turn.new_state.diagnosis.unwrap().top_condition(),
            Some("Otitis media")
        );
    }

    #[tokio::test]
    async fn category_answer_runs_the_diagnosis() {
        let (workflow, gateway) = workflow(ScriptedGateway::replying("not json at all"));
        let turn = workflow
            .transition(at_step(9, Some(MedicalCategory::Cardio)), "Yes")
            .await
            .unwrap();

        assert_eq!(turn.new_state.step, 10);
        assert_eq!(
            turn.new_state.patient.category_specific_answer.as_deref(),
            Some("Yes")
        );
        assert!(turn.response.contains("• Unidentified Condition: 100%"));
        let prompt = format!("{:?}", gateway.requests()[0].content);
        assert!(prompt.contains("Category-specific information: Yes"));
    }

    #[tokio::test]
    async fn diagnosis_failure_still_reaches_follow_up() {
        let (workflow, _) = workflow(ScriptedGateway::failing(GatewayError::QuotaExceeded));
        let turn = workflow
            .transition(at_step(9, Some(MedicalCategory::Derm)), "no")
            .await
            .unwrap();
        assert_eq!(turn.new_state.step, 10);
        assert!(turn.response.contains("Could not determine - please try again: 100%"));
    }

    #[tokio::test]
    async fn follow_up_stays_on_step_ten() {
        let (workflow, gateway) = workflow(ScriptedGateway::replying("Rest and fluids."));

        let turn = workflow
            .transition(at_step(10, Some(MedicalCategory::Neuro)), "any medicine?")
            .await
            .unwrap();
        assert!(turn.response.starts_with("I understand you're looking for relief, Alex."));
        assert_eq!(turn.new_state.step, 10);
        assert_eq!(gateway.calls(), 0);

        let turn = workflow
            .transition(at_step(10, Some(MedicalCategory::Neuro)), "yes")
            .await
            .unwrap();
        assert_eq!(turn.response, "Rest and fluids.");
        assert_eq!(turn.new_state.step, 10);
        assert_eq!(turn.new_state.category, Some(MedicalCategory::Neuro));
    }
}
