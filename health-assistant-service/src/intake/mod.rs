//! Scripted, stateless triage conversation.

pub mod categories;
pub mod diagnosis;
pub mod follow_up;
pub mod state;
pub mod tasks;
pub mod workflow;

pub use categories::{MedicalCategory, determine_category};
pub use diagnosis::DiagnosisResult;
pub use state::{ConversationState, PatientRecord};
pub use workflow::{ChatTurn, IntakeWorkflow};
