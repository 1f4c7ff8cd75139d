use crate::context::Context;

/// Position of one conversation inside a graph, plus the data gathered so far.
///
/// Sessions are not stored anywhere by this crate. A service rebuilds one from
/// the state its client sends, runs a turn, and hands the result back.
#[derive(Debug, Clone)]
pub struct Session {
    pub current_task_id: String,
    pub status_message: Option<String>,
    pub context: Context,
}

impl Session {
    pub fn new_from_task(task_id: impl Into<String>) -> Self {
        Self::with_context(task_id, Context::new())
    }

    pub fn with_context(task_id: impl Into<String>, context: Context) -> Self {
        Self {
            current_task_id: task_id.into(),
            status_message: None,
            context,
        }
    }
}
