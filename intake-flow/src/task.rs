use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{context::Context, error::Result};

/// Outcome of running one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Reply to send back to the user, if any
    pub response: Option<String>,
    /// Where the flow goes after this task
    pub next_action: NextAction,
    /// Short description of what the task did, for logs and diagnostics
    pub status_message: Option<String>,
    /// Filled in by the graph with the id of the task that produced this result
    #[serde(default)]
    pub task_id: String,
}

impl TaskResult {
    pub fn new(response: Option<String>, next_action: NextAction) -> Self {
        Self {
            response,
            next_action,
            status_message: None,
            task_id: String::new(),
        }
    }

    pub fn new_with_status(
        response: Option<String>,
        next_action: NextAction,
        status_message: Option<String>,
    ) -> Self {
        Self {
            response,
            next_action,
            status_message,
            task_id: String::new(),
        }
    }
}

/// Defines what should happen after a task completes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum NextAction {
    /// Move to the next task along the edges and wait for the next user message there
    Continue,
    /// Move to the next task and run it within the same turn
    ContinueAndExecute,
    /// Jump to a specific task and wait there
    GoTo(String),
    /// Stay on this task; the next user message comes back to it
    WaitForInput,
    /// The flow is finished
    End,
}

/// A single node of an intake graph.
#[async_trait]
pub trait Task: Send + Sync {
    /// Unique identifier for this task. Defaults to the implementing type's name.
    fn id(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Execute the task against the turn's context
    async fn run(&self, context: Context) -> Result<TaskResult>;
}
