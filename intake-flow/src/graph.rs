use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::{
    context::Context,
    error::{GraphError, Result},
    session::Session,
    task::{NextAction, Task, TaskResult},
};

/// Type alias for edge condition functions
pub type EdgeCondition = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

#[derive(Clone)]
enum EdgeTarget {
    Always(String),
    Branch {
        condition: EdgeCondition,
        yes: String,
        no: String,
    },
}

/// Edge leaving a task
#[derive(Clone)]
pub struct Edge {
    from: String,
    target: EdgeTarget,
}

impl Edge {
    fn resolve(&self, context: &Context) -> &str {
        match &self.target {
            EdgeTarget::Always(to) => to,
            EdgeTarget::Branch { condition, yes, no } => {
                if condition(context) {
                    yes
                } else {
                    no
                }
            }
        }
    }
}

/// An immutable graph of tasks. Built once at startup and shared between requests.
pub struct Graph {
    pub id: String,
    tasks: HashMap<String, Arc<dyn Task>>,
    edges: Vec<Edge>,
    start_task_id: Option<String>,
}

impl Graph {
    /// Run one turn of `session`.
    ///
    /// The current task runs; `ContinueAndExecute` chains straight into the next
    /// task within the same turn. When the turn settles, `session.current_task_id`
    /// points at the task that must receive the next user message.
    pub async fn execute_session(&self, session: &mut Session) -> Result<ExecutionResult> {
        // every task may run at most once per turn
        let mut remaining_hops = self.tasks.len();

        loop {
            let result = self
                .execute_single_task(&session.current_task_id, session.context.clone())
                .await?;
            session.status_message = result.status_message.clone();

            match result.next_action {
                NextAction::Continue => {
                    if let Some(next) = self.find_next_task(&result.task_id, &session.context) {
                        session.current_task_id = next;
                    }
                    return Ok(ExecutionResult::waiting(result.response));
                }
                NextAction::ContinueAndExecute => {
                    let Some(next) = self.find_next_task(&result.task_id, &session.context) else {
                        return Ok(ExecutionResult::waiting(result.response));
                    };
                    if remaining_hops == 0 {
                        return Err(GraphError::TaskExecutionFailed(format!(
                            "turn did not settle after leaving {}",
                            result.task_id
                        )));
                    }
                    remaining_hops -= 1;
                    debug!(from = %result.task_id, to = %next, "chaining task within turn");
                    session.current_task_id = next;
                }
                NextAction::GoTo(target) => {
                    if !self.tasks.contains_key(&target) {
                        return Err(GraphError::TaskNotFound(target));
                    }
                    session.current_task_id = target;
                    return Ok(ExecutionResult::waiting(result.response));
                }
                NextAction::WaitForInput => {
                    return Ok(ExecutionResult::waiting(result.response));
                }
                NextAction::End => {
                    return Ok(ExecutionResult {
                        response: result.response,
                        status: ExecutionStatus::Completed,
                    });
                }
            }
        }
    }

    async fn execute_single_task(&self, task_id: &str, context: Context) -> Result<TaskResult> {
        let task = self
            .tasks
            .get(task_id)
            .ok_or_else(|| GraphError::TaskNotFound(task_id.to_string()))?;

        let mut result = task.run(context).await?;
        result.task_id = task_id.to_string();
        Ok(result)
    }

    /// Find the next task based on edges and conditions. The first edge declared
    /// for `current_task_id` wins.
    pub fn find_next_task(&self, current_task_id: &str, context: &Context) -> Option<String> {
        self.edges
            .iter()
            .find(|edge| edge.from == current_task_id)
            .map(|edge| edge.resolve(context).to_string())
    }

    pub fn start_task_id(&self) -> Option<&str> {
        self.start_task_id.as_deref()
    }

    pub fn contains_task(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }
}

/// Builder for creating graphs
pub struct GraphBuilder {
    id: String,
    tasks: HashMap<String, Arc<dyn Task>>,
    edges: Vec<Edge>,
    start_task_id: Option<String>,
}

impl GraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tasks: HashMap::new(),
            edges: Vec::new(),
            start_task_id: None,
        }
    }

    /// Add a task. The first task added becomes the start task.
    pub fn add_task(mut self, task: Arc<dyn Task>) -> Self {
        let task_id = task.id().to_string();
        if self.start_task_id.is_none() {
            self.start_task_id = Some(task_id.clone());
        }
        self.tasks.insert(task_id, task);
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(Edge {
            from: from.into(),
            target: EdgeTarget::Always(to.into()),
        });
        self
    }

    /// Add a two-way branch: `yes` when `condition` holds for the context, `no` otherwise.
    pub fn add_conditional_edge<F>(
        mut self,
        from: impl Into<String>,
        condition: F,
        yes: impl Into<String>,
        no: impl Into<String>,
    ) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.edges.push(Edge {
            from: from.into(),
            target: EdgeTarget::Branch {
                condition: Arc::new(condition),
                yes: yes.into(),
                no: no.into(),
            },
        });
        self
    }

    pub fn set_start_task(mut self, task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        if self.tasks.contains_key(&task_id) {
            self.start_task_id = Some(task_id);
        }
        self
    }

    pub fn build(self) -> Graph {
        Graph {
            id: self.id,
            tasks: self.tasks,
            edges: self.edges,
            start_task_id: self.start_task_id,
        }
    }
}

/// Result of one turn
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub response: Option<String>,
    pub status: ExecutionStatus,
}

impl ExecutionResult {
    fn waiting(response: Option<String>) -> Self {
        Self {
            response,
            status: ExecutionStatus::WaitingForInput,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Waiting for the next user message
    WaitingForInput,
    /// The flow reached an end task
    Completed,
}
