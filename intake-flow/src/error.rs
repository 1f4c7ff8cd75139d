use thiserror::Error;

/// Errors raised while running a turn through a [`Graph`](crate::Graph).
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("task execution failed: {0}")]
    TaskExecutionFailed(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("context error: {0}")]
    ContextError(String),

    #[error("no task is registered for step {0}")]
    UnknownStep(i64),
}

pub type Result<T> = std::result::Result<T, GraphError>;
