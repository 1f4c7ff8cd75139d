//! Turn-at-a-time task graphs for scripted chat flows.
//!
//! A [`Graph`] holds [`Task`]s joined by plain or conditional edges. Each call to
//! [`Graph::execute_session`] runs exactly one user turn: the current task handles
//! the message, and [`NextAction`] decides whether the flow waits on the next task,
//! chains into it immediately, or stays put.

pub mod context;
pub mod error;
pub mod graph;
pub mod session;
pub mod task;

pub use context::Context;
pub use error::{GraphError, Result};
pub use graph::{ExecutionResult, ExecutionStatus, Graph, GraphBuilder};
pub use session::Session;
pub use task::{NextAction, Task, TaskResult};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Records the user input under its own key and moves on.
    struct AskTask {
        id: &'static str,
        next_action: NextAction,
        reply: Option<&'static str>,
    }

    #[async_trait]
    impl Task for AskTask {
        fn id(&self) -> &str {
            self.id
        }

        async fn run(&self, context: Context) -> Result<TaskResult> {
            let input: String = context.get("user_input").await.unwrap_or_default();
            context.set(self.id, input).await?;
            Ok(TaskResult::new(
                self.reply.map(str::to_string),
                self.next_action.clone(),
            ))
        }
    }

    fn ask(id: &'static str, next_action: NextAction, reply: Option<&'static str>) -> Arc<AskTask> {
        Arc::new(AskTask {
            id,
            next_action,
            reply,
        })
    }

    fn branching_graph() -> Graph {
        GraphBuilder::new("test_graph")
            .add_task(ask("name", NextAction::Continue, Some("what hurts?")))
            .add_task(ask("complaint", NextAction::ContinueAndExecute, None))
            .add_task(ask("clarify", NextAction::Continue, Some("clarify please")))
            .add_task(ask("summary", NextAction::Continue, Some("summary")))
            .add_task(ask("follow_up", NextAction::WaitForInput, Some("anything else?")))
            .add_edge("name", "complaint")
            .add_conditional_edge(
                "complaint",
                |ctx| ctx.get_sync::<String>("complaint").is_some_and(|c| c.contains("chest")),
                "clarify",
                "summary",
            )
            .add_edge("clarify", "summary")
            .add_edge("summary", "follow_up")
            .build()
    }

    async fn turn(graph: &Graph, session: &mut Session, input: &str) -> ExecutionResult {
        session.context.set("user_input", input).await.unwrap();
        graph.execute_session(session).await.unwrap()
    }

    #[tokio::test]
    async fn continue_waits_on_next_task() {
        let graph = branching_graph();
        assert_eq!(graph.start_task_id(), Some("name"));

        let mut session = Session::new_from_task("name");
        let result = turn(&graph, &mut session, "Alex").await;

        assert_eq!(result.response.as_deref(), Some("what hurts?"));
        assert_eq!(result.status, ExecutionStatus::WaitingForInput);
        assert_eq!(session.current_task_id, "complaint");
        let name: String = session.context.get("name").await.unwrap();
        assert_eq!(name, "Alex");
    }

    #[tokio::test]
    async fn conditional_edge_picks_branch_within_turn() {
        let graph = branching_graph();

        let mut session = Session::new_from_task("complaint");
        let result = turn(&graph, &mut session, "chest pain").await;
        assert_eq!(result.response.as_deref(), Some("clarify please"));
        assert_eq!(session.current_task_id, "summary");

        let mut session = Session::new_from_task("complaint");
        let result = turn(&graph, &mut session, "headache").await;
        assert_eq!(result.response.as_deref(), Some("summary"));
        assert_eq!(session.current_task_id, "follow_up");
    }

    #[tokio::test]
    async fn wait_for_input_stays_on_task() {
        let graph = branching_graph();
        let mut session = Session::new_from_task("follow_up");

        for _ in 0..3 {
            let result = turn(&graph, &mut session, "more?").await;
            assert_eq!(result.response.as_deref(), Some("anything else?"));
            assert_eq!(session.current_task_id, "follow_up");
        }
    }

    #[tokio::test]
    async fn unknown_task_is_an_error() {
        let graph = branching_graph();
        let mut session = Session::new_from_task("missing");
        let err = graph.execute_session(&mut session).await.unwrap_err();
        assert!(matches!(err, GraphError::TaskNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn goto_requires_known_target() {
        let graph = GraphBuilder::new("goto")
            .add_task(ask("start", NextAction::GoTo("nowhere".into()), None))
            .build();
        let mut session = Session::new_from_task("start");
        let err = graph.execute_session(&mut session).await.unwrap_err();
        assert!(matches!(err, GraphError::TaskNotFound(id) if id == "nowhere"));
    }

    #[tokio::test]
    async fn chained_cycle_is_reported() {
        let graph = GraphBuilder::new("cycle")
            .add_task(ask("a", NextAction::ContinueAndExecute, None))
            .add_task(ask("b", NextAction::ContinueAndExecute, None))
            .add_edge("a", "b")
            .add_edge("b", "a")
            .build();
        let mut session = Session::new_from_task("a");
        let err = graph.execute_session(&mut session).await.unwrap_err();
        assert!(matches!(err, GraphError::TaskExecutionFailed(_)));
    }
}
