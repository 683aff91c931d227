//! A lightweight, data-driven workflow engine.
//!
//! Workflows are named graphs of typed steps. Each step's behavior comes
//! from a pluggable [`ActionHandler`] looked up by the step's type
//! string, so the same engine runs anything from a two-step greeting to
//! an order pipeline with retries, timeouts, branching, and parallel
//! fan-out. Every run is tracked as a [`WorkflowExecution`] record in an
//! [`ExecutionStore`], with an execution-scoped log and cooperative
//! cancellation.
//!
//! # Quick start
//!
//! ```no_run
//! use kumihimo::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), WorkflowError> {
//!     let engine = WorkflowEngine::new();
//!
//!     engine.register_workflow(
//!         WorkflowDefinition::new("greeter", "Greeter", "pause")
//!             .add_step(
//!                 WorkflowStep::new("pause", "Pause", "delay")
//!                     .with_config_entry("duration", serde_json::json!(50))
//!                     .succeed_to("hello"),
//!             )
//!             .add_step(
//!                 WorkflowStep::new("hello", "Say hello", "log")
//!                     .with_config_entry("message", serde_json::json!("hello there")),
//!             ),
//!     );
//!
//!     let execution_id = engine.start_workflow(&WorkflowId::new("greeter")).await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_millis(200)).await;
//!     if let Some(execution) = engine.get_execution(&execution_id).await? {
//!         println!("{execution_id}: {}", execution.status);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Crate layout
//!
//! The data model and the handler/store contracts live in
//! [`kumihimo_core`] and are re-exported here; this crate adds the
//! engine itself, the step interpreter, the built-in handlers, and the
//! in-memory store.

mod engine;
pub mod handlers;
mod runner;
mod store;

pub use engine::WorkflowEngine;
pub use store::InMemoryExecutionStore;

pub use kumihimo_core::{
    ActionHandler, ActionOutcome, BranchRunner, ExecutionId, ExecutionLogger, ExecutionStatus,
    ExecutionStore, Expr, ExpressionError, HandlerContext, JsonMap, LogLevel, RetryPolicy,
    RetryPolicyError, StepId, VariableMap, WorkflowDefinition, WorkflowError, WorkflowExecution,
    WorkflowId, WorkflowLog, WorkflowStep,
};

/// Convenience imports for the common case.
pub mod prelude {
    pub use crate::{
        ActionHandler, ActionOutcome, BranchRunner, ExecutionId, ExecutionStatus, ExecutionStore,
        Expr, HandlerContext, InMemoryExecutionStore, JsonMap, LogLevel, RetryPolicy, StepId,
        VariableMap, WorkflowDefinition, WorkflowEngine, WorkflowError, WorkflowExecution,
        WorkflowId, WorkflowStep,
    };
}
