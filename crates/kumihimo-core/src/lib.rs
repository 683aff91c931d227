//! Core traits and types for the kumihimo workflow engine.
//!
//! This crate provides the data model and contracts without pulling in
//! the engine runtime. Library authors should depend on this crate to
//! implement custom action handlers or execution stores.
//!
//! # Core Types
//!
//! - [`WorkflowDefinition`] / [`WorkflowStep`] - An immutable named graph
//!   of typed steps, serializable as a JSON document
//! - [`WorkflowExecution`] / [`ExecutionStatus`] - One run of a
//!   definition and its lifecycle state
//! - [`WorkflowLog`] / [`ExecutionLogger`] - Execution-scoped logging,
//!   flushed into the record when the run ends
//! - [`Expr`] - Condition expressions as data, evaluated without any
//!   dynamic code execution
//! - [`WorkflowError`] - Error types for workflow execution
//!
//! # Contracts
//!
//! - [`ActionHandler`] - The behavior behind a step type
//! - [`HandlerContext`] - What a handler may touch while executing
//! - [`BranchRunner`] - Nested graph walks, used by the `parallel` step
//! - [`ExecutionStore`] - Pluggable storage for execution records

mod definition;
mod error;
mod execution;
mod expression;
mod handler;
mod log;
mod step;
mod store;

pub use definition::{JsonMap, VariableMap, WorkflowDefinition, WorkflowId};
pub use error::WorkflowError;
pub use execution::{ExecutionId, ExecutionStatus, WorkflowExecution};
pub use expression::{Expr, ExpressionError};
pub use handler::{ActionHandler, ActionOutcome, BranchRunner, HandlerContext};
pub use log::{ExecutionLogger, LogLevel, WorkflowLog};
pub use step::{RetryPolicy, RetryPolicyError, StepId, WorkflowStep};
pub use store::ExecutionStore;
