//! The action handler contract.

use std::fmt::Debug;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::definition::{JsonMap, VariableMap, WorkflowId};
use crate::error::WorkflowError;
use crate::execution::ExecutionId;
use crate::log::ExecutionLogger;
use crate::step::{StepId, WorkflowStep};

/// What a handler reports back on success.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOutcome {
    /// Optional payload, recorded with the step's success log entry.
    pub data: Option<Value>,
    /// Dynamic branch target; overrides the step's static `on_success`.
    pub next_step: Option<StepId>,
}

impl ActionOutcome {
    /// Success with no payload and no dynamic branch.
    pub fn done() -> Self {
        Self::default()
    }

    /// Success that routes the interpreter to `step` next.
    pub fn next(step: impl Into<StepId>) -> Self {
        Self {
            data: None,
            next_step: Some(step.into()),
        }
    }

    /// Attaches a payload to this outcome.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Runs nested walks of the definition graph on behalf of a handler.
///
/// The `parallel` built-in fans out over this; custom handlers may use it
/// for their own sub-flows. Each branch receives its own copy of the
/// variables and returns the copy as it stands when the branch chain
/// terminates.
#[async_trait]
pub trait BranchRunner: Send + Sync {
    /// Walks the graph from `start` to termination over `variables`.
    async fn run_branch(
        &self,
        start: &StepId,
        variables: VariableMap,
    ) -> Result<VariableMap, WorkflowError>;
}

/// Everything a handler may touch while executing one step.
///
/// The context borrows the run's live variable bag for the duration of
/// the invocation; outside of handler calls the bag is private to the
/// interpreter and observable only through store snapshots.
pub struct HandlerContext<'a> {
    execution_id: &'a ExecutionId,
    workflow_id: &'a WorkflowId,
    variables: &'a mut VariableMap,
    metadata: &'a JsonMap,
    logger: &'a ExecutionLogger,
    cancellation: &'a CancellationToken,
    branches: &'a dyn BranchRunner,
}

impl<'a> HandlerContext<'a> {
    /// Assembles a context for one handler invocation.
    pub fn new(
        execution_id: &'a ExecutionId,
        workflow_id: &'a WorkflowId,
        variables: &'a mut VariableMap,
        metadata: &'a JsonMap,
        logger: &'a ExecutionLogger,
        cancellation: &'a CancellationToken,
        branches: &'a dyn BranchRunner,
    ) -> Self {
        Self {
            execution_id,
            workflow_id,
            variables,
            metadata,
            logger,
            cancellation,
            branches,
        }
    }

    /// Id of the execution this step belongs to.
    pub fn execution_id(&self) -> &ExecutionId {
        self.execution_id
    }

    /// Id of the definition being interpreted.
    pub fn workflow_id(&self) -> &WorkflowId {
        self.workflow_id
    }

    /// Read access to the live variable bag.
    pub fn variables(&self) -> &VariableMap {
        self.variables
    }

    /// Write access to the live variable bag.
    pub fn variables_mut(&mut self) -> &mut VariableMap {
        self.variables
    }

    /// Looks up one variable.
    pub fn var(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Sets one variable, overwriting any previous value.
    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// The merged metadata bag the run was started with.
    pub fn metadata(&self) -> &JsonMap {
        self.metadata
    }

    /// The execution's log sink.
    pub fn logger(&self) -> &ExecutionLogger {
        self.logger
    }

    /// The run's cancellation token.
    ///
    /// Long-running handlers should select their waits against this so a
    /// cancel request does not have to ride out the full step.
    pub fn cancellation(&self) -> &CancellationToken {
        self.cancellation
    }

    /// Access to nested graph walks.
    pub fn branches(&self) -> &dyn BranchRunner {
        self.branches
    }
}

/// Implements the behavior of one step type.
///
/// Handlers are registered on the engine under a type string and invoked
/// for every step carrying that type. They report success through
/// [`ActionOutcome`] and failure through any [`WorkflowError`]; a failure
/// routes the run to the step's `on_failure` edge, or terminates it when
/// no edge is declared.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use kumihimo_core::{
///     ActionHandler, ActionOutcome, HandlerContext, WorkflowError, WorkflowStep,
/// };
///
/// #[derive(Debug)]
/// struct IncrementHandler;
///
/// #[async_trait]
/// impl ActionHandler for IncrementHandler {
///     async fn execute(
///         &self,
///         _step: &WorkflowStep,
///         ctx: &mut HandlerContext<'_>,
///     ) -> Result<ActionOutcome, WorkflowError> {
///         let count = ctx.var("count").and_then(|v| v.as_i64()).unwrap_or(0);
///         ctx.set_var("count", serde_json::json!(count + 1));
///         Ok(ActionOutcome::done())
///     }
/// }
/// ```
#[async_trait]
pub trait ActionHandler: Send + Sync + Debug {
    /// Executes the step logic.
    async fn execute(
        &self,
        step: &WorkflowStep,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<ActionOutcome, WorkflowError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_constructors() {
        let outcome = ActionOutcome::done();
        assert_eq!(outcome.next_step, None);
        assert_eq!(outcome.data, None);

        let outcome = ActionOutcome::next("branch").with_data(serde_json::json!(true));
        assert_eq!(outcome.next_step, Some(StepId::new("branch")));
        assert_eq!(outcome.data, Some(serde_json::json!(true)));
    }
}
