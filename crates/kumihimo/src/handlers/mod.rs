//! Built-in action handlers.
//!
//! Every engine starts with these registered under their conventional
//! step types: `delay`, `condition`, `log`, `assign`, and `parallel`.
//! Re-register any of the names to replace a built-in.

mod assign;
mod condition;
mod delay;
mod log;
mod parallel;

pub use assign::AssignHandler;
pub use condition::ConditionHandler;
pub use delay::DelayHandler;
pub use log::LogHandler;
pub use parallel::ParallelHandler;

use serde::de::DeserializeOwned;

use kumihimo_core::{WorkflowError, WorkflowStep};

/// Deserializes a step's config bag into a handler's typed config.
pub(crate) fn parse_config<T: DeserializeOwned>(step: &WorkflowStep) -> Result<T, WorkflowError> {
    serde_json::from_value(serde_json::Value::Object(step.config.clone())).map_err(|err| {
        WorkflowError::InvalidStepConfig {
            step: step.id.clone(),
            details: err.to_string(),
        }
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use kumihimo_core::{
        BranchRunner, ExecutionId, ExecutionLogger, HandlerContext, JsonMap, StepId, VariableMap,
        WorkflowError, WorkflowId, WorkflowLog,
    };

    /// Branch runner for contexts whose handler under test never fans out.
    #[derive(Debug)]
    pub(crate) struct NoBranches;

    #[async_trait]
    impl BranchRunner for NoBranches {
        async fn run_branch(
            &self,
            start: &StepId,
            _variables: VariableMap,
        ) -> Result<VariableMap, WorkflowError> {
            Err(WorkflowError::StepNotFound(start.clone()))
        }
    }

    /// Owns everything a [`HandlerContext`] borrows, so handler tests can
    /// mint contexts without an engine.
    pub(crate) struct ContextFixture {
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        pub(crate) variables: VariableMap,
        metadata: JsonMap,
        logger: ExecutionLogger,
        pub(crate) token: CancellationToken,
        branches: Box<dyn BranchRunner>,
    }

    impl ContextFixture {
        pub(crate) fn new() -> Self {
            Self::with_branches(Box::new(NoBranches))
        }

        pub(crate) fn with_branches(branches: Box<dyn BranchRunner>) -> Self {
            Self {
                execution_id: ExecutionId::generate(),
                workflow_id: WorkflowId::new("wf_test"),
                variables: VariableMap::new(),
                metadata: JsonMap::new(),
                logger: ExecutionLogger::new(),
                token: CancellationToken::new(),
                branches,
            }
        }

        pub(crate) fn ctx(&mut self) -> HandlerContext<'_> {
            HandlerContext::new(
                &self.execution_id,
                &self.workflow_id,
                &mut self.variables,
                &self.metadata,
                &self.logger,
                &self.token,
                self.branches.as_ref(),
            )
        }

        pub(crate) fn drain_logs(&self) -> Vec<WorkflowLog> {
            self.logger.drain()
        }
    }
}
