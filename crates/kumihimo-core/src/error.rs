//! Workflow error types.

use thiserror::Error;

use crate::definition::WorkflowId;
use crate::expression::ExpressionError;
use crate::step::StepId;

/// Errors that can occur while registering, starting, or running a
/// workflow.
///
/// Everything that goes wrong inside a running execution is contained in
/// that execution's record; only [`WorkflowNotFound`](Self::WorkflowNotFound)
/// and [`Store`](Self::Store) surface to the caller of `start_workflow`.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WorkflowError {
    /// No definition is registered under the requested id.
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    /// An edge or start id resolved to no step in the definition.
    #[error("Step not found: {0}")]
    StepNotFound(StepId),

    /// A step's type has no registered handler.
    #[error("No handler registered for step type: {0}")]
    HandlerNotFound(String),

    /// A handler reported a failure.
    #[error("Step failed: {step}, details: {details}")]
    StepFailed {
        /// The step that failed.
        step: StepId,
        /// Details about the failure.
        details: String,
    },

    /// A handler attempt outlived the step's deadline.
    #[error("Step timeout: {step} exceeded {timeout_ms}ms")]
    StepTimeout {
        /// The step that timed out.
        step: StepId,
        /// The configured deadline in milliseconds.
        timeout_ms: u64,
    },

    /// A built-in handler could not make sense of its step config.
    #[error("Invalid step config for {step}: {details}")]
    InvalidStepConfig {
        /// The step whose config was rejected.
        step: StepId,
        /// What was wrong with it.
        details: String,
    },

    /// A condition expression failed to evaluate.
    #[error("Condition evaluation failed: {0}")]
    Expression(#[from] ExpressionError),

    /// The execution store failed.
    #[error("Execution store error: {0}")]
    Store(String),
}

impl WorkflowError {
    /// Shorthand for a handler-reported failure.
    pub fn step_failed(step: impl Into<StepId>, details: impl Into<String>) -> Self {
        WorkflowError::StepFailed {
            step: step.into(),
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = WorkflowError::StepNotFound(StepId::new("ghost"));
        assert_eq!(error.to_string(), "Step not found: ghost");

        let error = WorkflowError::HandlerNotFound("teleport".to_string());
        assert_eq!(
            error.to_string(),
            "No handler registered for step type: teleport"
        );

        let error = WorkflowError::StepTimeout {
            step: StepId::new("slow"),
            timeout_ms: 50,
        };
        assert!(error.to_string().starts_with("Step timeout"));
    }

    #[test]
    fn test_expression_error_wraps() {
        let error: WorkflowError = ExpressionError::UnknownVariable("x".into()).into();
        assert_eq!(
            error.to_string(),
            "Condition evaluation failed: unknown variable: x"
        );
    }
}
