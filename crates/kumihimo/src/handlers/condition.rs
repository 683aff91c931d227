//! Routes a run based on an expression over the variables.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use kumihimo_core::{
    ActionHandler, ActionOutcome, Expr, HandlerContext, StepId, WorkflowError, WorkflowStep,
};

use super::parse_config;

/// Evaluates `condition` against the live variables and routes to
/// `true_step` or `false_step`.
///
/// Conditions are [`Expr`] documents, not code. A branch left
/// unconfigured ends the chain on that verdict; an evaluation error
/// (unknown variable, incomparable types) fails the step and follows
/// its `on_failure` edge like any other handler error.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConditionHandler;

#[derive(Debug, Deserialize)]
struct ConditionConfig {
    condition: Expr,
    #[serde(default)]
    true_step: Option<StepId>,
    #[serde(default)]
    false_step: Option<StepId>,
}

#[async_trait]
impl ActionHandler for ConditionHandler {
    async fn execute(
        &self,
        step: &WorkflowStep,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<ActionOutcome, WorkflowError> {
        let config: ConditionConfig = parse_config(step)?;
        let verdict = config.condition.eval_bool(ctx.variables())?;
        let target = if verdict {
            config.true_step
        } else {
            config.false_step
        };
        let outcome = match target {
            Some(next) => ActionOutcome::next(next),
            None => ActionOutcome::done(),
        };
        Ok(outcome.with_data(Value::Bool(verdict)))
    }
}
