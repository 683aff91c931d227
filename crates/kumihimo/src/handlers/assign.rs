//! Writes literal values into the variable bag.

use async_trait::async_trait;
use serde::Deserialize;

use kumihimo_core::{
    ActionHandler, ActionOutcome, HandlerContext, JsonMap, WorkflowError, WorkflowStep,
};

use super::parse_config;

/// Copies every entry of `assignments` into the variables, overwriting
/// existing keys.
///
/// Values are taken literally; nothing is evaluated or templated.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssignHandler;

#[derive(Debug, Deserialize)]
struct AssignConfig {
    assignments: JsonMap,
}

#[async_trait]
impl ActionHandler for AssignHandler {
    async fn execute(
        &self,
        step: &WorkflowStep,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<ActionOutcome, WorkflowError> {
        let config: AssignConfig = parse_config(step)?;
        for (name, value) in config.assignments {
            ctx.set_var(name, value);
        }
        Ok(ActionOutcome::done())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::ContextFixture;
    use serde_json::json;

    #[tokio::test]
    async fn test_assignments_overwrite_and_extend() {
        let mut fixture = ContextFixture::new();
        fixture.variables.insert("status".into(), json!("new"));
        let step = WorkflowStep::new("seed", "Seed", "assign").with_config_entry(
            "assignments",
            json!({ "status": "packed", "attempts": 0 }),
        );

        AssignHandler
            .execute(&step, &mut fixture.ctx())
            .await
            .expect("assign should succeed");

        assert_eq!(fixture.variables["status"], "packed");
        assert_eq!(fixture.variables["attempts"], 0);
    }

    #[tokio::test]
    async fn test_values_are_copied_literally() {
        let mut fixture = ContextFixture::new();
        let step = WorkflowStep::new("seed", "Seed", "assign").with_config_entry(
            "assignments",
            json!({ "condition": { "op": "var", "name": "x" } }),
        );

        AssignHandler
            .execute(&step, &mut fixture.ctx())
            .await
            .expect("assign should succeed");

        // The expression-shaped object is stored as data, not evaluated.
        assert_eq!(
            fixture.variables["condition"],
            json!({ "op": "var", "name": "x" })
        );
    }

    #[tokio::test]
    async fn test_missing_assignments_is_invalid_config() {
        let mut fixture = ContextFixture::new();
        let step = WorkflowStep::new("seed", "Seed", "assign");

        let err = AssignHandler
            .execute(&step, &mut fixture.ctx())
            .await
            .expect_err("missing assignments must fail");

        assert!(matches!(err, WorkflowError::InvalidStepConfig { .. }));
    }
}
