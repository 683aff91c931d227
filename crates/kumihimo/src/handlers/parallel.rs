//! Fans a run out over concurrent branches of the graph.

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::Deserialize;

use kumihimo_core::{
    ActionHandler, ActionOutcome, HandlerContext, StepId, WorkflowError, WorkflowStep,
};

use super::parse_config;

/// Runs every id in `branches` as a nested walk of the graph, all
/// concurrently, each over its own copy of the variables.
///
/// When all branches succeed, each branch's variable changes (relative
/// to the bag as it stood at fan-out) merge back in branch order, so on
/// a conflicting key the later branch wins. The first branch failure
/// fails the step and drops the remaining branch futures. An empty
/// branch list succeeds immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParallelHandler;

#[derive(Debug, Deserialize)]
struct ParallelConfig {
    branches: Vec<StepId>,
}

#[async_trait]
impl ActionHandler for ParallelHandler {
    async fn execute(
        &self,
        step: &WorkflowStep,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<ActionOutcome, WorkflowError> {
        let config: ParallelConfig = parse_config(step)?;
        if config.branches.is_empty() {
            return Ok(ActionOutcome::done());
        }

        let baseline = ctx.variables().clone();
        let runner = ctx.branches();
        let walks = config
            .branches
            .iter()
            .map(|branch| runner.run_branch(branch, baseline.clone()));
        let results = try_join_all(walks).await?;

        for branch_variables in results {
            for (name, value) in branch_variables {
                // Only changes relative to the fan-out snapshot merge back,
                // so one branch's writes survive another branch's untouched
                // copy of the same key.
                if baseline.get(&name) != Some(&value) {
                    ctx.set_var(name, value);
                }
            }
        }
        Ok(ActionOutcome::done())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::ContextFixture;
    use kumihimo_core::{BranchRunner, VariableMap};
    use serde_json::json;

    /// Branch runner with canned per-branch behavior.
    #[derive(Debug)]
    struct ScriptedBranches;

    #[async_trait]
    impl BranchRunner for ScriptedBranches {
        async fn run_branch(
            &self,
            start: &StepId,
            mut variables: VariableMap,
        ) -> Result<VariableMap, WorkflowError> {
            match start.as_str() {
                "inventory" => {
                    variables.insert("inventory_ok".into(), json!(true));
                    Ok(variables)
                }
                "pricing" => {
                    variables.insert("pricing_ok".into(), json!(true));
                    variables.insert("total".into(), json!(42));
                    Ok(variables)
                }
                "rewrite" => {
                    variables.insert("total".into(), json!(99));
                    Ok(variables)
                }
                "explode" => Err(WorkflowError::step_failed(start.clone(), "branch exploded")),
                other => Err(WorkflowError::StepNotFound(StepId::new(other))),
            }
        }
    }

    fn parallel_step(branches: serde_json::Value) -> WorkflowStep {
        WorkflowStep::new("fan_out", "Fan out", "parallel")
            .with_config_entry("branches", branches)
    }

    #[tokio::test]
    async fn test_branch_results_merge_in_order() {
        let mut fixture = ContextFixture::with_branches(Box::new(ScriptedBranches));
        fixture.variables.insert("order_id".into(), json!("ord_1"));
        let step = parallel_step(json!(["inventory", "pricing"]));

        ParallelHandler
            .execute(&step, &mut fixture.ctx())
            .await
            .expect("parallel should succeed");

        assert_eq!(fixture.variables["order_id"], "ord_1");
        assert_eq!(fixture.variables["inventory_ok"], true);
        assert_eq!(fixture.variables["pricing_ok"], true);
        assert_eq!(fixture.variables["total"], 42);
    }

    #[tokio::test]
    async fn test_later_branch_wins_on_conflict() {
        let mut fixture = ContextFixture::with_branches(Box::new(ScriptedBranches));
        let step = parallel_step(json!(["pricing", "rewrite"]));

        ParallelHandler
            .execute(&step, &mut fixture.ctx())
            .await
            .expect("parallel should succeed");

        assert_eq!(fixture.variables["total"], 99);
        // The earlier branch's non-conflicting write still lands.
        assert_eq!(fixture.variables["pricing_ok"], true);
    }

    #[tokio::test]
    async fn test_one_failing_branch_fails_the_step() {
        let mut fixture = ContextFixture::with_branches(Box::new(ScriptedBranches));
        let step = parallel_step(json!(["inventory", "explode"]));

        let err = ParallelHandler
            .execute(&step, &mut fixture.ctx())
            .await
            .expect_err("failing branch must fail the step");

        assert!(err.to_string().contains("branch exploded"));
    }

    #[tokio::test]
    async fn test_empty_branch_list_succeeds() {
        let mut fixture = ContextFixture::new();
        let step = parallel_step(json!([]));

        let outcome = ParallelHandler
            .execute(&step, &mut fixture.ctx())
            .await
            .expect("empty fan-out should succeed");

        assert_eq!(outcome, ActionOutcome::done());
    }

    #[tokio::test]
    async fn test_missing_branches_is_invalid_config() {
        let mut fixture = ContextFixture::new();
        let step = WorkflowStep::new("fan_out", "Fan out", "parallel");

        let err = ParallelHandler
            .execute(&step, &mut fixture.ctx())
            .await
            .expect_err("missing branches must fail");

        assert!(matches!(err, WorkflowError::InvalidStepConfig { .. }));
    }
}
