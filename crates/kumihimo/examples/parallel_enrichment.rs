//! Enriches one record through concurrent branches of the graph.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;

use kumihimo::prelude::*;

/// Simulates a slow external lookup and stores its result.
#[derive(Debug)]
struct LookupHandler;

#[async_trait]
impl ActionHandler for LookupHandler {
    async fn execute(
        &self,
        step: &WorkflowStep,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<ActionOutcome, WorkflowError> {
        let key = step
            .config
            .get("key")
            .and_then(|v| v.as_str())
            .unwrap_or("result")
            .to_string();
        let value = step.config.get("value").cloned().unwrap_or(json!(null));

        tokio::time::sleep(Duration::from_millis(150)).await;
        println!("Looked up {}", key);
        ctx.set_var(key, value);
        Ok(ActionOutcome::done())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let engine = WorkflowEngine::new();
    engine.register_action_handler("lookup", LookupHandler);

    engine.register_workflow(
        WorkflowDefinition::new("enrich", "Customer enrichment", "fan_out")
            .add_step(
                WorkflowStep::new("fan_out", "Fan out", "parallel")
                    .with_config_entry("branches", json!(["geo", "credit", "history"]))
                    .succeed_to("summary"),
            )
            .add_step(
                WorkflowStep::new("geo", "Geo lookup", "lookup")
                    .with_config_entry("key", json!("geo"))
                    .with_config_entry("value", json!({ "country": "JP", "city": "Kyoto" })),
            )
            .add_step(
                WorkflowStep::new("credit", "Credit lookup", "lookup")
                    .with_config_entry("key", json!("credit_score"))
                    .with_config_entry("value", json!(742)),
            )
            .add_step(
                WorkflowStep::new("history", "History lookup", "lookup")
                    .with_config_entry("key", json!("order_count"))
                    .with_config_entry("value", json!(17)),
            )
            .add_step(
                WorkflowStep::new("summary", "Summary", "log")
                    .with_config_entry("message", json!("enrichment complete")),
            ),
    );

    let started = Instant::now();
    let execution_id = engine.start_workflow(&WorkflowId::new("enrich")).await?;

    loop {
        if let Some(execution) = engine.get_execution(&execution_id).await? {
            if execution.is_terminal() {
                println!(
                    "Enriched in {:?} (three 150ms lookups ran concurrently)",
                    started.elapsed()
                );
                println!(
                    "Variables: {}",
                    serde_json::to_string_pretty(&execution.variables)?
                );
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    Ok(())
}
