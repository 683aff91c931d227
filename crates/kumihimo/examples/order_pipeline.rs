//! An order pipeline with custom handlers, retry, and branching.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use kumihimo::prelude::*;

/// Pretends to reserve stock for the order.
#[derive(Debug)]
struct ReserveStockHandler;

#[async_trait]
impl ActionHandler for ReserveStockHandler {
    async fn execute(
        &self,
        _step: &WorkflowStep,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<ActionOutcome, WorkflowError> {
        let order = ctx
            .var("order_id")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        println!("Reserving stock for {}", order);
        ctx.set_var("reserved", json!(true));
        Ok(ActionOutcome::done())
    }
}

/// Charges the card; the fake gateway drops the first two calls.
#[derive(Debug, Default)]
struct ChargePaymentHandler {
    calls: AtomicU32,
}

#[async_trait]
impl ActionHandler for ChargePaymentHandler {
    async fn execute(
        &self,
        step: &WorkflowStep,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<ActionOutcome, WorkflowError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < 2 {
            return Err(WorkflowError::step_failed(
                step.id.clone(),
                "payment gateway unavailable",
            ));
        }
        let amount = ctx.var("amount").and_then(|v| v.as_i64()).unwrap_or(0);
        println!("Charged {} units", amount);
        ctx.set_var("charged", json!(amount));
        Ok(ActionOutcome::done())
    }
}

fn variables(value: serde_json::Value) -> JsonMap {
    value.as_object().cloned().unwrap_or_default()
}

async fn wait_for(
    engine: &WorkflowEngine,
    execution_id: &ExecutionId,
) -> Result<WorkflowExecution, WorkflowError> {
    loop {
        if let Some(execution) = engine.get_execution(execution_id).await? {
            if execution.is_terminal() {
                return Ok(execution);
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let engine = WorkflowEngine::new();
    engine.register_action_handler("reserve_stock", ReserveStockHandler);
    engine.register_action_handler("charge_payment", ChargePaymentHandler::default());

    let needs_review = Expr::gt(Expr::var("amount"), Expr::literal(1_000));

    engine.register_workflow(
        WorkflowDefinition::new("orders", "Order pipeline", "triage")
            .with_description("Reserve, charge with retry, and confirm")
            .add_step(
                WorkflowStep::new("triage", "Triage", "condition")
                    .with_config_entry("condition", serde_json::to_value(&needs_review)?)
                    .with_config_entry("true_step", json!("hold"))
                    .with_config_entry("false_step", json!("reserve")),
            )
            .add_step(
                WorkflowStep::new("hold", "Hold for review", "log")
                    .with_config_entry("level", json!("warn"))
                    .with_config_entry("message", json!("order parked for manual review")),
            )
            .add_step(
                WorkflowStep::new("reserve", "Reserve stock", "reserve_stock")
                    .succeed_to("charge"),
            )
            .add_step(
                WorkflowStep::new("charge", "Charge payment", "charge_payment")
                    .with_retry(RetryPolicy::fixed(3, Duration::from_millis(200)))
                    .with_timeout_ms(2_000)
                    .succeed_to("confirm")
                    .fail_to("release"),
            )
            .add_step(
                WorkflowStep::new("release", "Release stock", "log")
                    .with_config_entry("level", json!("error"))
                    .with_config_entry("message", json!("charge failed, releasing reservation")),
            )
            .add_step(
                WorkflowStep::new("confirm", "Confirm", "assign")
                    .with_config_entry("assignments", json!({ "status": "confirmed" })),
            ),
    );

    let execution_id = engine
        .start_workflow_with(
            &WorkflowId::new("orders"),
            variables(json!({ "order_id": "ord_1042", "amount": 640 })),
            JsonMap::new(),
        )
        .await?;

    let record = wait_for(&engine, &execution_id).await?;
    println!("Final status: {}", record.status);
    println!(
        "Variables: {}",
        serde_json::to_string_pretty(&record.variables)?
    );
    println!("Execution log:");
    for entry in &record.logs {
        println!("  [{}] {}", entry.level, entry.message);
    }

    Ok(())
}
