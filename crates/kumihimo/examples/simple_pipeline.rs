//! Smallest useful pipeline: pace, then report.

use kumihimo::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let engine = WorkflowEngine::new();

    engine.register_workflow(
        WorkflowDefinition::new("pacer", "Pacer", "wait")
            .with_description("Waits a moment, then reports in")
            .add_step(
                WorkflowStep::new("wait", "Wait", "delay")
                    .with_config_entry("duration", serde_json::json!(200))
                    .succeed_to("report"),
            )
            .add_step(
                WorkflowStep::new("report", "Report", "log")
                    .with_config_entry("message", serde_json::json!("pipeline reached the end")),
            ),
    );

    let execution_id = engine.start_workflow(&WorkflowId::new("pacer")).await?;
    println!("Started execution {}", execution_id);

    loop {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        if let Some(execution) = engine.get_execution(&execution_id).await? {
            println!("  status: {}", execution.status);
            if execution.is_terminal() {
                println!("Execution log:");
                for entry in &execution.logs {
                    println!("  [{}] {}", entry.level, entry.message);
                }
                break;
            }
        }
    }

    Ok(())
}
