//! Writes a configured message into the execution log.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use kumihimo_core::{
    ActionHandler, ActionOutcome, HandlerContext, LogLevel, WorkflowError, WorkflowStep,
};

use super::parse_config;

/// Appends `message` to the execution log at `level` (default `info`),
/// with `data` attached verbatim when present.
///
/// `message` is required; a step without one fails with an invalid
/// config error.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

#[derive(Debug, Deserialize)]
struct LogConfig {
    #[serde(default)]
    level: LogLevel,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[async_trait]
impl ActionHandler for LogHandler {
    async fn execute(
        &self,
        step: &WorkflowStep,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<ActionOutcome, WorkflowError> {
        let config: LogConfig = parse_config(step)?;
        ctx.logger()
            .log(config.level, Some(&step.id), config.message, config.data);
        Ok(ActionOutcome::done())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::ContextFixture;
    use serde_json::json;

    #[tokio::test]
    async fn test_message_lands_in_the_execution_log() {
        let mut fixture = ContextFixture::new();
        let step = WorkflowStep::new("announce", "Announce", "log")
            .with_config_entry("message", json!("shipment packed"))
            .with_config_entry("data", json!({ "items": 3 }));

        LogHandler
            .execute(&step, &mut fixture.ctx())
            .await
            .expect("log should succeed");

        let entries = fixture.drain_logs();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[0].message, "shipment packed");
        assert_eq!(entries[0].data, Some(json!({ "items": 3 })));
    }

    #[tokio::test]
    async fn test_level_is_configurable() {
        let mut fixture = ContextFixture::new();
        let step = WorkflowStep::new("announce", "Announce", "log")
            .with_config_entry("level", json!("warn"))
            .with_config_entry("message", json!("stock low"));

        LogHandler
            .execute(&step, &mut fixture.ctx())
            .await
            .expect("log should succeed");

        let entries = fixture.drain_logs();
        assert_eq!(entries[0].level, LogLevel::Warn);
    }

    #[tokio::test]
    async fn test_missing_message_is_invalid_config() {
        let mut fixture = ContextFixture::new();
        let step = WorkflowStep::new("announce", "Announce", "log");

        let err = LogHandler
            .execute(&step, &mut fixture.ctx())
            .await
            .expect_err("missing message must fail");

        assert!(matches!(err, WorkflowError::InvalidStepConfig { .. }));
        assert!(fixture.drain_logs().is_empty());
    }
}
