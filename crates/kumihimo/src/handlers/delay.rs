//! Pauses a run for a configured interval.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use kumihimo_core::{ActionHandler, ActionOutcome, HandlerContext, WorkflowError, WorkflowStep};

use super::parse_config;

/// Sleeps for `duration` milliseconds (default 1000) before succeeding.
///
/// The sleep is raced against the run's cancellation token, so a cancel
/// request does not ride out the remaining wait.
#[derive(Debug, Default, Clone, Copy)]
pub struct DelayHandler;

#[derive(Debug, Deserialize)]
struct DelayConfig {
    #[serde(default = "default_duration")]
    duration: u64,
}

fn default_duration() -> u64 {
    1000
}

#[async_trait]
impl ActionHandler for DelayHandler {
    async fn execute(
        &self,
        step: &WorkflowStep,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<ActionOutcome, WorkflowError> {
        let config: DelayConfig = parse_config(step)?;
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(config.duration)) => {
                Ok(ActionOutcome::done())
            }
            _ = ctx.cancellation().cancelled() => Err(WorkflowError::step_failed(
                step.id.clone(),
                "delay interrupted by cancellation",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::ContextFixture;
    use std::time::Instant;

    fn delay_step(duration_ms: u64) -> WorkflowStep {
        WorkflowStep::new("wait", "Wait", "delay")
            .with_config_entry("duration", serde_json::json!(duration_ms))
    }

    #[tokio::test]
    async fn test_delay_waits_for_configured_duration() {
        let mut fixture = ContextFixture::new();
        let step = delay_step(30);

        let started = Instant::now();
        let outcome = DelayHandler
            .execute(&step, &mut fixture.ctx())
            .await
            .expect("delay should succeed");

        assert!(started.elapsed() >= Duration::from_millis(30));
        assert!(outcome.next_step.is_none());
    }

    #[tokio::test]
    async fn test_delay_defaults_to_one_second() {
        let mut fixture = ContextFixture::new();
        let step = WorkflowStep::new("wait", "Wait", "delay");

        let started = Instant::now();
        DelayHandler
            .execute(&step, &mut fixture.ctx())
            .await
            .expect("delay should succeed");

        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_cancelled_delay_returns_early() {
        let mut fixture = ContextFixture::new();
        fixture.token.cancel();
        let step = delay_step(60_000);

        let started = Instant::now();
        let result = DelayHandler.execute(&step, &mut fixture.ctx()).await;

        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
