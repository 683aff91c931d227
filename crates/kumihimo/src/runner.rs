//! The step interpreter: walks one execution to a terminal state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use kumihimo_core::{
    ActionHandler, ActionOutcome, BranchRunner, ExecutionLogger, HandlerContext, StepId,
    VariableMap, WorkflowDefinition, WorkflowError, WorkflowExecution,
};

use crate::engine::EngineInner;

/// Drives a single execution from its start step to a terminal state.
///
/// The walker owns the execution record for the whole run; concurrent
/// readers only ever see the snapshots it publishes to the store at step
/// boundaries and on termination. Cancellation arrives through the
/// token and is honored between steps; handlers get the same token to
/// abort in-flight waits early.
pub(crate) struct StepWalker {
    inner: Arc<EngineInner>,
    definition: Arc<WorkflowDefinition>,
    base: WorkflowExecution,
    logger: ExecutionLogger,
    token: CancellationToken,
    last_step: Mutex<Option<StepId>>,
}

impl StepWalker {
    pub(crate) fn new(
        inner: Arc<EngineInner>,
        definition: Arc<WorkflowDefinition>,
        execution: WorkflowExecution,
        token: CancellationToken,
    ) -> Self {
        let last_step = Mutex::new(execution.current_step.clone());
        Self {
            inner,
            definition,
            base: execution,
            logger: ExecutionLogger::new(),
            token,
            last_step,
        }
    }

    /// Runs the execution to completion and publishes the final record.
    ///
    /// Never returns an error: everything that goes wrong inside the run
    /// is contained in the record's `status`/`error` fields.
    pub(crate) async fn run(mut self) {
        let mut variables = std::mem::take(&mut self.base.variables);
        if self.token.is_cancelled() {
            // Cancelled between scheduling and pickup; no step starts.
            self.finalize(Ok(()), variables).await;
        } else {
            self.base.mark_running();
            self.logger.info(
                None,
                format!("Workflow '{}' started", self.definition.name),
                None,
            );
            tracing::info!(
                execution_id = %self.base.id,
                workflow_id = %self.base.workflow_id,
                "workflow execution running"
            );
            let start = self.definition.start_step.clone();
            let result = self.walk(start, &mut variables, true).await;
            self.finalize(result, variables).await;
        }
        self.inner.active.write().remove(&self.base.id);
    }

    /// Follows edges from `start` until the chain terminates, a failure
    /// has no `on_failure` edge, or cancellation is requested.
    async fn walk(
        &self,
        start: StepId,
        variables: &mut VariableMap,
        checkpoint: bool,
    ) -> Result<(), WorkflowError> {
        let mut current = Some(start);
        while let Some(step_id) = current.take() {
            if self.token.is_cancelled() {
                break;
            }
            let step = match self.definition.step(&step_id) {
                Some(step) => step,
                None => return Err(WorkflowError::StepNotFound(step_id)),
            };
            if checkpoint {
                self.checkpoint(&step.id, variables).await;
            }
            let handler = self.inner.handlers.read().get(&step.step_type).cloned();
            let handler = match handler {
                Some(handler) => handler,
                None => return Err(WorkflowError::HandlerNotFound(step.step_type.clone())),
            };
            tracing::debug!(
                execution_id = %self.base.id,
                step = %step.id,
                step_type = %step.step_type,
                "executing step"
            );
            let mut ctx = HandlerContext::new(
                &self.base.id,
                &self.base.workflow_id,
                variables,
                &self.base.metadata,
                &self.logger,
                &self.token,
                self,
            );
            let result = self
                .execute_with_retry(step, handler.as_ref(), &mut ctx)
                .await;
            match result {
                Ok(outcome) => {
                    self.logger.info(
                        Some(&step.id),
                        format!("Step '{}' completed", step.name),
                        outcome.data,
                    );
                    current = outcome.next_step.or_else(|| step.on_success.clone());
                }
                Err(err) => {
                    self.logger.error(
                        Some(&step.id),
                        format!("Step '{}' failed: {err}", step.name),
                        None,
                    );
                    tracing::debug!(step = %step.id, error = %err, "step failed");
                    match &step.on_failure {
                        Some(next) => current = Some(next.clone()),
                        None => return Err(err),
                    }
                }
            }
        }
        Ok(())
    }

    /// Invokes the handler, retrying per the step's policy.
    ///
    /// Each attempt is raced against the step's timeout; retry sleeps are
    /// cut short when cancellation is requested.
    async fn execute_with_retry(
        &self,
        step: &kumihimo_core::WorkflowStep,
        handler: &dyn ActionHandler,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<ActionOutcome, WorkflowError> {
        let max_retries = step.retry.max_retries();
        let mut attempt = 0;
        loop {
            match self.execute_attempt(step, handler, ctx).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) => {
                    if attempt >= max_retries || self.token.is_cancelled() {
                        return Err(err);
                    }
                    self.logger.warn(
                        Some(&step.id),
                        format!(
                            "Step '{}' failed, retrying ({}/{})",
                            step.name,
                            attempt + 1,
                            max_retries
                        ),
                        None,
                    );
                    tracing::info!(
                        step = %step.id,
                        attempt = attempt + 1,
                        max_retries,
                        "retrying step"
                    );
                    if let Some(delay) = step.retry.delay_for_attempt(attempt) {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = self.token.cancelled() => return Err(err),
                        }
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn execute_attempt(
        &self,
        step: &kumihimo_core::WorkflowStep,
        handler: &dyn ActionHandler,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<ActionOutcome, WorkflowError> {
        match step.timeout_ms {
            Some(timeout_ms) => {
                let limit = Duration::from_millis(timeout_ms);
                match tokio::time::timeout(limit, handler.execute(step, ctx)).await {
                    Ok(result) => result,
                    Err(_) => Err(WorkflowError::StepTimeout {
                        step: step.id.clone(),
                        timeout_ms,
                    }),
                }
            }
            None => handler.execute(step, ctx).await,
        }
    }

    /// Publishes a consistent snapshot before the step executes.
    async fn checkpoint(&self, step_id: &StepId, variables: &VariableMap) {
        *self.last_step.lock() = Some(step_id.clone());
        let mut snapshot = self.base.clone();
        snapshot.current_step = Some(step_id.clone());
        snapshot.variables = variables.clone();
        if let Err(err) = self.inner.store.put(snapshot).await {
            tracing::warn!(
                execution_id = %self.base.id,
                step = %step_id,
                error = %err,
                "failed to checkpoint execution"
            );
        }
    }

    /// Settles the record into exactly one terminal state, flushes the
    /// log, and publishes the final snapshot.
    async fn finalize(&mut self, result: Result<(), WorkflowError>, variables: VariableMap) {
        self.base.variables = variables;
        self.base.current_step = self.last_step.lock().clone();
        if self.token.is_cancelled() {
            self.logger.warn(None, "Workflow cancelled", None);
            tracing::info!(execution_id = %self.base.id, "workflow execution cancelled");
            self.base.cancel();
        } else {
            match result {
                Ok(()) => {
                    self.logger.info(None, "Workflow completed", None);
                    tracing::info!(execution_id = %self.base.id, "workflow execution completed");
                    self.base.complete();
                }
                Err(err) => {
                    self.logger
                        .error(None, format!("Workflow failed: {err}"), None);
                    tracing::warn!(
                        execution_id = %self.base.id,
                        error = %err,
                        "workflow execution failed"
                    );
                    self.base.fail(err.to_string());
                }
            }
        }
        self.base.logs = self.logger.drain();
        if let Err(err) = self.inner.store.put(self.base.clone()).await {
            tracing::error!(
                execution_id = %self.base.id,
                error = %err,
                "failed to persist final execution record"
            );
        }
    }
}

#[async_trait]
impl BranchRunner for StepWalker {
    async fn run_branch(
        &self,
        start: &StepId,
        mut variables: VariableMap,
    ) -> Result<VariableMap, WorkflowError> {
        tracing::debug!(execution_id = %self.base.id, branch = %start, "running branch");
        self.walk(start.clone(), &mut variables, false).await?;
        Ok(variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kumihimo_core::{ExecutionStatus, ExecutionStore, JsonMap, WorkflowStep};

    use crate::store::InMemoryExecutionStore;

    #[derive(Debug)]
    struct MarkHandler;

    #[async_trait]
    impl ActionHandler for MarkHandler {
        async fn execute(
            &self,
            step: &WorkflowStep,
            ctx: &mut HandlerContext<'_>,
        ) -> Result<ActionOutcome, WorkflowError> {
            ctx.set_var(step.id.as_str(), serde_json::json!(true));
            Ok(ActionOutcome::done())
        }
    }

    fn walker_for(
        definition: WorkflowDefinition,
        store: Arc<InMemoryExecutionStore>,
    ) -> (StepWalker, kumihimo_core::ExecutionId, CancellationToken) {
        let inner = Arc::new(EngineInner::new(store));
        inner
            .handlers
            .write()
            .insert("mark".to_string(), Arc::new(MarkHandler));
        let definition = Arc::new(definition);
        let execution = WorkflowExecution::new(
            definition.id.clone(),
            definition.start_step.clone(),
            definition.variables.clone(),
            JsonMap::new(),
        );
        let execution_id = execution.id.clone();
        let token = CancellationToken::new();
        let walker = StepWalker::new(inner, definition, execution, token.clone());
        (walker, execution_id, token)
    }

    #[tokio::test]
    async fn test_walk_follows_success_edges() {
        let definition = WorkflowDefinition::new("wf", "Chained", "first")
            .add_step(WorkflowStep::new("first", "First", "mark").succeed_to("second"))
            .add_step(WorkflowStep::new("second", "Second", "mark"));
        let store = Arc::new(InMemoryExecutionStore::new());
        let (walker, execution_id, _token) = walker_for(definition, Arc::clone(&store));

        walker.run().await;

        let record = store
            .get(&execution_id)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert_eq!(record.variables["first"], true);
        assert_eq!(record.variables["second"], true);
        assert_eq!(record.current_step, Some(StepId::new("second")));
        assert!(record.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_edge_target_fails_the_run() {
        let definition = WorkflowDefinition::new("wf", "Broken", "first")
            .add_step(WorkflowStep::new("first", "First", "mark").succeed_to("ghost"));
        let store = Arc::new(InMemoryExecutionStore::new());
        let (walker, execution_id, _token) = walker_for(definition, Arc::clone(&store));

        walker.run().await;

        let record = store
            .get(&execution_id)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("Step not found: ghost"));
    }

    #[tokio::test]
    async fn test_cancel_before_pickup_runs_no_step() {
        let definition = WorkflowDefinition::new("wf", "Never", "first")
            .add_step(WorkflowStep::new("first", "First", "mark"));
        let store = Arc::new(InMemoryExecutionStore::new());
        let (walker, execution_id, token) = walker_for(definition, Arc::clone(&store));

        token.cancel();
        walker.run().await;

        let record = store
            .get(&execution_id)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(record.status, ExecutionStatus::Cancelled);
        assert!(record.variables.is_empty());
        assert!(record.ended_at.is_some());
    }
}
