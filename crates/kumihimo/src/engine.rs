//! The engine: registries, execution lifecycle, cancellation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use kumihimo_core::{
    ActionHandler, ExecutionId, ExecutionStore, JsonMap, VariableMap, WorkflowDefinition,
    WorkflowError, WorkflowExecution, WorkflowId,
};

use crate::handlers::{AssignHandler, ConditionHandler, DelayHandler, LogHandler, ParallelHandler};
use crate::runner::StepWalker;
use crate::store::InMemoryExecutionStore;

/// Shared engine state, behind one `Arc` so clones of the engine and
/// spawned walkers all observe the same registries.
pub(crate) struct EngineInner {
    pub(crate) definitions: RwLock<HashMap<WorkflowId, Arc<WorkflowDefinition>>>,
    pub(crate) handlers: RwLock<HashMap<String, Arc<dyn ActionHandler>>>,
    pub(crate) store: Arc<dyn ExecutionStore>,
    pub(crate) active: RwLock<HashMap<ExecutionId, RunEntry>>,
}

/// Bookkeeping for one in-flight execution.
pub(crate) struct RunEntry {
    pub(crate) token: CancellationToken,
    pub(crate) task: Option<JoinHandle<()>>,
}

impl EngineInner {
    pub(crate) fn new(store: Arc<dyn ExecutionStore>) -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
            store,
            active: RwLock::new(HashMap::new()),
        }
    }
}

/// Registers workflows and action handlers, starts and cancels runs,
/// and exposes execution records through its [`ExecutionStore`].
///
/// The engine is cheap to clone; clones share registries, store, and
/// the set of in-flight runs. Every engine starts with the built-in
/// `delay`, `condition`, `log`, `assign`, and `parallel` handlers
/// registered; both registries accept re-registration under an existing
/// key, and the newest entry wins for runs started afterwards.
///
/// # Examples
///
/// ```
/// use kumihimo::prelude::*;
///
/// let engine = WorkflowEngine::new();
/// engine.register_workflow(
///     WorkflowDefinition::new("nightly", "Nightly sweep", "sweep").add_step(
///         WorkflowStep::new("sweep", "Sweep", "log")
///             .with_config_entry("message", serde_json::json!("sweeping")),
///     ),
/// );
/// assert_eq!(engine.active_count(), 0);
/// ```
#[derive(Clone)]
pub struct WorkflowEngine {
    inner: Arc<EngineInner>,
}

impl WorkflowEngine {
    /// Creates an engine backed by an [`InMemoryExecutionStore`].
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryExecutionStore::new()))
    }

    /// Creates an engine backed by the given store.
    pub fn with_store(store: Arc<dyn ExecutionStore>) -> Self {
        let engine = Self {
            inner: Arc::new(EngineInner::new(store)),
        };
        engine.register_action_handler("delay", DelayHandler);
        engine.register_action_handler("condition", ConditionHandler);
        engine.register_action_handler("log", LogHandler);
        engine.register_action_handler("assign", AssignHandler);
        engine.register_action_handler("parallel", ParallelHandler);
        engine
    }

    /// Registers a workflow definition under its id.
    ///
    /// Re-registering an id replaces the previous definition; runs
    /// already started keep the definition they were started with.
    pub fn register_workflow(&self, definition: WorkflowDefinition) {
        tracing::info!(
            workflow_id = %definition.id,
            name = %definition.name,
            "workflow definition registered"
        );
        self.inner
            .definitions
            .write()
            .insert(definition.id.clone(), Arc::new(definition));
    }

    /// Registers an action handler for a step type.
    ///
    /// Handlers are looked up by step type when each step starts, so a
    /// handler registered after a run begins still serves that run's
    /// later steps.
    pub fn register_action_handler<H>(&self, step_type: impl Into<String>, handler: H)
    where
        H: ActionHandler + 'static,
    {
        let step_type = step_type.into();
        tracing::debug!(step_type = %step_type, "action handler registered");
        self.inner.handlers.write().insert(step_type, Arc::new(handler));
    }

    /// Starts a run of `workflow_id` with the definition's own initial
    /// variables and no extra metadata.
    pub async fn start_workflow(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<ExecutionId, WorkflowError> {
        self.start_workflow_with(workflow_id, VariableMap::new(), JsonMap::new())
            .await
    }

    /// Starts a run with caller-supplied variables and metadata merged
    /// over the definition's (caller entries win per key).
    ///
    /// Returns as soon as the initial `pending` record is stored and the
    /// run is spawned; it does not wait for any step. The only
    /// synchronous failure is an unregistered `workflow_id` (or a store
    /// refusing the initial record). Everything later, including a
    /// missing start step, lands in the execution record instead.
    pub async fn start_workflow_with(
        &self,
        workflow_id: &WorkflowId,
        variables: VariableMap,
        metadata: JsonMap,
    ) -> Result<ExecutionId, WorkflowError> {
        let definition = self
            .inner
            .definitions
            .read()
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| WorkflowError::WorkflowNotFound(workflow_id.clone()))?;

        let mut merged_variables = definition.variables.clone();
        for (key, value) in variables {
            merged_variables.insert(key, value);
        }
        let mut merged_metadata = definition.metadata.clone();
        for (key, value) in metadata {
            merged_metadata.insert(key, value);
        }

        let execution = WorkflowExecution::new(
            definition.id.clone(),
            definition.start_step.clone(),
            merged_variables,
            merged_metadata,
        );
        let execution_id = execution.id.clone();
        self.inner.store.put(execution.clone()).await?;

        // The entry goes in before the spawn so a cancel arriving right
        // after start_workflow returns always finds the token.
        let token = CancellationToken::new();
        self.inner.active.write().insert(
            execution_id.clone(),
            RunEntry {
                token: token.clone(),
                task: None,
            },
        );

        let walker = StepWalker::new(Arc::clone(&self.inner), definition, execution, token);
        let task = tokio::spawn(walker.run());
        if let Some(entry) = self.inner.active.write().get_mut(&execution_id) {
            entry.task = Some(task);
        }

        tracing::info!(
            workflow_id = %workflow_id,
            execution_id = %execution_id,
            "workflow execution scheduled"
        );
        Ok(execution_id)
    }

    /// Fetches the stored snapshot of an execution, if any.
    pub async fn get_execution(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Option<WorkflowExecution>, WorkflowError> {
        self.inner.store.get(execution_id).await
    }

    /// Requests cancellation of a run.
    ///
    /// Returns `true` exactly when this call flipped a live, not yet
    /// cancelled run; unknown ids, finished runs, and repeat cancels all
    /// return `false`. The run settles to `cancelled` at its next step
    /// boundary, so the record may briefly still read as running.
    pub fn cancel_workflow(&self, execution_id: &ExecutionId) -> bool {
        let active = self.inner.active.read();
        match active.get(execution_id) {
            Some(entry) if !entry.token.is_cancelled() => {
                entry.token.cancel();
                tracing::info!(execution_id = %execution_id, "workflow cancellation requested");
                true
            }
            _ => false,
        }
    }

    /// Whether the run still has a live task (it may be mid-cancel).
    pub fn is_running(&self, execution_id: &ExecutionId) -> bool {
        self.inner.active.read().contains_key(execution_id)
    }

    /// Number of in-flight executions.
    pub fn active_count(&self) -> usize {
        self.inner.active.read().len()
    }

    /// Cancels every in-flight run, aborts their tasks, and clears both
    /// registries. The store and its records survive.
    pub fn shutdown(&self) {
        let entries: Vec<RunEntry> = {
            let mut active = self.inner.active.write();
            active.drain().map(|(_, entry)| entry).collect()
        };
        let aborted = entries.len();
        for entry in entries {
            entry.token.cancel();
            if let Some(task) = entry.task {
                task.abort();
            }
        }
        self.inner.definitions.write().clear();
        self.inner.handlers.write().clear();
        tracing::info!(aborted, "workflow engine shut down");
    }
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("definitions", &self.inner.definitions.read().len())
            .field("handlers", &self.inner.handlers.read().len())
            .field("active", &self.inner.active.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use kumihimo_core::WorkflowStep;

    fn sample_definition() -> WorkflowDefinition {
        WorkflowDefinition::new("wf", "Sample", "only").add_step(
            WorkflowStep::new("only", "Only", "log")
                .with_config_entry("message", serde_json::json!("hi")),
        )
    }

    #[test]
    fn test_register_workflow_overwrites_silently() {
        let engine = WorkflowEngine::new();
        engine.register_workflow(sample_definition());
        engine.register_workflow(sample_definition().with_version(2));

        let version = engine
            .inner
            .definitions
            .read()
            .get(&WorkflowId::new("wf"))
            .map(|definition| definition.version);
        assert_eq!(version, Some(2));
    }

    #[test]
    fn test_builtin_handlers_registered() {
        let engine = WorkflowEngine::new();
        let handlers = engine.inner.handlers.read();
        for step_type in ["delay", "condition", "log", "assign", "parallel"] {
            assert!(handlers.contains_key(step_type), "missing builtin {step_type}");
        }
    }

    #[test]
    fn test_cancel_unknown_execution_returns_false() {
        let engine = WorkflowEngine::new();
        assert!(!engine.cancel_workflow(&ExecutionId::new("exec_0_aaaaaaaaa")));
        assert_eq!(engine.active_count(), 0);
    }

    #[tokio::test]
    async fn test_start_unknown_workflow_fails_synchronously() {
        let engine = WorkflowEngine::new();
        let err = engine
            .start_workflow(&WorkflowId::new("ghost"))
            .await
            .expect_err("unregistered workflow must fail");
        assert!(matches!(err, WorkflowError::WorkflowNotFound(_)));
    }

    #[test]
    fn test_debug_does_not_dump_state() {
        let engine = WorkflowEngine::new();
        let rendered = format!("{engine:?}");
        assert!(rendered.contains("WorkflowEngine"));
        assert!(rendered.contains("handlers"));
    }
}
