//! Default in-process execution store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use kumihimo_core::{ExecutionId, ExecutionStore, WorkflowError, WorkflowExecution};

/// Keeps execution records in a map for the life of the process.
///
/// Reads hand out clones, so callers never alias the engine's data. This
/// store never fails; it exists as the zero-setup default, and anything
/// with an eviction or durability story should implement
/// [`ExecutionStore`] instead.
#[derive(Debug, Default)]
pub struct InMemoryExecutionStore {
    executions: RwLock<HashMap<ExecutionId, WorkflowExecution>>,
}

impl InMemoryExecutionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.executions.read().await.len()
    }

    /// Returns `true` if no records are held.
    pub async fn is_empty(&self) -> bool {
        self.executions.read().await.is_empty()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn put(&self, execution: WorkflowExecution) -> Result<(), WorkflowError> {
        self.executions
            .write()
            .await
            .insert(execution.id.clone(), execution);
        Ok(())
    }

    async fn get(&self, id: &ExecutionId) -> Result<Option<WorkflowExecution>, WorkflowError> {
        Ok(self.executions.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<WorkflowExecution>, WorkflowError> {
        Ok(self.executions.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: &ExecutionId) -> Result<bool, WorkflowError> {
        Ok(self.executions.write().await.remove(id).is_some())
    }
}
