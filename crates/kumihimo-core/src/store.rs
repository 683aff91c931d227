//! Pluggable home for execution records.

use async_trait::async_trait;

use crate::error::WorkflowError;
use crate::execution::{ExecutionId, WorkflowExecution};

/// Storage abstraction for execution records.
///
/// The engine writes whole-record snapshots through `put` and reads them
/// back through `get`; it never mutates a stored record in place. Growth
/// and retention policy belong to the implementation: a TTL cache, a
/// database table, or a bounded LRU all fit behind this trait. The
/// default in-process implementation lives in the engine crate.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Inserts or replaces the record keyed by its id.
    async fn put(&self, execution: WorkflowExecution) -> Result<(), WorkflowError>;

    /// Fetches a snapshot of the record, if present.
    async fn get(&self, id: &ExecutionId) -> Result<Option<WorkflowExecution>, WorkflowError>;

    /// Lists snapshots of every stored record.
    async fn list(&self) -> Result<Vec<WorkflowExecution>, WorkflowError>;

    /// Removes a record, reporting whether it existed.
    async fn delete(&self, id: &ExecutionId) -> Result<bool, WorkflowError>;
}
