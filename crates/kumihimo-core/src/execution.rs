//! Execution records: one concrete run of a workflow definition.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::definition::{JsonMap, VariableMap, WorkflowId};
use crate::log::WorkflowLog;
use crate::step::StepId;

/// Type-safe execution id wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(String);

impl ExecutionId {
    /// Creates an ExecutionId from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh id of the form `exec_<unix-millis>_<random>`.
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(9)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        Self(format!("exec_{millis}_{suffix}"))
    }

    /// Returns the execution id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ExecutionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ExecutionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ExecutionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ExecutionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Lifecycle state of an execution.
///
/// `Pending` and `Running` are the only non-terminal states; once a
/// terminal state is reached no further transition occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Created but not yet picked up by the interpreter.
    Pending,
    /// The interpreter is walking the graph.
    Running,
    /// The run reached the end of its chain.
    Completed,
    /// The run aborted with an error.
    Failed,
    /// The run was cancelled before finishing.
    Cancelled,
}

impl ExecutionStatus {
    /// Returns `true` for `Completed`, `Failed`, and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        };
        write!(f, "{label}")
    }
}

/// One run of a workflow definition.
///
/// Records handed out by read APIs are snapshots; the interpreter owns
/// the live state for the duration of the run and publishes consistent
/// copies at step boundaries and on termination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Engine-generated unique id.
    pub id: ExecutionId,
    /// Back-reference to the definition this run interprets.
    pub workflow_id: WorkflowId,
    /// Lifecycle state.
    pub status: ExecutionStatus,
    /// Step in flight or last attempted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<StepId>,
    /// When the record was created.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state; set exactly once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// The variable bag as of the latest published snapshot.
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub variables: VariableMap,
    /// Flushed log entries; populated once, when the run ends.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<WorkflowLog>,
    /// Root-cause message, set only on `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The merged metadata bag this run was started with.
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub metadata: JsonMap,
}

impl WorkflowExecution {
    /// Creates a `Pending` record positioned at `start_step`.
    pub fn new(
        workflow_id: WorkflowId,
        start_step: StepId,
        variables: VariableMap,
        metadata: JsonMap,
    ) -> Self {
        Self {
            id: ExecutionId::generate(),
            workflow_id,
            status: ExecutionStatus::Pending,
            current_step: Some(start_step),
            started_at: Utc::now(),
            ended_at: None,
            variables,
            logs: Vec::new(),
            error: None,
            metadata,
        }
    }

    /// Moves the record into `Running`.
    pub fn mark_running(&mut self) {
        self.status = ExecutionStatus::Running;
    }

    /// Terminates the record as `Completed` and stamps `ended_at`.
    pub fn complete(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.ended_at = Some(Utc::now());
    }

    /// Terminates the record as `Failed` with the root-cause message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = ExecutionStatus::Failed;
        self.error = Some(error.into());
        self.ended_at = Some(Utc::now());
    }

    /// Terminates the record as `Cancelled` and stamps `ended_at`.
    pub fn cancel(&mut self) {
        self.status = ExecutionStatus::Cancelled;
        self.ended_at = Some(Utc::now());
    }

    /// Returns `true` once the run has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock duration of the run, once it has ended.
    pub fn run_duration(&self) -> Option<chrono::Duration> {
        self.ended_at.map(|ended| ended - self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> WorkflowExecution {
        WorkflowExecution::new(
            WorkflowId::new("wf"),
            StepId::new("start"),
            VariableMap::new(),
            JsonMap::new(),
        )
    }

    #[test]
    fn test_generated_id_shape() {
        let id = ExecutionId::generate();
        let parts: Vec<&str> = id.as_str().splitn(3, '_').collect();
        assert_eq!(parts[0], "exec");
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = ExecutionId::generate();
        let b = ExecutionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_status_terminality() {
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_lifecycle_stamps() {
        let mut execution = record();
        assert_eq!(execution.status, ExecutionStatus::Pending);
        assert!(execution.ended_at.is_none());

        execution.mark_running();
        assert!(!execution.is_terminal());

        execution.complete();
        assert!(execution.is_terminal());
        let ended = execution.ended_at.expect("ended_at stamped");
        assert!(ended >= execution.started_at);
    }

    #[test]
    fn test_fail_records_error() {
        let mut execution = record();
        execution.mark_running();
        execution.fail("boom");
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.error.as_deref(), Some("boom"));
        assert!(execution.ended_at.is_some());
    }

    #[test]
    fn test_serde_round_trip() {
        let mut execution = record();
        execution.mark_running();
        execution.variables.insert("x".into(), serde_json::json!(5));
        execution.cancel();

        let json = serde_json::to_value(&execution).expect("serialize");
        assert_eq!(json["status"], "cancelled");
        let parsed: WorkflowExecution = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed.id, execution.id);
        assert_eq!(parsed.status, ExecutionStatus::Cancelled);
        assert_eq!(parsed.variables["x"], 5);
    }
}
