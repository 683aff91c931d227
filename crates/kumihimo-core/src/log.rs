//! Execution-scoped logging.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::step::StepId;

/// Severity of a [`WorkflowLog`] entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Normal progress reporting.
    #[default]
    Info,
    /// Something unexpected but survivable.
    Warn,
    /// A failure worth surfacing.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        write!(f, "{label}")
    }
}

/// One log line within an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowLog {
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// Entry severity.
    pub level: LogLevel,
    /// The step this entry concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<StepId>,
    /// Human-readable message.
    pub message: String,
    /// Optional structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Append-only log sink scoped to a single execution.
///
/// The interpreter and handlers share one logger through plain
/// references; entries accumulate until [`drain`](Self::drain) moves them
/// into the execution record, which happens exactly once per run.
#[derive(Debug, Default)]
pub struct ExecutionLogger {
    entries: Mutex<Vec<WorkflowLog>>,
}

impl ExecutionLogger {
    /// Creates an empty logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry at the given level.
    pub fn log(
        &self,
        level: LogLevel,
        step: Option<&StepId>,
        message: impl Into<String>,
        data: Option<Value>,
    ) {
        self.lock().push(WorkflowLog {
            timestamp: Utc::now(),
            level,
            step: step.cloned(),
            message: message.into(),
            data,
        });
    }

    /// Appends a `debug` entry.
    pub fn debug(&self, step: Option<&StepId>, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Debug, step, message, data);
    }

    /// Appends an `info` entry.
    pub fn info(&self, step: Option<&StepId>, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Info, step, message, data);
    }

    /// Appends a `warn` entry.
    pub fn warn(&self, step: Option<&StepId>, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Warn, step, message, data);
    }

    /// Appends an `error` entry.
    pub fn error(&self, step: Option<&StepId>, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Error, step, message, data);
    }

    /// Takes every accumulated entry out of the logger.
    pub fn drain(&self) -> Vec<WorkflowLog> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of accumulated entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no entries have accumulated.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<WorkflowLog>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
