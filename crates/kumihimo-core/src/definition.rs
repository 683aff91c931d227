//! Workflow definition: an immutable, named graph of steps.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::step::{StepId, WorkflowStep};

/// An open key-value bag of JSON values.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// The variable bag threaded through a workflow execution.
pub type VariableMap = JsonMap;

/// Type-safe workflow id wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(String);

impl WorkflowId {
    /// Creates a new WorkflowId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the workflow id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkflowId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for WorkflowId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for WorkflowId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for WorkflowId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// An immutable, named graph of steps describing one repeatable process.
///
/// Definitions are plain data: they serialize to and from JSON, carry no
/// behavior, and are interpreted by the engine against its handler
/// registry. Edge ids that resolve to no step in the same definition
/// surface at run time as "Step not found" failures; nothing is checked
/// at registration.
///
/// ```
/// use kumihimo_core::{WorkflowDefinition, WorkflowStep};
///
/// let definition = WorkflowDefinition::new("greeter", "Greeter", "hello")
///     .add_step(
///         WorkflowStep::new("hello", "Say hello", "log")
///             .with_config_entry("message", serde_json::json!("hello there")),
///     );
///
/// assert!(definition.step(&"hello".into()).is_some());
/// assert!(definition.step(&"missing".into()).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Registry key for this definition.
    pub id: WorkflowId,
    /// Human-readable name.
    pub name: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Definition version, for documentation purposes.
    #[serde(default = "default_version")]
    pub version: u32,
    /// The nodes of the graph; order is irrelevant, lookup is by id.
    pub steps: Vec<WorkflowStep>,
    /// Id of the first step to run.
    pub start_step: StepId,
    /// Default variables merged under caller-supplied variables at start.
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub variables: VariableMap,
    /// Opaque bag passed through to handlers.
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub metadata: JsonMap,
}

fn default_version() -> u32 {
    1
}

impl WorkflowDefinition {
    /// Creates an empty definition starting at `start_step`.
    pub fn new(
        id: impl Into<WorkflowId>,
        name: impl Into<String>,
        start_step: impl Into<StepId>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            version: default_version(),
            steps: Vec::new(),
            start_step: start_step.into(),
            variables: VariableMap::new(),
            metadata: JsonMap::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the version.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Replaces the default variable bag.
    pub fn with_variables(mut self, variables: VariableMap) -> Self {
        self.variables = variables;
        self
    }

    /// Inserts one default variable.
    pub fn with_variable(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.variables.insert(key.into(), value);
        self
    }

    /// Replaces the metadata bag.
    pub fn with_metadata(mut self, metadata: JsonMap) -> Self {
        self.metadata = metadata;
        self
    }

    /// Appends a step to the graph.
    ///
    /// Duplicate ids are not rejected; the first match wins at lookup
    /// time, mirroring the registry's tolerance for sloppy documents.
    pub fn add_step(mut self, step: WorkflowStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Looks up a step by id.
    pub fn step(&self, id: &StepId) -> Option<&WorkflowStep> {
        self.steps.iter().find(|step| &step.id == id)
    }

    /// Returns the number of steps in the graph.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}
