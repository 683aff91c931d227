//! Workflow step type and retry policy.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::definition::JsonMap;

/// Type-safe step id wrapper.
///
/// Step ids are unique within one workflow definition and serve as edge
/// targets for `on_success`/`on_failure` routing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(String);

impl StepId {
    /// Creates a new StepId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the step id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StepId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for StepId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for StepId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Retry policy for step execution.
///
/// Delays are expressed in milliseconds so policies serialize cleanly
/// inside workflow documents.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// No retry - fail immediately on error.
    #[default]
    None,
    /// Fixed delay between retries.
    Fixed {
        /// Maximum number of retry attempts.
        max_retries: u32,
        /// Delay between each retry, in milliseconds.
        delay_ms: u64,
    },
    /// Exponential backoff with configurable parameters.
    ExponentialBackoff {
        /// Maximum number of retry attempts.
        max_retries: u32,
        /// Initial delay before the first retry, in milliseconds.
        initial_delay_ms: u64,
        /// Maximum delay cap, in milliseconds.
        max_delay_ms: u64,
        /// Multiplier for each retry.
        multiplier: u32,
    },
}

/// Error returned when [`RetryPolicy`] configuration is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicyError(pub &'static str);

impl fmt::Display for RetryPolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RetryPolicyError {}

impl RetryPolicy {
    /// Creates a fixed retry policy.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        RetryPolicy::Fixed {
            max_retries,
            delay_ms: delay.as_millis() as u64,
        }
    }

    /// Creates an exponential backoff retry policy with default settings.
    pub fn exponential(max_retries: u32, initial_delay: Duration) -> Self {
        RetryPolicy::ExponentialBackoff {
            max_retries,
            initial_delay_ms: initial_delay.as_millis() as u64,
            max_delay_ms: Duration::from_secs(60).as_millis() as u64,
            multiplier: 2,
        }
    }

    /// Creates an exponential backoff retry policy with custom settings.
    pub fn exponential_backoff(
        max_retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: u32,
    ) -> Result<Self, RetryPolicyError> {
        if multiplier == 0 {
            return Err(RetryPolicyError("multiplier must be greater than 0"));
        }
        if multiplier > 10 {
            return Err(RetryPolicyError(
                "multiplier must be 10 or less to avoid overflow",
            ));
        }
        if max_delay < initial_delay {
            return Err(RetryPolicyError("max_delay must be >= initial_delay"));
        }
        Ok(RetryPolicy::ExponentialBackoff {
            max_retries,
            initial_delay_ms: initial_delay.as_millis() as u64,
            max_delay_ms: max_delay.as_millis() as u64,
            multiplier,
        })
    }

    /// Returns the maximum number of retries for this policy.
    pub fn max_retries(&self) -> u32 {
        match self {
            RetryPolicy::None => 0,
            RetryPolicy::Fixed { max_retries, .. } => *max_retries,
            RetryPolicy::ExponentialBackoff { max_retries, .. } => *max_retries,
        }
    }

    /// Calculates the delay for the given retry attempt.
    ///
    /// ```
    /// use std::time::Duration;
    /// use kumihimo_core::RetryPolicy;
    ///
    /// let policy = RetryPolicy::exponential(5, Duration::from_millis(100));
    /// assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_millis(100)));
    /// assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(400)));
    /// ```
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            RetryPolicy::None => None,
            RetryPolicy::Fixed { delay_ms, .. } => Some(Duration::from_millis(*delay_ms)),
            RetryPolicy::ExponentialBackoff {
                initial_delay_ms,
                max_delay_ms,
                multiplier,
                ..
            } => {
                let factor = u64::from(*multiplier).saturating_pow(attempt);
                let delay = initial_delay_ms.saturating_mul(factor).min(*max_delay_ms);
                Some(Duration::from_millis(delay))
            }
        }
    }

    /// Returns `true` if this policy never retries.
    pub fn is_none(&self) -> bool {
        matches!(self, RetryPolicy::None)
    }
}

/// One node in a workflow graph.
///
/// The `step_type` is an open string key into the engine's handler
/// registry, not a closed enum; `config` is an open bag interpreted only
/// by the handler for that type. Steps serialize to and from JSON
/// documents, so definitions can live outside the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Unique id within a workflow, used as edge target.
    pub id: StepId,
    /// Human label for logs.
    pub name: String,
    /// Handler registry key selecting how this step executes.
    #[serde(rename = "type")]
    pub step_type: String,
    /// Handler-specific configuration.
    #[serde(default, skip_serializing_if = "JsonMap::is_empty")]
    pub config: JsonMap,
    /// Next step when the handler succeeds, unless it supplies its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<StepId>,
    /// Next step when the handler fails; absence makes a failure fatal
    /// to the whole execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<StepId>,
    /// Retry policy applied by the interpreter around each invocation.
    #[serde(default, skip_serializing_if = "RetryPolicy::is_none")]
    pub retry: RetryPolicy,
    /// Per-attempt execution deadline in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl WorkflowStep {
    /// Creates a step with an empty config and no outgoing edges.
    pub fn new(
        id: impl Into<StepId>,
        name: impl Into<String>,
        step_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            step_type: step_type.into(),
            config: JsonMap::new(),
            on_success: None,
            on_failure: None,
            retry: RetryPolicy::None,
            timeout_ms: None,
        }
    }

    /// Replaces the handler configuration.
    pub fn with_config(mut self, config: JsonMap) -> Self {
        self.config = config;
        self
    }

    /// Inserts a single key into the handler configuration.
    pub fn with_config_entry(
        mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Sets the step to run next on success.
    pub fn succeed_to(mut self, step: impl Into<StepId>) -> Self {
        self.on_success = Some(step.into());
        self
    }

    /// Sets the step to run next on failure.
    pub fn fail_to(mut self, step: impl Into<StepId>) -> Self {
        self.on_failure = Some(step.into());
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-attempt timeout in milliseconds.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Returns the per-attempt timeout as a [`Duration`], if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
