//! Action and spawn descriptions plus their execution results.

use crate::resource::ResourceSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::time::Duration;

/// Capability classes an execution strategy can serve.
///
/// Every declared capability must have at least one registered
/// implementation per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionCapability {
    /// Execute an action as a local child process.
    Spawn,
    /// Produce the include-extraction artifact for a compile action.
    IncludeExtraction,
    /// Discover additional compile inputs ahead of execution.
    IncludeScanning,
    /// Run a test action.
    TestExecution,
    /// Materialize declared file contents as an output artifact.
    FileWrite,
}

impl Display for ActionCapability {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Spawn => "Spawn",
            Self::IncludeExtraction => "IncludeExtraction",
            Self::IncludeScanning => "IncludeScanning",
            Self::TestExecution => "TestExecution",
            Self::FileWrite => "FileWrite",
        };
        write!(formatter, "{name}")
    }
}

/// The environment an action requests for its child process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvRequest {
    /// Inherit the whole captured client environment.
    InheritClient,
    /// Use exactly these variables (plus platform-mandated ones).
    Explicit(BTreeMap<String, String>),
}

impl Default for EnvRequest {
    fn default() -> Self {
        Self::Explicit(BTreeMap::new())
    }
}

/// One unit of build work to execute as a local child process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnSpec {
    /// Short action-class name, e.g. `CppCompile` or `TestRunner`.
    pub mnemonic: String,
    /// Program and arguments; the first element is the executable.
    pub argv: Vec<String>,
    /// Working directory relative to the execution root; `None` runs at
    /// the execution root itself.
    pub working_dir: Option<PathBuf>,
    /// Requested child environment.
    pub env: EnvRequest,
    /// Variables always set on the child, overriding whatever the
    /// requested environment produced. Used for per-action values like a
    /// test's scratch directory.
    pub fixed_env: BTreeMap<String, String>,
    /// Declared resource requirement.
    pub resources: ResourceSet,
    /// Optional wall-time limit for the child process.
    pub timeout: Option<Duration>,
    /// Explicit strategy override by name; `None` uses capability
    /// resolution (last registered wins).
    pub strategy: Option<String>,
}

impl SpawnSpec {
    /// A spawn of `argv` with default environment and no resources.
    pub fn new(mnemonic: impl Into<String>, argv: Vec<String>) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            argv,
            working_dir: None,
            env: EnvRequest::default(),
            fixed_env: BTreeMap::new(),
            resources: ResourceSet::default(),
            timeout: None,
            strategy: None,
        }
    }

    /// Set the declared resource requirement.
    #[must_use]
    pub fn with_resources(mut self, resources: ResourceSet) -> Self {
        self.resources = resources;
        self
    }

    /// Set the requested child environment.
    #[must_use]
    pub fn with_env(mut self, env: EnvRequest) -> Self {
        self.env = env;
        self
    }

    /// Set the wall-time limit.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// How a spawned child process terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnStatus {
    /// Exit code zero.
    Success,
    /// Non-zero exit code.
    NonZeroExit(i32),
    /// Terminated by a signal (Unix only).
    SignalTermination(i32),
    /// The process never started.
    SpawnFailed(String),
    /// The wall-time limit elapsed and the child was killed.
    TimedOut,
}

/// Result of running one spawn to completion.
///
/// A failed child is a per-action execution failure carried here, never an
/// error propagated past the runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnResult {
    /// Termination classification.
    pub status: SpawnStatus,
    /// Raw exit code when the child produced one.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Wall time from spawn to termination.
    pub wall_time: Duration,
}

impl SpawnResult {
    /// Whether the child exited successfully.
    pub fn success(&self) -> bool {
        self.status == SpawnStatus::Success
    }

    /// Combined error message from stderr and stdout.
    pub fn error_message(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stderr, self.stdout)
        }
    }
}

/// A test action: a spawn plus test-specific routing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestAction {
    /// Stable label identifying the test, e.g. `//pkg:target`.
    pub label: String,
    /// The underlying spawn.
    pub spawn: SpawnSpec,
    /// Whether this test must not overlap any other exclusive test.
    pub exclusive: bool,
}

impl TestAction {
    /// A non-exclusive test action.
    pub fn new(label: impl Into<String>, spawn: SpawnSpec) -> Self {
        Self {
            label: label.into(),
            spawn,
            exclusive: false,
        }
    }

    /// Mark this test as exclusive.
    #[must_use]
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }
}

/// Lifecycle state of one test action.
///
/// Legal transitions: `Pending -> Running`, then `Running` to exactly one
/// of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    /// Queued, not yet started.
    Pending,
    /// Child process in flight.
    Running,
    /// Ran to completion and succeeded.
    Passed,
    /// Ran to completion and failed.
    Failed,
    /// Infrastructure failure before or during the run, distinct from a
    /// failing test.
    Errored,
    /// The invocation was interrupted while the test was pending or
    /// running.
    Cancelled,
}

impl TestStatus {
    /// Whether this state admits no further transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

/// Final report for one test action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOutcome {
    /// The test's label.
    pub label: String,
    /// Terminal status.
    pub status: TestStatus,
    /// Spawn result when the child actually ran.
    pub spawn_result: Option<SpawnResult>,
    /// Scratch directory the test ran with.
    pub test_tmp_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminality() {
        assert!(!TestStatus::Pending.is_terminal());
        assert!(!TestStatus::Running.is_terminal());
        assert!(TestStatus::Passed.is_terminal());
        assert!(TestStatus::Failed.is_terminal());
        assert!(TestStatus::Errored.is_terminal());
        assert!(TestStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_error_message_prefers_stderr() {
        let result = SpawnResult {
            status: SpawnStatus::NonZeroExit(1),
            exit_code: Some(1),
            stdout: "partial output".to_owned(),
            stderr: "linker failed".to_owned(),
            wall_time: Duration::from_millis(5),
        };
        assert!(!result.success());
        assert_eq!(result.error_message(), "linker failed\npartial output");
    }

    #[test]
    fn test_capability_display() {
        assert_eq!(ActionCapability::Spawn.to_string(), "Spawn");
        assert_eq!(
            ActionCapability::IncludeScanning.to_string(),
            "IncludeScanning"
        );
    }
}
