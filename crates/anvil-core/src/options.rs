//! Configuration types for standalone execution: general execution options,
//! local-spawn options, and the parsed bundle handed to strategy assembly.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How much test output is surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TestOutputFormat {
    /// Only a one-line summary per test.
    #[default]
    Summary,
    /// Full logs for failing tests.
    Errors,
    /// Full logs for every test.
    All,
}

/// General execution options, read once per invocation.
///
/// Strategies receive a shared reference and must not mutate these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOptions {
    /// Override for the root under which per-test scratch directories are
    /// created. When unset, a deterministic root under the execution root
    /// is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_tmp_dir: Option<PathBuf>,
    /// Test output verbosity.
    pub test_output: TestOutputFormat,
    /// Total CPU units available to concurrently running local actions.
    pub local_cpu_resources: u32,
    /// Total RAM in megabytes available to concurrently running local
    /// actions.
    pub local_ram_resources_mb: u64,
    /// Number of local test slots; each test action consumes one.
    pub local_test_jobs: u32,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            test_tmp_dir: None,
            test_output: TestOutputFormat::default(),
            local_cpu_resources: num_cpus::get() as u32,
            local_ram_resources_mb: 4096,
            local_test_jobs: num_cpus::get() as u32,
        }
    }
}

/// Options specific to spawning local child processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalExecutionOptions {
    /// Seconds to wait between asking a cancelled child to stop and
    /// forcibly killing it.
    pub sigkill_grace_seconds: u64,
    /// Whether to record wall-time statistics for each local spawn.
    pub collect_local_execution_statistics: bool,
    /// Client environment variables always passed through to children in
    /// addition to what the action requests. `None` means no extra
    /// pass-through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_local_env: Option<Vec<String>>,
}

impl Default for LocalExecutionOptions {
    fn default() -> Self {
        Self {
            sigkill_grace_seconds: 15,
            collect_local_execution_statistics: true,
            allowed_local_env: None,
        }
    }
}

impl LocalExecutionOptions {
    /// Grace period between cancellation and forcible kill.
    pub fn sigkill_grace(&self) -> Duration {
        Duration::from_secs(self.sigkill_grace_seconds)
    }
}

/// The parsed options bundle for one build invocation.
///
/// Sections are optional in the configuration file; components that require
/// a section surface its absence as a fatal configuration error at
/// assembly time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvocationOptions {
    /// General execution options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionOptions>,
    /// Local-spawn options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_execution: Option<LocalExecutionOptions>,
}

impl InvocationOptions {
    /// Parse an options bundle from TOML text.
    ///
    /// # Errors
    /// Returns an error if the text is not valid TOML for this schema.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load an options bundle from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// An options bundle with every section present at its defaults.
    pub fn with_defaults() -> Self {
        Self {
            execution: Some(ExecutionOptions::default()),
            local_execution: Some(LocalExecutionOptions::default()),
        }
    }

    /// The execution options section.
    ///
    /// # Errors
    /// Returns a configuration error if the section is absent; this
    /// indicates a configuration-loading bug and aborts the invocation.
    pub fn execution(&self) -> Result<&ExecutionOptions> {
        self.execution
            .as_ref()
            .ok_or_else(|| Error::Config("missing [execution] options section".to_owned()))
    }

    /// The local-execution options section.
    ///
    /// # Errors
    /// Returns a configuration error if the section is absent.
    pub fn local_execution(&self) -> Result<&LocalExecutionOptions> {
        self.local_execution
            .as_ref()
            .ok_or_else(|| Error::Config("missing [local_execution] options section".to_owned()))
    }
}
