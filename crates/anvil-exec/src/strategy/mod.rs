//! Capability-tagged strategy interfaces and the registry that resolves
//! them.
//!
//! Every class of action work the framework can dispatch is a capability
//! ([`ActionCapability`]); each capability has one or more named
//! implementations behind a common trait. The registry is assembled once
//! per invocation and shared read-only afterwards.

pub mod registry;

pub use registry::StrategyRegistry;

use anvil_core::{ActionCapability, Result, SpawnResult, SpawnSpec, TestAction, TestOutcome};
use async_trait::async_trait;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Executes an action as a local child process.
#[async_trait]
pub trait SpawnStrategy: Send + Sync {
    /// Strategy name used for explicit overrides.
    fn name(&self) -> &str;

    /// Run the spawn to completion.
    ///
    /// # Errors
    /// Returns [`anvil_core::Error::Cancelled`] on interruption; child
    /// failures are carried in the result, not as errors.
    async fn exec(&self, spawn: &SpawnSpec, cancel: &CancellationToken) -> Result<SpawnResult>;
}

/// Produces the include-extraction artifact for a compile action.
#[async_trait]
pub trait IncludeExtractionContext: Send + Sync {
    /// Strategy name used for explicit overrides.
    fn name(&self) -> &str;

    /// Write the extraction artifact for `primary_output`.
    ///
    /// # Errors
    /// Returns an error if the artifact cannot be written.
    async fn extract_includes(&self, primary_output: &Path) -> Result<()>;
}

/// Discovers additional compile inputs ahead of execution.
#[async_trait]
pub trait IncludeScanningContext: Send + Sync {
    /// Strategy name used for explicit overrides.
    fn name(&self) -> &str;

    /// Scan `spawn` for inputs not declared on the action.
    ///
    /// `Ok(None)` means no advance discovery was performed, which the
    /// framework treats as "nothing extra", never as a failure.
    ///
    /// # Errors
    /// Returns an error only for scanner-specific failures; the local
    /// implementation has none.
    async fn find_additional_inputs(&self, spawn: &SpawnSpec) -> Result<Option<Vec<PathBuf>>>;
}

/// Runs a test action.
#[async_trait]
pub trait TestContext: Send + Sync {
    /// Strategy name used for explicit overrides.
    fn name(&self) -> &str;

    /// The shared root under which per-test scratch directories live.
    fn test_tmp_root(&self) -> &Path;

    /// Run the test to a terminal outcome.
    ///
    /// # Errors
    /// Returns [`anvil_core::Error::Cancelled`] on interruption; test
    /// failures and infrastructure errors are terminal outcome states.
    async fn run_test(&self, test: &TestAction, cancel: &CancellationToken)
    -> Result<TestOutcome>;
}

/// Materializes declared file contents as an output artifact.
#[async_trait]
pub trait FileWriteContext: Send + Sync {
    /// Strategy name used for explicit overrides.
    fn name(&self) -> &str;

    /// Write `contents` to `output`, relative to the execution root.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written; this is a
    /// per-action failure.
    async fn write_output(&self, output: &Path, contents: &[u8]) -> Result<()>;
}

/// A registered strategy implementation, tagged by the capability it
/// serves.
#[derive(Clone)]
pub enum StrategyImpl {
    /// Local process execution.
    Spawn(Arc<dyn SpawnStrategy>),
    /// Include-extraction artifact production.
    IncludeExtraction(Arc<dyn IncludeExtractionContext>),
    /// Advance input discovery.
    IncludeScanning(Arc<dyn IncludeScanningContext>),
    /// Test execution.
    Test(Arc<dyn TestContext>),
    /// Declared-contents file writes.
    FileWrite(Arc<dyn FileWriteContext>),
}

impl StrategyImpl {
    /// The capability this implementation serves.
    pub fn capability(&self) -> ActionCapability {
        match self {
            Self::Spawn(_) => ActionCapability::Spawn,
            Self::IncludeExtraction(_) => ActionCapability::IncludeExtraction,
            Self::IncludeScanning(_) => ActionCapability::IncludeScanning,
            Self::Test(_) => ActionCapability::TestExecution,
            Self::FileWrite(_) => ActionCapability::FileWrite,
        }
    }

    /// The implementation's override name.
    pub fn name(&self) -> &str {
        match self {
            Self::Spawn(strategy) => strategy.name(),
            Self::IncludeExtraction(context) => context.name(),
            Self::IncludeScanning(context) => context.name(),
            Self::Test(context) => context.name(),
            Self::FileWrite(context) => context.name(),
        }
    }
}

impl Debug for StrategyImpl {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        write!(formatter, "{}[{}]", self.capability(), self.name())
    }
}
