//! Test execution over the local runner, including the exclusive-test
//! serialization wrapper.

use crate::local::LocalSpawnRunner;
use crate::strategy::TestContext;
use anvil_core::{
    Error, ExecutionOptions, Result, SpawnStatus, TestAction, TestOutcome, TestOutputFormat,
    TestStatus,
};
use async_trait::async_trait;
use std::hash::{DefaultHasher, Hash as _, Hasher as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::create_dir_all;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Compute the shared root for per-test scratch directories.
///
/// Deterministic over its inputs and free of side effects; directories are
/// created lazily when a test first runs. An absolute `test_tmp_dir`
/// option wins outright, a relative one is anchored at the workspace
/// root, and with no option the root lives under the execution root,
/// keyed by the workspace's leaf name so distinct workspaces sharing an
/// execution root do not collide.
pub fn test_tmp_root(
    workspace_root: &Path,
    exec_root: &Path,
    options: &ExecutionOptions,
) -> PathBuf {
    match &options.test_tmp_dir {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => workspace_root.join(dir),
        None => {
            let leaf = workspace_root
                .file_name()
                .map_or_else(|| "workspace".to_owned(), |name| name.to_string_lossy().into_owned());
            exec_root.join("_tmp").join(leaf)
        }
    }
}

/// Runs test actions as local spawns under a shared scratch root.
///
/// One instance is created per invocation and shared (by `Arc`) between
/// the normal test slot and the exclusive wrapper, so both observe the
/// identical scratch root and options view.
pub struct StandaloneTestStrategy {
    options: ExecutionOptions,
    tmp_root: PathBuf,
    runner: Arc<LocalSpawnRunner>,
}

impl StandaloneTestStrategy {
    /// A test strategy executing through `runner` with scratch space under
    /// `tmp_root`.
    pub fn new(options: ExecutionOptions, tmp_root: PathBuf, runner: Arc<LocalSpawnRunner>) -> Self {
        Self {
            options,
            tmp_root,
            runner,
        }
    }

    /// The options view this strategy was assembled with.
    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Scratch directory for one test, derived from its label.
    ///
    /// Flattening path characters makes distinct labels (`//a:b`,
    /// `//a/b`) sanitize identically, so a short hash of the raw label
    /// keeps their scratch directories apart.
    fn scratch_dir(&self, label: &str) -> PathBuf {
        let leaf: String = label
            .chars()
            .map(|ch| if ch.is_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
            .collect();
        let mut hasher = DefaultHasher::new();
        label.hash(&mut hasher);
        self.tmp_root
            .join(format!("{leaf}_{:08x}", hasher.finish() as u32))
    }

    async fn execute(&self, test: &TestAction, cancel: &CancellationToken) -> Result<TestOutcome> {
        let scratch = self.scratch_dir(&test.label);
        create_dir_all(&scratch).await?;

        tracing::debug!(label = %test.label, scratch = %scratch.display(), "test running");

        // Tests always consume a local test slot on top of their declared
        // resources, and learn their scratch directory through TEST_TMPDIR.
        let mut spawn = test.spawn.clone();
        spawn.resources = spawn.resources.with_test_slot();
        spawn.fixed_env.insert(
            "TEST_TMPDIR".to_owned(),
            scratch.to_string_lossy().into_owned(),
        );

        let outcome = match self.runner.run(&spawn, cancel).await {
            Ok(spawn_result) => {
                let status = match &spawn_result.status {
                    SpawnStatus::Success => TestStatus::Passed,
                    // A child that never started is an infrastructure
                    // problem, not a failing test.
                    SpawnStatus::SpawnFailed(_) => TestStatus::Errored,
                    SpawnStatus::NonZeroExit(_)
                    | SpawnStatus::SignalTermination(_)
                    | SpawnStatus::TimedOut => TestStatus::Failed,
                };
                TestOutcome {
                    label: test.label.clone(),
                    status,
                    spawn_result: Some(spawn_result),
                    test_tmp_dir: scratch,
                }
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(err) => {
                tracing::warn!(label = %test.label, error = %err, "test infrastructure failure");
                TestOutcome {
                    label: test.label.clone(),
                    status: TestStatus::Errored,
                    spawn_result: None,
                    test_tmp_dir: scratch,
                }
            }
        };

        tracing::debug!(label = %outcome.label, status = ?outcome.status, "test finished");
        if let Some(spawn_result) = &outcome.spawn_result {
            let show_log = match self.options.test_output {
                TestOutputFormat::All => true,
                TestOutputFormat::Errors => outcome.status != TestStatus::Passed,
                TestOutputFormat::Summary => false,
            };
            if show_log {
                tracing::info!(label = %outcome.label, log = %spawn_result.error_message(), "test log");
            }
        }
        Ok(outcome)
    }
}

#[async_trait]
impl TestContext for StandaloneTestStrategy {
    fn name(&self) -> &str {
        "standalone"
    }

    fn test_tmp_root(&self) -> &Path {
        &self.tmp_root
    }

    async fn run_test(&self, test: &TestAction, cancel: &CancellationToken) -> Result<TestOutcome> {
        self.execute(test, cancel).await
    }
}

/// Serializes exclusive tests around the shared standalone strategy.
///
/// Exclusivity is purely a scheduling property: at most one exclusive test
/// is in flight at a time across the invocation, but each test executes
/// exactly as it would through the normal path, against the same scratch
/// root and options.
pub struct ExclusiveTestStrategy {
    inner: Arc<StandaloneTestStrategy>,
    serializer: Mutex<()>,
}

impl ExclusiveTestStrategy {
    /// Wrap the invocation's shared test strategy.
    pub fn new(inner: Arc<StandaloneTestStrategy>) -> Self {
        Self {
            inner,
            serializer: Mutex::new(()),
        }
    }
}

#[async_trait]
impl TestContext for ExclusiveTestStrategy {
    fn name(&self) -> &str {
        "exclusive"
    }

    fn test_tmp_root(&self) -> &Path {
        self.inner.test_tmp_root()
    }

    async fn run_test(&self, test: &TestAction, cancel: &CancellationToken) -> Result<TestOutcome> {
        let guard = self.serializer.lock().await;
        let outcome = self.inner.run_test(test, cancel).await;
        drop(guard);
        outcome
    }
}
