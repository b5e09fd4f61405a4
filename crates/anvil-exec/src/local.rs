//! Resource-gated execution of spawns as local child processes.

use crate::env::EnvironmentProvider;
use crate::strategy::SpawnStrategy;
use anvil_core::{
    Error, LocalExecutionOptions, ResourceManager, Result, SpawnResult, SpawnSpec, SpawnStatus,
};
use async_trait::async_trait;
use core::future::pending;
use std::io::Result as IoResult;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt as _;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

/// How a supervised child process left the wait loop.
enum WaitEvent {
    Exited(IoResult<ExitStatus>),
    Cancelled,
    TimedOut,
}

/// Executes one spawn at a time as a local child process.
///
/// Every run follows the same protocol: reserve the spawn's declared
/// resources (waiting for capacity), build the child environment through
/// the platform provider, execute rooted at the execution root, then
/// release the reservation. Release happens on every exit path because the
/// reservation is an RAII handle.
pub struct LocalSpawnRunner {
    exec_root: PathBuf,
    options: LocalExecutionOptions,
    resource_manager: Arc<ResourceManager>,
    product_name: String,
    env_provider: Arc<EnvironmentProvider>,
}

impl LocalSpawnRunner {
    /// A runner rooted at `exec_root`.
    pub fn new(
        exec_root: PathBuf,
        options: LocalExecutionOptions,
        resource_manager: Arc<ResourceManager>,
        product_name: impl Into<String>,
        env_provider: Arc<EnvironmentProvider>,
    ) -> Self {
        Self {
            exec_root,
            options,
            resource_manager,
            product_name: product_name.into(),
            env_provider,
        }
    }

    /// The execution root this runner spawns under.
    pub fn exec_root(&self) -> &PathBuf {
        &self.exec_root
    }

    /// Run `spawn` to completion under the invocation's resource budget.
    ///
    /// Child failures (failure to start, non-zero exit, signal, timeout)
    /// are per-action results; only cancellation and invocation-fatal
    /// conditions surface as errors.
    ///
    /// # Errors
    /// Returns [`Error::Cancelled`] if the build is interrupted while
    /// waiting for resources or while the child is in flight; the child is
    /// killed and the reservation released before the error propagates.
    pub async fn run(&self, spawn: &SpawnSpec, cancel: &CancellationToken) -> Result<SpawnResult> {
        // Zero-resource spawns go through the same acquire/release
        // protocol so accounting stays uniform.
        let reservation = self.resource_manager.acquire(spawn.resources, cancel).await?;

        let Some(program) = spawn.argv.first() else {
            return Ok(failed_to_start("empty command line", Duration::ZERO));
        };
        let mut env = self.env_provider.build_env(
            &spawn.env,
            self.options.allowed_local_env.as_deref().unwrap_or(&[]),
        );
        env.extend(
            spawn
                .fixed_env
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        let working_dir = spawn
            .working_dir
            .as_ref()
            .map_or_else(|| self.exec_root.clone(), |dir| self.exec_root.join(dir));

        tracing::debug!(
            mnemonic = %spawn.mnemonic,
            program = %program,
            working_dir = %working_dir.display(),
            "spawning local process"
        );

        let start = Instant::now();
        let mut command = Command::new(program);
        command
            .args(&spawn.argv[1..])
            .current_dir(working_dir)
            .env_clear()
            .envs(&env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => return Ok(failed_to_start(&err.to_string(), start.elapsed())),
        };

        let stdout_task = tokio::spawn(drain_stdout(child.stdout.take()));
        let stderr_task = tokio::spawn(drain_stderr(child.stderr.take()));

        let event = {
            let wait = child.wait();
            tokio::pin!(wait);
            let deadline = async {
                match spawn.timeout {
                    Some(limit) => sleep(limit).await,
                    None => pending::<()>().await,
                }
            };
            tokio::pin!(deadline);
            tokio::select! {
                status = &mut wait => WaitEvent::Exited(status),
                () = cancel.cancelled() => WaitEvent::Cancelled,
                () = &mut deadline => WaitEvent::TimedOut,
            }
        };

        let result = match event {
            WaitEvent::Cancelled => {
                stdout_task.abort();
                stderr_task.abort();
                self.kill_child(&mut child).await;
                tracing::debug!(mnemonic = %spawn.mnemonic, "local spawn cancelled");
                drop(reservation);
                return Err(Error::Cancelled);
            }
            WaitEvent::TimedOut => {
                let wall_time = start.elapsed();
                self.kill_child(&mut child).await;
                // Killing the child closes its pipes, so the drain tasks
                // finish with whatever it printed before the deadline; a
                // hung test's output is usually the only clue to why.
                let (stdout, stderr) = capture_output(stdout_task, stderr_task).await?;
                SpawnResult {
                    status: SpawnStatus::TimedOut,
                    exit_code: None,
                    stdout,
                    stderr,
                    wall_time,
                }
            }
            WaitEvent::Exited(Err(err)) => failed_to_start(&err.to_string(), start.elapsed()),
            WaitEvent::Exited(Ok(status)) => {
                let (stdout, stderr) = capture_output(stdout_task, stderr_task).await?;
                let (spawn_status, exit_code) = classify_exit(status);
                SpawnResult {
                    status: spawn_status,
                    exit_code,
                    stdout,
                    stderr,
                    wall_time: start.elapsed(),
                }
            }
        };

        if self.options.collect_local_execution_statistics {
            tracing::debug!(
                product = %self.product_name,
                mnemonic = %spawn.mnemonic,
                wall_time_ms = result.wall_time.as_millis() as u64,
                success = result.success(),
                "local spawn finished"
            );
        }

        drop(reservation);
        Ok(result)
    }

    /// Kill an in-flight child and reap it within the configured grace
    /// period.
    async fn kill_child(&self, child: &mut Child) {
        if let Err(err) = child.start_kill() {
            tracing::debug!(error = %err, "kill requested after child already exited");
        }
        if timeout(self.options.sigkill_grace(), child.wait())
            .await
            .is_err()
        {
            tracing::warn!("child did not exit within the kill grace period");
        }
    }
}

#[async_trait]
impl SpawnStrategy for LocalSpawnRunner {
    fn name(&self) -> &str {
        "local"
    }

    async fn exec(&self, spawn: &SpawnSpec, cancel: &CancellationToken) -> Result<SpawnResult> {
        self.run(spawn, cancel).await
    }
}

/// Spawn strategy for compile actions.
///
/// Local execution discovers file-level dependencies directly from the
/// filesystem when the compiler runs, so compiles take the same path as
/// any other spawn; this strategy exists so compile actions resolve to a
/// distinct name.
pub struct CompilerSpawnStrategy {
    runner: Arc<LocalSpawnRunner>,
}

impl CompilerSpawnStrategy {
    /// A compiler strategy delegating to `runner`.
    pub fn new(runner: Arc<LocalSpawnRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl SpawnStrategy for CompilerSpawnStrategy {
    fn name(&self) -> &str {
        "compiler"
    }

    async fn exec(&self, spawn: &SpawnSpec, cancel: &CancellationToken) -> Result<SpawnResult> {
        self.runner.run(spawn, cancel).await
    }
}

fn failed_to_start(reason: &str, wall_time: Duration) -> SpawnResult {
    SpawnResult {
        status: SpawnStatus::SpawnFailed(reason.to_owned()),
        exit_code: None,
        stdout: String::new(),
        stderr: String::new(),
        wall_time,
    }
}

async fn capture_output(
    stdout_task: JoinHandle<IoResult<Vec<u8>>>,
    stderr_task: JoinHandle<IoResult<Vec<u8>>>,
) -> Result<(String, String)> {
    let stdout = stdout_task
        .await
        .map_err(|err| Error::Other(format!("stdout capture failed: {err}")))??;
    let stderr = stderr_task
        .await
        .map_err(|err| Error::Other(format!("stderr capture failed: {err}")))??;
    Ok((
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
    ))
}

async fn drain_stdout(pipe: Option<ChildStdout>) -> IoResult<Vec<u8>> {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buffer).await?;
    }
    Ok(buffer)
}

async fn drain_stderr(pipe: Option<ChildStderr>) -> IoResult<Vec<u8>> {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buffer).await?;
    }
    Ok(buffer)
}

fn classify_exit(status: ExitStatus) -> (SpawnStatus, Option<i32>) {
    if status.success() {
        (SpawnStatus::Success, Some(0))
    } else if let Some(code) = status.code() {
        (SpawnStatus::NonZeroExit(code), Some(code))
    } else {
        (abnormal_exit(status), None)
    }
}

#[cfg(unix)]
fn abnormal_exit(status: ExitStatus) -> SpawnStatus {
    use std::os::unix::process::ExitStatusExt as _;
    SpawnStatus::SignalTermination(status.signal().unwrap_or(-1))
}

#[cfg(not(unix))]
fn abnormal_exit(_status: ExitStatus) -> SpawnStatus {
    SpawnStatus::SpawnFailed("process terminated abnormally".to_owned())
}
