//! Tests for test execution: outcome classification, scratch directory
//! layout, test-slot gating, and exclusive-test serialization.
#![cfg(unix)]
#![allow(
    clippy::expect_used,
    clippy::min_ident_chars,
    clippy::absolute_paths,
    reason = "Test code prioritizes clarity"
)]

use anvil_core::{
    EnvRequest, HostOs, InvocationOptions, ResourceBudget, ResourceManager, SpawnSpec, TestAction,
    TestStatus,
};
use anvil_exec::{InvocationEnv, StandaloneStrategyProvider, StrategyRegistry};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

fn test_spawn(script: &str) -> SpawnSpec {
    SpawnSpec::new(
        "TestRunner",
        vec!["/bin/sh".to_owned(), "-c".to_owned(), script.to_owned()],
    )
    .with_env(EnvRequest::Explicit(BTreeMap::from([(
        "PATH".to_owned(),
        "/usr/bin:/bin".to_owned(),
    )])))
}

fn assemble(exec_root: &Path, budget: ResourceBudget) -> StrategyRegistry {
    let env = InvocationEnv {
        exec_root: exec_root.to_path_buf(),
        workspace_root: exec_root.join("workspace"),
        options: InvocationOptions::with_defaults(),
        client_env: BTreeMap::new(),
        host_os: HostOs::Posix,
        product_name: "anvil".to_owned(),
        resource_manager: ResourceManager::new(budget),
    };
    StandaloneStrategyProvider::assemble(&env).expect("assembly succeeds")
}

fn budget(test_jobs: u32) -> ResourceBudget {
    ResourceBudget {
        cpu: 8,
        ram_mb: 4096,
        local_test_jobs: test_jobs,
    }
}

#[tokio::test]
async fn test_passing_test_reports_passed_and_gets_a_scratch_dir() {
    let scratch = tempfile::tempdir().expect("scratch dir");
    let registry = assemble(scratch.path(), budget(2));
    let strategy = registry
        .resolve_test(Some("standalone"))
        .expect("standalone strategy");

    let action = TestAction::new("//pkg:fast_test", test_spawn("printf '%s' \"$TEST_TMPDIR\""));
    let outcome = strategy
        .run_test(&action, &CancellationToken::new())
        .await
        .expect("test completes");

    assert_eq!(outcome.status, TestStatus::Passed);
    let spawn_result = outcome.spawn_result.expect("child ran");
    let reported = Path::new(spawn_result.stdout.trim());
    assert!(
        reported.starts_with(strategy.test_tmp_root()),
        "TEST_TMPDIR {} must live under the shared root {}",
        reported.display(),
        strategy.test_tmp_root().display()
    );
    assert!(reported.is_dir(), "scratch directory is created before the run");
}

#[tokio::test]
async fn test_failing_test_reports_failed() {
    let scratch = tempfile::tempdir().expect("scratch dir");
    let registry = assemble(scratch.path(), budget(2));
    let strategy = registry
        .resolve_test(Some("standalone"))
        .expect("standalone strategy");

    let action = TestAction::new("//pkg:flaky_test", test_spawn("exit 1"));
    let outcome = strategy
        .run_test(&action, &CancellationToken::new())
        .await
        .expect("a failing test still completes");
    assert_eq!(outcome.status, TestStatus::Failed);
}

#[tokio::test]
async fn test_unstartable_test_reports_errored() {
    let scratch = tempfile::tempdir().expect("scratch dir");
    let registry = assemble(scratch.path(), budget(2));
    let strategy = registry
        .resolve_test(Some("standalone"))
        .expect("standalone strategy");

    let action = TestAction::new(
        "//pkg:broken_runner",
        SpawnSpec::new("TestRunner", vec!["/nonexistent/test-runner".to_owned()]),
    );
    let outcome = strategy
        .run_test(&action, &CancellationToken::new())
        .await
        .expect("infrastructure failure is a terminal outcome");
    assert_eq!(outcome.status, TestStatus::Errored);
}

#[tokio::test]
async fn test_exclusive_tests_never_overlap() {
    let scratch = tempfile::tempdir().expect("scratch dir");
    let registry = assemble(scratch.path(), budget(4));
    let exclusive = registry
        .resolve_test(Some("exclusive"))
        .expect("exclusive strategy");

    let overall = Instant::now();
    let mut handles = Vec::new();
    for index in 0..2 {
        let strategy = Arc::clone(&exclusive);
        handles.push(tokio::spawn(async move {
            let action = TestAction::new(
                format!("//pkg:exclusive_{index}"),
                test_spawn("sleep 0.4"),
            )
            .exclusive();
            strategy
                .run_test(&action, &CancellationToken::new())
                .await
                .expect("exclusive test completes")
        }));
    }

    // Estimate each child's execution window from its completion instant
    // and measured wall time; serialized children must not overlap.
    let mut windows = Vec::new();
    for handle in handles {
        let outcome = timeout(Duration::from_secs(10), handle)
            .await
            .expect("exclusive tests finish")
            .expect("join");
        assert_eq!(outcome.status, TestStatus::Passed);
        let end = Instant::now();
        let wall_time = outcome.spawn_result.expect("child ran").wall_time;
        windows.push((end - wall_time, end));
    }
    assert!(
        overall.elapsed() >= Duration::from_millis(750),
        "two 400ms exclusive tests must serialize, elapsed {:?}",
        overall.elapsed()
    );
    let tolerance = Duration::from_millis(50);
    let (first, second) = (windows[0], windows[1]);
    assert!(
        first.1 <= second.0 + tolerance || second.1 <= first.0 + tolerance,
        "exclusive test windows overlapped"
    );
}

#[tokio::test]
async fn test_normal_test_overlaps_an_exclusive_test() {
    let scratch = tempfile::tempdir().expect("scratch dir");
    let registry = assemble(scratch.path(), budget(4));
    let exclusive = registry
        .resolve_test(Some("exclusive"))
        .expect("exclusive strategy");
    let normal = registry
        .resolve_test(Some("standalone"))
        .expect("standalone strategy");

    let long_running = {
        let strategy = Arc::clone(&exclusive);
        tokio::spawn(async move {
            let action =
                TestAction::new("//pkg:long_exclusive", test_spawn("sleep 1")).exclusive();
            strategy.run_test(&action, &CancellationToken::new()).await
        })
    };
    sleep(Duration::from_millis(150)).await;
    assert!(!long_running.is_finished(), "exclusive test is in flight");

    // The normal path is not serialized behind the exclusive lock.
    let action = TestAction::new("//pkg:quick", test_spawn("true"));
    let outcome = timeout(
        Duration::from_millis(700),
        normal.run_test(&action, &CancellationToken::new()),
    )
    .await
    .expect("normal test must not wait for the exclusive test")
    .expect("normal test completes");
    assert_eq!(outcome.status, TestStatus::Passed);
    assert!(!long_running.is_finished(), "exclusive test is still running");

    let exclusive_outcome = timeout(Duration::from_secs(10), long_running)
        .await
        .expect("exclusive test finishes")
        .expect("join")
        .expect("run");
    assert_eq!(exclusive_outcome.status, TestStatus::Passed);
}

#[tokio::test]
async fn test_test_slots_limit_concurrent_tests() {
    let scratch = tempfile::tempdir().expect("scratch dir");
    let registry = assemble(scratch.path(), budget(1));
    let strategy = registry
        .resolve_test(Some("standalone"))
        .expect("standalone strategy");

    let first = {
        let strategy = Arc::clone(&strategy);
        tokio::spawn(async move {
            let action = TestAction::new("//pkg:slot_holder", test_spawn("sleep 0.5"));
            strategy.run_test(&action, &CancellationToken::new()).await
        })
    };
    sleep(Duration::from_millis(150)).await;

    let second = {
        let strategy = Arc::clone(&strategy);
        tokio::spawn(async move {
            let action = TestAction::new("//pkg:slot_waiter", test_spawn("true"));
            strategy.run_test(&action, &CancellationToken::new()).await
        })
    };
    sleep(Duration::from_millis(150)).await;
    assert!(
        !second.is_finished(),
        "with one test slot the second test must wait"
    );

    for handle in [first, second] {
        let outcome = timeout(Duration::from_secs(10), handle)
            .await
            .expect("tests finish")
            .expect("join")
            .expect("run");
        assert_eq!(outcome.status, TestStatus::Passed);
    }
}
