//! Assembly of the full strategy registry for one standalone build
//! invocation.

use crate::env::EnvironmentProvider;
use crate::file_write::FileWriteStrategy;
use crate::include::{NoopIncludeExtraction, NoopIncludeScanning};
use crate::local::{CompilerSpawnStrategy, LocalSpawnRunner};
use crate::strategy::{StrategyImpl, StrategyRegistry};
use crate::test_strategy::{ExclusiveTestStrategy, StandaloneTestStrategy, test_tmp_root};
use anvil_core::{HostOs, InvocationOptions, ResourceManager, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything the build bootstrap supplies to strategy assembly.
#[derive(Debug, Clone)]
pub struct InvocationEnv {
    /// Root under which actions execute.
    pub exec_root: PathBuf,
    /// Root of the source workspace.
    pub workspace_root: PathBuf,
    /// Parsed options bundle for this invocation.
    pub options: InvocationOptions,
    /// Client process environment captured at startup.
    pub client_env: BTreeMap<String, String>,
    /// Host platform identifier.
    pub host_os: HostOs,
    /// Product name of the surrounding build tool.
    pub product_name: String,
    /// The invocation-wide resource manager, constructed by the bootstrap
    /// over the budget the execution options declare
    /// (`ResourceBudget::from(&options)`).
    pub resource_manager: Arc<ResourceManager>,
}

/// Builds the strategy registry for standalone local execution.
///
/// Assembly is pure with respect to its inputs and executes nothing; it
/// runs single-threaded before any concurrent dispatch begins, and the
/// returned registry is shared read-only afterwards.
pub struct StandaloneStrategyProvider;

impl StandaloneStrategyProvider {
    /// Assemble the ordered registry for `env`.
    ///
    /// Registration order is fixed: local spawn, no-op include
    /// extraction, no-op include scanning, compiler spawn, test,
    /// exclusive test (wrapping the same shared test instance), file
    /// write. Order carries exactly one meaning: when an action does not
    /// name a strategy, the last registered implementation for its
    /// capability wins.
    ///
    /// # Errors
    /// Returns a configuration error if a required options section is
    /// absent from the bundle; this aborts the invocation before any
    /// action runs.
    pub fn assemble(env: &InvocationEnv) -> Result<StrategyRegistry> {
        let execution = env.options.execution()?.clone();
        let local_options = env.options.local_execution()?.clone();

        let env_provider = Arc::new(EnvironmentProvider::resolve(env.host_os, &env.client_env));
        let runner = Arc::new(LocalSpawnRunner::new(
            env.exec_root.clone(),
            local_options,
            Arc::clone(&env.resource_manager),
            env.product_name.clone(),
            env_provider,
        ));

        let tmp_root = test_tmp_root(&env.workspace_root, &env.exec_root, &execution);
        let test_strategy = Arc::new(StandaloneTestStrategy::new(
            execution,
            tmp_root,
            Arc::clone(&runner),
        ));

        let mut registry = StrategyRegistry::new();
        registry.register(StrategyImpl::Spawn(
            Arc::<LocalSpawnRunner>::clone(&runner),
        ));
        registry.register(StrategyImpl::IncludeExtraction(Arc::new(
            NoopIncludeExtraction,
        )));
        registry.register(StrategyImpl::IncludeScanning(Arc::new(
            NoopIncludeScanning,
        )));
        registry.register(StrategyImpl::Spawn(Arc::new(CompilerSpawnStrategy::new(
            runner,
        ))));
        registry.register(StrategyImpl::Test(Arc::<StandaloneTestStrategy>::clone(
            &test_strategy,
        )));
        registry.register(StrategyImpl::Test(Arc::new(ExclusiveTestStrategy::new(
            test_strategy,
        ))));
        registry.register(StrategyImpl::FileWrite(Arc::new(FileWriteStrategy::new(
            env.exec_root.clone(),
        ))));

        Ok(registry)
    }
}
