//! Standalone (single local machine) execution strategies for build and
//! test actions: capability-tagged strategy resolution, platform-aware
//! child environments, resource-gated local spawning, and shared test
//! strategy wiring.

pub mod env;
pub mod file_write;
pub mod include;
pub mod local;
pub mod provider;
pub mod strategy;
pub mod test_strategy;

pub use env::EnvironmentProvider;
pub use file_write::FileWriteStrategy;
pub use include::{NoopIncludeExtraction, NoopIncludeScanning};
pub use local::{CompilerSpawnStrategy, LocalSpawnRunner};
pub use provider::{InvocationEnv, StandaloneStrategyProvider};
pub use strategy::{
    FileWriteContext, IncludeExtractionContext, IncludeScanningContext, SpawnStrategy,
    StrategyImpl, StrategyRegistry, TestContext,
};
pub use test_strategy::{ExclusiveTestStrategy, StandaloneTestStrategy, test_tmp_root};
