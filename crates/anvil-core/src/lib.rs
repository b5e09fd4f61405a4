//! Shared model for the standalone local-execution layer: action and spawn
//! descriptions, execution results, invocation options, host-OS
//! identification, and invocation-wide resource accounting.

pub mod action;
pub mod error;
pub mod host;
pub mod options;
pub mod resource;

pub use action::{
    ActionCapability, EnvRequest, SpawnResult, SpawnSpec, SpawnStatus, TestAction, TestOutcome,
    TestStatus,
};
pub use error::{Error, Result};
pub use host::HostOs;
pub use options::{ExecutionOptions, InvocationOptions, LocalExecutionOptions, TestOutputFormat};
pub use resource::{ResourceBudget, ResourceHandle, ResourceManager, ResourceSet};
