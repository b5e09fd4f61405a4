//! Ordered, capability-keyed strategy registry with explicit last-wins
//! resolution.

use super::{
    FileWriteContext, IncludeExtractionContext, IncludeScanningContext, SpawnStrategy,
    StrategyImpl, TestContext,
};
use anvil_core::{ActionCapability, Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// The full set of strategies available to one build invocation.
///
/// Implementations are kept in registration order per capability. When an
/// action does not name a strategy, the *last* registered implementation
/// for the capability is chosen; this is the firm tie-break contract, and
/// the only semantics registration order carries. Actions wanting a
/// specific implementation name it explicitly.
#[derive(Debug, Default)]
pub struct StrategyRegistry {
    entries: HashMap<ActionCapability, Vec<StrategyImpl>>,
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an implementation for its capability.
    ///
    /// Registering a second implementation for a capability is not an
    /// error; it shadows earlier ones for override-free resolution.
    pub fn register(&mut self, strategy: StrategyImpl) {
        tracing::debug!(strategy = ?strategy, "registering strategy");
        self.entries
            .entry(strategy.capability())
            .or_default()
            .push(strategy);
    }

    /// Names registered for `capability`, in registration order.
    pub fn registered_names(&self, capability: ActionCapability) -> Vec<&str> {
        self.entries
            .get(&capability)
            .map(|entries| entries.iter().map(StrategyImpl::name).collect())
            .unwrap_or_default()
    }

    /// Resolve `capability`, optionally forced to a named implementation.
    ///
    /// # Errors
    /// Returns a configuration error if no implementation is registered
    /// for the capability, and [`Error::UnknownStrategy`] if an override
    /// names an unregistered implementation.
    pub fn resolve(
        &self,
        capability: ActionCapability,
        name_override: Option<&str>,
    ) -> Result<&StrategyImpl> {
        let entries = self
            .entries
            .get(&capability)
            .ok_or_else(|| Error::Config(format!("no strategy registered for {capability}")))?;
        match name_override {
            None => entries
                .last()
                .ok_or_else(|| Error::Config(format!("no strategy registered for {capability}"))),
            Some(name) => entries
                .iter()
                .rev()
                .find(|entry| entry.name() == name)
                .ok_or_else(|| Error::UnknownStrategy {
                    name: name.to_owned(),
                    capability: capability.to_string(),
                }),
        }
    }

    /// Resolve a spawn strategy.
    ///
    /// # Errors
    /// Same as [`Self::resolve`].
    pub fn resolve_spawn(&self, name_override: Option<&str>) -> Result<Arc<dyn SpawnStrategy>> {
        match self.resolve(ActionCapability::Spawn, name_override)? {
            StrategyImpl::Spawn(strategy) => Ok(Arc::clone(strategy)),
            other => Err(Error::Config(format!(
                "strategy {other:?} registered under the wrong capability"
            ))),
        }
    }

    /// Resolve an include-extraction context.
    ///
    /// # Errors
    /// Same as [`Self::resolve`].
    pub fn resolve_include_extraction(
        &self,
        name_override: Option<&str>,
    ) -> Result<Arc<dyn IncludeExtractionContext>> {
        match self.resolve(ActionCapability::IncludeExtraction, name_override)? {
            StrategyImpl::IncludeExtraction(context) => Ok(Arc::clone(context)),
            other => Err(Error::Config(format!(
                "strategy {other:?} registered under the wrong capability"
            ))),
        }
    }

    /// Resolve an include-scanning context.
    ///
    /// # Errors
    /// Same as [`Self::resolve`].
    pub fn resolve_include_scanning(
        &self,
        name_override: Option<&str>,
    ) -> Result<Arc<dyn IncludeScanningContext>> {
        match self.resolve(ActionCapability::IncludeScanning, name_override)? {
            StrategyImpl::IncludeScanning(context) => Ok(Arc::clone(context)),
            other => Err(Error::Config(format!(
                "strategy {other:?} registered under the wrong capability"
            ))),
        }
    }

    /// Resolve a test-execution context.
    ///
    /// # Errors
    /// Same as [`Self::resolve`].
    pub fn resolve_test(&self, name_override: Option<&str>) -> Result<Arc<dyn TestContext>> {
        match self.resolve(ActionCapability::TestExecution, name_override)? {
            StrategyImpl::Test(context) => Ok(Arc::clone(context)),
            other => Err(Error::Config(format!(
                "strategy {other:?} registered under the wrong capability"
            ))),
        }
    }

    /// Resolve a file-write context.
    ///
    /// # Errors
    /// Same as [`Self::resolve`].
    pub fn resolve_file_write(
        &self,
        name_override: Option<&str>,
    ) -> Result<Arc<dyn FileWriteContext>> {
        match self.resolve(ActionCapability::FileWrite, name_override)? {
            StrategyImpl::FileWrite(context) => Ok(Arc::clone(context)),
            other => Err(Error::Config(format!(
                "strategy {other:?} registered under the wrong capability"
            ))),
        }
    }
}
